//! Merge-order resolution and PDF concatenation.
//!
//! Rendered pages are named `{rank:04}_{stem}.pdf`. When the merge runs in a
//! separate process from sequencing, that prefix is the only record of TOC
//! order, so it is re-derived from filenames here.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use lopdf::{Document, Object, ObjectId};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::util::{ensure_directory, has_extension};

/// Rank given to files without any numeric prefix so they sort last.
pub const UNRANKED: u64 = 999_999;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

pub struct RankResolver {
    infix: Regex,
    leading: Regex,
}

impl RankResolver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            infix: Regex::new(r"(\d+)_").context("failed to compile rank regex")?,
            leading: Regex::new(r"^(\d+)").context("failed to compile leading rank regex")?,
        })
    }

    /// Numeric rank encoded in a filename: the first `\d+_` group, else a
    /// leading run of digits, else [`UNRANKED`].
    pub fn rank_of(&self, filename: &str) -> u64 {
        self.infix
            .captures(filename)
            .or_else(|| self.leading.captures(filename))
            .and_then(|captures| captures.get(1))
            .and_then(|digits| digits.as_str().parse::<u64>().ok())
            .unwrap_or(UNRANKED)
    }

    /// Sorts paths by rank, then by filename, independent of input order.
    pub fn order(&self, mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
        paths.sort_by_cached_key(|path| {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            (self.rank_of(&filename), filename)
        });
        paths
    }
}

/// `.pdf` files directly inside `dir`, in merge order. `exclude` names a file
/// to leave out, typically the merge output when it lives inside `dir`.
pub fn discover_pdfs(
    dir: &Path,
    resolver: &RankResolver,
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let excluded = exclude.and_then(|path| fs::canonicalize(path).ok());
    let mut pdfs = Vec::new();

    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }
        if !has_extension(&path, &["pdf"]) {
            continue;
        }
        let is_excluded = excluded.as_ref().is_some_and(|excluded| {
            fs::canonicalize(&path).is_ok_and(|candidate| candidate == *excluded)
        });
        if is_excluded {
            debug!(path = %path.display(), "skipping merge output");
            continue;
        }
        pdfs.push(path);
    }

    Ok(resolver.order(pdfs))
}

#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub merged: Vec<PathBuf>,
    pub failed: Vec<String>,
    pub page_count: usize,
}

/// Concatenates `inputs` in the given order into `output`. Inputs that fail to
/// load or append are logged and skipped; merging nothing is an error.
pub fn merge_pdfs(inputs: &[PathBuf], output: &Path) -> Result<MergeReport> {
    if inputs.is_empty() {
        bail!("no PDF files to merge into {}", output.display());
    }

    let mut report = MergeReport::default();
    let mut merged: Option<Document> = None;

    for input in inputs {
        let outcome = Document::load(input)
            .with_context(|| format!("failed to load {}", input.display()))
            .and_then(|document| absorb(&mut merged, document));

        match outcome {
            Ok(pages) => {
                debug!(path = %input.display(), pages, "appended PDF");
                report.page_count += pages;
                report.merged.push(input.clone());
            }
            Err(err) => {
                warn!(path = %input.display(), error = %format!("{err:#}"), "skipping PDF");
                report.failed.push(input.display().to_string());
            }
        }
    }

    let Some(mut document) = merged else {
        bail!("none of {} PDF files could be merged", inputs.len());
    };

    if let Some(parent) = output.parent() {
        ensure_directory(parent)?;
    }
    // Catalogs and page-tree roots of appended documents are now unreachable.
    document.prune_objects();
    document.renumber_objects();
    document.compress();
    document
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        output = %output.display(),
        merged = report.merged.len(),
        failed = report.failed.len(),
        pages = report.page_count,
        "PDFs merged"
    );
    Ok(report)
}

fn absorb(merged: &mut Option<Document>, document: Document) -> Result<usize> {
    match merged {
        Some(base) => append_document(base, document),
        None => {
            let pages = document.get_pages().len();
            *merged = Some(document);
            Ok(pages)
        }
    }
}

/// Moves every page of `addition` to the end of `base`'s root page tree.
/// Returns the number of pages appended.
fn append_document(base: &mut Document, mut addition: Document) -> Result<usize> {
    let base_pages_id = pages_root_id(base)?;

    addition.renumber_objects_with(base.max_id + 1);
    let page_ids: Vec<ObjectId> = addition.get_pages().into_values().collect();

    for page_id in &page_ids {
        inline_inherited_attributes(&mut addition, *page_id)?;
        addition
            .get_object_mut(*page_id)
            .and_then(Object::as_dict_mut)
            .context("page object is not a dictionary")?
            .set("Parent", Object::Reference(base_pages_id));
    }

    base.objects.extend(addition.objects);
    base.max_id = base
        .objects
        .keys()
        .map(|(id, _)| *id)
        .max()
        .unwrap_or(base.max_id);

    let pages = base
        .get_object_mut(base_pages_id)
        .and_then(Object::as_dict_mut)
        .context("page tree root is not a dictionary")?;
    let existing = pages
        .get(b"Count")
        .and_then(Object::as_i64)
        .unwrap_or_default();
    let kids = pages
        .get_mut(b"Kids")
        .and_then(Object::as_array_mut)
        .context("page tree root has no Kids array")?;
    kids.extend(page_ids.iter().map(|id| Object::Reference(*id)));
    pages.set("Count", Object::Integer(existing + page_ids.len() as i64));

    Ok(page_ids.len())
}

fn pages_root_id(document: &Document) -> Result<ObjectId> {
    document
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .context("document catalog has no page tree")
}

/// Copies attributes a page inherits from intermediate page-tree nodes onto
/// the page itself, since those nodes are left behind when it is re-parented.
fn inline_inherited_attributes(document: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();
    {
        let page = document
            .get_dictionary(page_id)
            .context("page object is not a dictionary")?;
        let mut missing: Vec<&[u8]> = INHERITABLE_PAGE_KEYS
            .iter()
            .copied()
            .filter(|key| !page.has(key))
            .collect();
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut visited = HashSet::from([page_id]);

        while let (Some(parent_id), false) = (parent, missing.is_empty()) {
            // Malformed page trees can loop back on themselves.
            if !visited.insert(parent_id) {
                break;
            }
            let Ok(node) = document.get_dictionary(parent_id) else {
                break;
            };
            missing.retain(|key| match node.get(key) {
                Ok(value) => {
                    inherited.push((*key, value.clone()));
                    false
                }
                Err(_) => true,
            });
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }

    if inherited.is_empty() {
        return Ok(());
    }
    let page = document
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .context("page object is not a dictionary")?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}
