use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use html5ever::serialize::{SerializeOpts, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{Attribute, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use rayon::ThreadPool;
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::pipeline::HTML_EXTENSIONS;
use crate::pipeline::assets::{AssetCopyReport, flatten_assets};
use crate::pipeline::charset::{CharsetDetector, StatisticalDetector, decode_with};
use crate::pipeline::merge::RankResolver;
use crate::util::{has_extension, last_segment};

/// Inline navigation script that breaks static rendering.
pub const SHOW_FRAMING_MARKER: &str = "show framing";

/// Literal repairs for historically mis-encoded help sources.
const TEXT_REPAIRS: [(&str, &str); 3] = [("ï¿½", " "), ("\u{a0}", " "), ("xe2", "")];

#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub flattened: AssetCopyReport,
    pub normalized: usize,
    pub failed: Vec<String>,
}

pub struct Normalizer {
    detector: Box<dyn CharsetDetector>,
    charset_param: Regex,
}

impl Normalizer {
    pub fn new() -> Result<Self> {
        Self::with_detector(Box::new(StatisticalDetector))
    }

    pub fn with_detector(detector: Box<dyn CharsetDetector>) -> Result<Self> {
        Ok(Self {
            detector,
            charset_param: Regex::new(r"(?i)charset\s*=\s*[^;\s]+")
                .context("failed to compile charset regex")?,
        })
    }

    /// Rewrites one document in place as UTF-8.
    pub fn normalize_file(&self, path: &Path) -> Result<()> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let output = self
            .normalize_markup(&raw)
            .with_context(|| format!("failed to normalize {}", path.display()))?;
        fs::write(path, output).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn normalize_markup(&self, raw: &[u8]) -> Result<String> {
        let (decoded, encoding, had_errors) = decode_with(self.detector.as_ref(), raw);
        if had_errors {
            debug!(encoding = encoding.name(), "malformed sequences replaced while decoding");
        }

        let mut text = decoded.into_owned();
        for (from, to) in TEXT_REPAIRS {
            if text.contains(from) {
                text = text.replace(from, to);
            }
        }

        let dom = parse_document(RcDom::default(), Default::default()).one(text);
        self.rewrite_node(&dom.document);

        let document: SerializableHandle = dom.document.clone().into();
        let mut bytes = Vec::new();
        serialize(&mut bytes, &document, SerializeOpts::default())
            .context("failed to serialize document")?;
        String::from_utf8(bytes).context("serialized document is not UTF-8")
    }

    fn rewrite_node(&self, node: &Handle) {
        node.children
            .borrow_mut()
            .retain(|child| !is_framing_script(child));

        if let NodeData::Element { name, attrs, .. } = &node.data {
            match &*name.local {
                "img" => flatten_attribute(attrs, "src"),
                "script" => flatten_attribute(attrs, "src"),
                "link" if is_stylesheet_link(&attrs.borrow()) => flatten_attribute(attrs, "href"),
                "meta" => self.declare_utf8(attrs),
                _ => {}
            }
        }

        for child in node.children.borrow().iter() {
            self.rewrite_node(child);
        }
    }

    /// Output is always UTF-8, so any declared charset is rewritten to match.
    fn declare_utf8(&self, attrs: &RefCell<Vec<Attribute>>) {
        let mut attrs = attrs.borrow_mut();
        let is_content_type = attrs.iter().any(|attr| {
            &*attr.name.local == "http-equiv" && attr.value.eq_ignore_ascii_case("content-type")
        });

        for attr in attrs.iter_mut() {
            match &*attr.name.local {
                "charset" => attr.value = StrTendril::from_slice("utf-8"),
                "content" if is_content_type && self.charset_param.is_match(&attr.value) => {
                    let rewritten = self
                        .charset_param
                        .replace_all(&attr.value, "charset=utf-8")
                        .into_owned();
                    attr.value = StrTendril::from(rewritten);
                }
                _ => {}
            }
        }
    }
}

/// Flattens every asset in `dir`'s subdirectories to the top level, then
/// rewrites each top-level HTML document. A document that fails is logged and
/// left as-is; the rest of the batch continues.
pub fn normalize_directory(
    dir: &Path,
    normalizer: &Normalizer,
    resolver: &RankResolver,
    pool: &ThreadPool,
) -> Result<NormalizeReport> {
    let flattened = flatten_assets(dir)?;
    let documents = list_documents(dir, resolver)?;
    normalize_documents(&documents, normalizer, pool, flattened)
}

pub fn normalize_documents(
    documents: &[PathBuf],
    normalizer: &Normalizer,
    pool: &ThreadPool,
    flattened: AssetCopyReport,
) -> Result<NormalizeReport> {
    let results: Vec<Result<()>> = pool.install(|| {
        documents
            .par_iter()
            .map(|path| normalizer.normalize_file(path))
            .collect()
    });

    let mut report = NormalizeReport {
        flattened,
        ..NormalizeReport::default()
    };
    for (path, result) in documents.iter().zip(results) {
        match result {
            Ok(()) => {
                debug!(path = %path.display(), "normalized document");
                report.normalized += 1;
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "document normalization failed"
                );
                report.failed.push(path.display().to_string());
            }
        }
    }

    info!(
        normalized = report.normalized,
        failed = report.failed.len(),
        "documents normalized"
    );
    Ok(report)
}

/// Top-level `.htm`/`.html` files of `dir`, in rank order.
pub fn list_documents(dir: &Path, resolver: &RankResolver) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let is_file = entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file();
        if is_file && has_extension(&path, &HTML_EXTENSIONS) {
            documents.push(path);
        }
    }

    Ok(resolver.order(documents))
}

fn flatten_attribute(attrs: &RefCell<Vec<Attribute>>, attribute: &str) {
    for attr in attrs.borrow_mut().iter_mut() {
        if &*attr.name.local != attribute {
            continue;
        }
        let value: &str = &attr.value;
        if is_data_uri(value) {
            continue;
        }
        let flat = last_segment(value);
        if flat.len() != value.len() {
            attr.value = StrTendril::from_slice(flat);
        }
    }
}

fn is_data_uri(value: &str) -> bool {
    value
        .trim_start()
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

fn is_stylesheet_link(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        &*attr.name.local == "rel"
            && attr
                .value
                .split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

fn is_framing_script(node: &Handle) -> bool {
    match &node.data {
        NodeData::Element { name, .. } if &*name.local == "script" => {
            let mut text = String::new();
            collect_text(node, &mut text);
            text.contains(SHOW_FRAMING_MARKER)
        }
        _ => false,
    }
}

fn collect_text(node: &Handle, out: &mut String) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            _ => collect_text(child, out),
        }
    }
}

#[cfg(test)]
mod tests;
