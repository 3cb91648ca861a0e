use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::model::{SequencedDocument, TocEntry};
use crate::pipeline::extract::ExtractedFileSet;
use crate::util::{last_segment, reset_directory};

/// Ranks table-of-contents references against the files that actually exist.
///
/// References that resolve to no extracted file are skipped without consuming
/// a rank. A reference whose basename equals the previously emitted one is
/// collapsed; the collapse is consecutive-only, so `[a, a, b, a]` yields three
/// documents ranked 1, 2, 3.
pub fn sequence_documents(
    entries: &[TocEntry],
    files: &ExtractedFileSet,
) -> Vec<SequencedDocument> {
    let mut documents = Vec::new();
    let mut last_copied_basename: Option<String> = None;
    let mut rank: u32 = 1;

    for entry in entries {
        let Some(source_path) = normalize_reference(&entry.resolved_filename) else {
            debug!(reference = %entry.raw_path, "skipping unresolvable reference");
            continue;
        };
        let basename = last_segment(&source_path).to_string();

        if !files.contains(&source_path) {
            debug!(reference = %entry.raw_path, "skipping dangling reference");
            continue;
        }

        if last_copied_basename.as_deref() == Some(basename.as_str()) {
            debug!(reference = %entry.raw_path, "skipping consecutive duplicate");
            continue;
        }

        documents.push(SequencedDocument {
            output_filename: format!("{rank:04}_{basename}"),
            source_path,
            rank,
        });
        last_copied_basename = Some(basename);
        rank += 1;
    }

    documents
}

/// Turns a TOC reference into an extraction-root key: `\` becomes `/`, leading
/// separators are dropped and `.`/`..` segments are resolved lexically.
/// Returns `None` for empty references and ones that climb above the root.
pub fn normalize_reference(reference: &str) -> Option<String> {
    let unified = reference.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Clears `target` and copies every sequenced document into it under its
/// ranked filename.
pub fn place_documents(
    extraction_root: &Path,
    target: &Path,
    documents: &[SequencedDocument],
) -> Result<()> {
    reset_directory(target)?;

    for document in documents {
        let source = extraction_root.join(&document.source_path);
        let destination = target.join(&document.output_filename);
        fs::copy(&source, &destination).with_context(|| {
            format!(
                "failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        })?;
        debug!(
            source = %source.display(),
            destination = %destination.display(),
            "placed document"
        );
    }

    info!(
        target = %target.display(),
        documents = documents.len(),
        "ranked documents placed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn entries(paths: &[&str]) -> Vec<TocEntry> {
        paths.iter().map(|path| TocEntry::new(*path)).collect()
    }

    fn filenames(documents: &[SequencedDocument]) -> Vec<&str> {
        documents
            .iter()
            .map(|document| document.output_filename.as_str())
            .collect()
    }

    #[test]
    fn collapse_is_consecutive_only() {
        let files: ExtractedFileSet = ["a.htm", "b.htm"].into_iter().collect();
        let documents =
            sequence_documents(&entries(&["a.htm", "a.htm", "b.htm", "a.htm"]), &files);

        assert_eq!(
            filenames(&documents),
            vec!["0001_a.htm", "0002_b.htm", "0003_a.htm"]
        );
    }

    #[test]
    fn dangling_references_do_not_consume_ranks() {
        let files: ExtractedFileSet = ["a.htm", "c.htm"].into_iter().collect();
        let documents = sequence_documents(
            &entries(&["missing.htm", "a.htm", "gone/b.htm", "c.htm"]),
            &files,
        );

        let ranks: Vec<u32> = documents.iter().map(|document| document.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
        assert_eq!(filenames(&documents), vec!["0001_a.htm", "0002_c.htm"]);
    }

    #[test]
    fn ranks_are_dense_across_skips_and_collapses() {
        let files: ExtractedFileSet = ["x/a.htm", "b.htm", "c.htm", "y/a.htm"]
            .into_iter()
            .collect();
        let documents = sequence_documents(
            &entries(&[
                "x/a.htm",
                "y/a.htm",
                "nope.htm",
                "b.htm",
                "b.htm#frag",
                "c.htm",
                "x/a.htm",
            ]),
            &files,
        );

        let ranks: Vec<u32> = documents.iter().map(|document| document.rank).collect();
        assert_eq!(ranks, (1..=documents.len() as u32).collect::<Vec<_>>());
        // y/a.htm shares a basename with the previous emission and collapses into it.
        assert_eq!(
            filenames(&documents),
            vec!["0001_a.htm", "0002_b.htm", "0003_c.htm", "0004_a.htm"]
        );
    }

    #[test]
    fn fragment_references_resolve_to_the_same_file() {
        let files: ExtractedFileSet = ["intro.htm", "ch1.htm"].into_iter().collect();
        let documents = sequence_documents(
            &entries(&["intro.htm", "intro.htm#sec2", "ch1.htm"]),
            &files,
        );

        assert_eq!(filenames(&documents), vec!["0001_intro.htm", "0002_ch1.htm"]);
        assert_eq!(documents[1].source_path, "ch1.htm");
    }

    #[test]
    fn normalize_reference_resolves_relative_segments() {
        assert_eq!(
            normalize_reference("/html/./sub/../ch1.htm").as_deref(),
            Some("html/ch1.htm")
        );
        assert_eq!(
            normalize_reference("html\\ch2.htm").as_deref(),
            Some("html/ch2.htm")
        );
        assert_eq!(normalize_reference("../outside.htm"), None);
        assert_eq!(normalize_reference(""), None);
    }

    #[test]
    fn place_documents_clears_target_and_copies_ranked_files() {
        let root = TempDir::new().unwrap();
        let extracted = root.path().join("extracted");
        let target = root.path().join("reorganized");
        fs::create_dir_all(extracted.join("html")).unwrap();
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("stale.htm"), "old").unwrap();
        fs::write(extracted.join("html/ch1.htm"), "<p>one</p>").unwrap();

        let documents = vec![SequencedDocument {
            source_path: "html/ch1.htm".to_string(),
            rank: 1,
            output_filename: "0001_ch1.htm".to_string(),
        }];
        place_documents(&extracted, &target, &documents).unwrap();

        assert!(!target.join("stale.htm").exists());
        assert_eq!(
            fs::read_to_string(target.join("0001_ch1.htm")).unwrap(),
            "<p>one</p>"
        );
    }
}
