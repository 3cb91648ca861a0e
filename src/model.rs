use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One `Local` reference pulled from the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub raw_path: String,
    pub resolved_filename: String,
}

impl TocEntry {
    pub fn new(raw_path: impl Into<String>) -> Self {
        let raw_path = raw_path.into();
        let resolved_filename = match raw_path.split_once('#') {
            Some((before, _)) => before.to_string(),
            None => raw_path.clone(),
        };
        Self {
            raw_path,
            resolved_filename,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedDocument {
    /// Relative, `/`-separated path under the extraction root.
    pub source_path: String,
    pub rank: u32,
    pub output_filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPdf {
    pub rank: u32,
    pub source_filename: String,
    pub pdf_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub toc_path: String,
    pub extraction_root: String,
    pub toc_entry_count: usize,
    pub documents: Vec<SequencedDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub extractor: String,
    pub extractor_version: Option<String>,
    pub renderer: String,
    pub renderer_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertPaths {
    pub work_root: String,
    pub extracted_dir: String,
    pub reorganized_dir: String,
    pub pdf_dir: String,
    pub manifest_path: String,
    pub toc_path: String,
    pub output_pdf: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ConvertCounts {
    pub extracted_file_count: usize,
    pub toc_entry_count: usize,
    pub sequenced_document_count: usize,
    pub assets_copied: usize,
    pub asset_copy_failures: usize,
    pub assets_flattened: usize,
    pub documents_normalized: usize,
    pub normalize_failures: usize,
    pub pdfs_rendered: usize,
    pub render_failures: usize,
    pub pdfs_merged: usize,
    pub merge_failures: usize,
    pub merged_page_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub completed_steps: Vec<String>,
    pub command: String,
    pub source_archive: String,
    pub source_sha256: String,
    pub tool_versions: ToolVersions,
    pub paths: ConvertPaths,
    pub counts: ConvertCounts,
    pub documents: Vec<SequencedDocument>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::TocEntry;

    #[test]
    fn toc_entry_strips_fragment_at_first_hash() {
        let entry = TocEntry::new("intro.htm#sec2#inner");
        assert_eq!(entry.raw_path, "intro.htm#sec2#inner");
        assert_eq!(entry.resolved_filename, "intro.htm");
    }

    #[test]
    fn toc_entry_without_fragment_is_unchanged() {
        let entry = TocEntry::new("html/ch1.htm");
        assert_eq!(entry.resolved_filename, "html/ch1.htm");
    }
}
