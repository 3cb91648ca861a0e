use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::ensure_directory;

/// Directory layout of one conversion run. Every stage receives its paths from
/// here, so concurrent runs with distinct roots never touch each other.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub extracted: PathBuf,
    pub reorganized: PathBuf,
    pub pdfs: PathBuf,
    pub manifests: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            extracted: root.join("extracted"),
            reorganized: root.join("reorganized"),
            pdfs: root.join("pdfs"),
            manifests: root.join("manifests"),
            root,
        }
    }

    /// Layout rooted at `work_root` when given. Otherwise a new directory
    /// `<run_id>-<random>` is created under `cache_root`; runs that share a
    /// run id (same second) still get distinct roots.
    pub fn resolve(work_root: Option<&Path>, cache_root: &Path, run_id: &str) -> Result<Self> {
        if let Some(root) = work_root {
            return Ok(Self::new(root));
        }

        ensure_directory(cache_root)?;
        let root = tempfile::Builder::new()
            .prefix(&format!("{run_id}-"))
            .tempdir_in(cache_root)
            .with_context(|| format!("failed to create run directory in {}", cache_root.display()))?
            .keep();
        Ok(Self::new(root))
    }

    pub fn prepare(&self) -> Result<()> {
        ensure_directory(&self.root)?;
        ensure_directory(&self.manifests)
    }
}
