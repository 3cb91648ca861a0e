use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::pipeline::DOCUMENT_EXTENSIONS;
use crate::util::{ensure_directory, has_extension};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetCopyReport {
    pub copied: usize,
    pub skipped_existing: usize,
    pub failed: Vec<String>,
}

pub fn is_asset(path: &Path) -> bool {
    !has_extension(path, &DOCUMENT_EXTENSIONS)
}

/// Mirrors every asset of the extraction tree into `target`, keeping relative
/// subdirectories, and creates each top-level subdirectory of the source even
/// when it holds no assets. Individual copy failures are reported, not raised.
pub fn copy_assets(
    source_root: &Path,
    target: &Path,
    pool: &ThreadPool,
) -> Result<AssetCopyReport> {
    ensure_directory(target)?;

    let mut pairs: Vec<(PathBuf, PathBuf)> = Vec::new();
    for entry in WalkDir::new(source_root).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", source_root.display()))?;
        let relative = entry
            .path()
            .strip_prefix(source_root)
            .with_context(|| format!("path outside root: {}", entry.path().display()))?;

        if entry.file_type().is_dir() {
            if entry.depth() == 1 {
                ensure_directory(&target.join(relative))?;
            }
            continue;
        }
        if entry.file_type().is_file() && is_asset(entry.path()) {
            pairs.push((entry.path().to_path_buf(), target.join(relative)));
        }
    }

    let results: Vec<Result<()>> = pool.install(|| {
        pairs
            .par_iter()
            .map(|(source, destination)| copy_one(source, destination))
            .collect()
    });

    let mut report = AssetCopyReport::default();
    for ((source, _), result) in pairs.iter().zip(results) {
        match result {
            Ok(()) => report.copied += 1,
            Err(err) => {
                warn!(source = %source.display(), error = %err, "asset copy failed");
                report.failed.push(source.display().to_string());
            }
        }
    }

    info!(
        copied = report.copied,
        failed = report.failed.len(),
        "assets copied"
    );
    Ok(report)
}

/// Copies assets found in subdirectories of `dir` up to `dir` itself, leaving
/// any file that already exists at the top level untouched. Running it twice
/// is a no-op the second time.
pub fn flatten_assets(dir: &Path) -> Result<AssetCopyReport> {
    let mut report = AssetCopyReport::default();

    for entry in WalkDir::new(dir).min_depth(2).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() || !is_asset(entry.path()) {
            continue;
        }

        let destination = dir.join(entry.file_name());
        if destination.exists() {
            report.skipped_existing += 1;
            continue;
        }

        match copy_one(entry.path(), &destination) {
            Ok(()) => {
                debug!(
                    source = %entry.path().display(),
                    destination = %destination.display(),
                    "flattened asset"
                );
                report.copied += 1;
            }
            Err(err) => {
                warn!(source = %entry.path().display(), error = %err, "asset flatten failed");
                report.failed.push(entry.path().display().to_string());
            }
        }
    }

    info!(
        dir = %dir.display(),
        copied = report.copied,
        skipped_existing = report.skipped_existing,
        failed = report.failed.len(),
        "assets flattened"
    );
    Ok(report)
}

fn copy_one(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        ensure_directory(parent)?;
    }
    fs::copy(source, destination).with_context(|| {
        format!(
            "failed to copy {} to {}",
            source.display(),
            destination.display()
        )
    })?;
    Ok(())
}
