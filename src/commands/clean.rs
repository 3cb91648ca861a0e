use std::path::Path;

use anyhow::{Result, bail};
use rayon::ThreadPool;
use tracing::info;

use crate::cli::CleanArgs;
use crate::pipeline::build_worker_pool;
use crate::pipeline::merge::RankResolver;
use crate::pipeline::normalize::{NormalizeReport, Normalizer, normalize_directory};

pub fn run(args: CleanArgs) -> Result<()> {
    if !args.dir.is_dir() {
        bail!("{} is not a directory", args.dir.display());
    }

    let pool = build_worker_pool(args.max_workers)?;
    let report = clean_directory(&args.dir, &pool)?;

    info!(
        dir = %args.dir.display(),
        normalized = report.normalized,
        failed = report.failed.len(),
        flattened = report.flattened.copied,
        "clean completed"
    );
    Ok(())
}

/// Flattens assets and rewrites every ranked document in `dir`. Fails only
/// when not a single document could be normalized.
pub fn clean_directory(dir: &Path, pool: &ThreadPool) -> Result<NormalizeReport> {
    let normalizer = Normalizer::new()?;
    let resolver = RankResolver::new()?;
    let report = normalize_directory(dir, &normalizer, &resolver, pool)?;

    if report.normalized == 0 {
        bail!(
            "no document in {} could be normalized ({} failed)",
            dir.display(),
            report.failed.len()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn clean_directory_requires_at_least_one_document() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("style.css"), "body{}").unwrap();
        let pool = build_worker_pool(1).unwrap();

        assert!(clean_directory(dir.path(), &pool).is_err());
    }

    #[test]
    fn clean_directory_rewrites_documents() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        fs::write(
            dir.path().join("0001_a.htm"),
            r#"<link rel="stylesheet" href="css/site.css">"#,
        )
        .unwrap();
        let pool = build_worker_pool(1).unwrap();

        let report = clean_directory(dir.path(), &pool).unwrap();

        assert_eq!(report.normalized, 1);
        assert!(dir.path().join("site.css").is_file());
    }
}
