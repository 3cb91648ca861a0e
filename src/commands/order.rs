use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use rayon::ThreadPool;
use tracing::info;

use crate::cli::OrderArgs;
use crate::model::{SequenceManifest, SequencedDocument};
use crate::pipeline::assets::{AssetCopyReport, copy_assets};
use crate::pipeline::build_worker_pool;
use crate::pipeline::extract::{ExtractedFileSet, find_toc_file};
use crate::pipeline::sequence::{place_documents, sequence_documents};
use crate::pipeline::toc::read_toc_file;
use crate::util::{now_utc_string, write_json_pretty};

pub const SEQUENCE_MANIFEST_FILENAME: &str = "sequence.json";

#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub toc_path: PathBuf,
    pub toc_entry_count: usize,
    pub extracted_file_count: usize,
    pub documents: Vec<SequencedDocument>,
    pub assets: AssetCopyReport,
}

pub fn run(args: OrderArgs) -> Result<()> {
    if !args.extracted.is_dir() {
        bail!("extraction root {} is not a directory", args.extracted.display());
    }

    let pool = build_worker_pool(args.max_workers)?;
    let outcome = order_extraction(&args.extracted, &args.target, args.hhc.as_deref(), &pool)?;

    let manifest_path = args.target.join(SEQUENCE_MANIFEST_FILENAME);
    write_json_pretty(&manifest_path, &sequence_manifest(&outcome, &args.extracted))?;

    info!(path = %manifest_path.display(), "wrote sequence manifest");
    info!(
        documents = outcome.documents.len(),
        assets = outcome.assets.copied,
        "order completed"
    );
    Ok(())
}

/// Ranks the extracted documents by table-of-contents order, places them in
/// `target` under their ranked names and mirrors the archive's assets next to
/// them. `target` is cleared first.
pub fn order_extraction(
    extracted: &Path,
    target: &Path,
    hhc: Option<&Path>,
    pool: &ThreadPool,
) -> Result<OrderOutcome> {
    let files = ExtractedFileSet::scan(extracted)?;
    let toc_path = match hhc {
        Some(path) => path.to_path_buf(),
        None => find_toc_file(extracted)?,
    };

    let entries = read_toc_file(&toc_path)?;
    if entries.is_empty() {
        bail!("table of contents {} lists no documents", toc_path.display());
    }

    let documents = sequence_documents(&entries, &files);
    if documents.is_empty() {
        bail!(
            "none of the {} table-of-contents references resolve to files under {}",
            entries.len(),
            extracted.display()
        );
    }
    info!(
        toc_entries = entries.len(),
        documents = documents.len(),
        skipped = entries.len() - documents.len(),
        "documents sequenced"
    );

    place_documents(extracted, target, &documents)?;
    let assets = copy_assets(extracted, target, pool)?;

    Ok(OrderOutcome {
        toc_path,
        toc_entry_count: entries.len(),
        extracted_file_count: files.len(),
        documents,
        assets,
    })
}

pub fn sequence_manifest(outcome: &OrderOutcome, extracted: &Path) -> SequenceManifest {
    SequenceManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        toc_path: outcome.toc_path.display().to_string(),
        extraction_root: extracted.display().to_string(),
        toc_entry_count: outcome.toc_entry_count,
        documents: outcome.documents.clone(),
    }
}
