use anyhow::{Result, bail};
use tracing::info;

use crate::cli::MergeArgs;
use crate::pipeline::merge::{RankResolver, discover_pdfs, merge_pdfs};

pub fn run(args: MergeArgs) -> Result<()> {
    if !args.pdf_dir.is_dir() {
        bail!("{} is not a directory", args.pdf_dir.display());
    }

    let resolver = RankResolver::new()?;
    let pdfs = discover_pdfs(&args.pdf_dir, &resolver, Some(&args.output))?;
    if pdfs.is_empty() {
        bail!("no PDF files found in {}", args.pdf_dir.display());
    }
    info!(dir = %args.pdf_dir.display(), pdfs = pdfs.len(), "merging PDFs in rank order");

    let report = merge_pdfs(&pdfs, &args.output)?;

    info!(
        output = %args.output.display(),
        merged = report.merged.len(),
        skipped = report.failed.len(),
        pages = report.page_count,
        "merge completed"
    );
    Ok(())
}
