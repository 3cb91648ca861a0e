use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info};

use crate::cli::{ConvertArgs, ExtractorKind, RendererKind};
use crate::commands::clean::clean_directory;
use crate::commands::order::{SEQUENCE_MANIFEST_FILENAME, order_extraction, sequence_manifest};
use crate::model::{
    ConvertCounts, ConvertPaths, ConvertRunManifest, SequencedDocument, ToolVersions,
};
use crate::pipeline::build_worker_pool;
use crate::pipeline::extract::{ArchiveExtractor, ExternalExtractor};
use crate::pipeline::merge::merge_pdfs;
use crate::pipeline::render::{
    DocumentRenderer, ExternalRenderer, plan_render_jobs, render_documents,
};
use crate::tools::command_version_optional;
use crate::util::{
    now_utc_string, reset_directory, sha256_file, utc_compact_string, write_json_pretty,
};
use crate::workspace::WorkspaceLayout;

/// Resolved inputs of one conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub archive: PathBuf,
    pub output_pdf: PathBuf,
    pub max_workers: usize,
}

#[derive(Debug, Clone)]
pub struct ConvertOutcome {
    pub toc_path: PathBuf,
    pub documents: Vec<SequencedDocument>,
    pub counts: ConvertCounts,
    pub completed_steps: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn run(args: ConvertArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    if !args.chm_file.is_file() {
        bail!("CHM archive not found: {}", args.chm_file.display());
    }

    let layout =
        WorkspaceLayout::resolve(args.work_root.as_deref(), &args.cache_root, &run_id)?;
    layout.prepare()?;
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        layout.manifests.join(format!(
            "convert_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let options = ConvertOptions {
        archive: args.chm_file.clone(),
        output_pdf: output_pdf_path(&args.chm_file, &args.output_dir)?,
        max_workers: args.max_workers,
    };

    info!(
        archive = %options.archive.display(),
        work_root = %layout.root.display(),
        run_id = %run_id,
        "starting conversion"
    );

    let source_sha256 = sha256_file(&options.archive)?;
    let tool_versions = collect_tool_versions(args.extractor, args.renderer);
    let extractor = ExternalExtractor::new(args.extractor);
    let renderer = ExternalRenderer::new(args.renderer);

    let outcome = convert(&options, &layout, &extractor, &renderer)?;

    let manifest = ConvertRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        completed_steps: outcome.completed_steps,
        command: render_convert_command(&args),
        source_archive: options.archive.display().to_string(),
        source_sha256,
        tool_versions,
        paths: ConvertPaths {
            work_root: layout.root.display().to_string(),
            extracted_dir: layout.extracted.display().to_string(),
            reorganized_dir: layout.reorganized.display().to_string(),
            pdf_dir: layout.pdfs.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
            toc_path: outcome.toc_path.display().to_string(),
            output_pdf: options.output_pdf.display().to_string(),
        },
        counts: outcome.counts,
        documents: outcome.documents,
        warnings: outcome.warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote convert run manifest");
    info!(
        output = %options.output_pdf.display(),
        pages = manifest.counts.merged_page_count,
        "conversion completed"
    );
    Ok(())
}

/// Runs extract, order, clean, render and merge against `layout`. Per-item
/// failures become warnings; an empty stage aborts the run.
pub fn convert(
    options: &ConvertOptions,
    layout: &WorkspaceLayout,
    extractor: &dyn ArchiveExtractor,
    renderer: &dyn DocumentRenderer,
) -> Result<ConvertOutcome> {
    let pool = build_worker_pool(options.max_workers)?;
    let mut counts = ConvertCounts::default();
    let mut completed_steps = Vec::new();
    let mut warnings = Vec::new();

    extractor
        .extract(&options.archive, &layout.extracted)
        .with_context(|| format!("failed to extract {}", options.archive.display()))?;
    completed_steps.push("extract".to_string());

    let ordered = order_extraction(&layout.extracted, &layout.reorganized, None, &pool)?;
    write_json_pretty(
        &layout.manifests.join(SEQUENCE_MANIFEST_FILENAME),
        &sequence_manifest(&ordered, &layout.extracted),
    )?;
    counts.extracted_file_count = ordered.extracted_file_count;
    counts.toc_entry_count = ordered.toc_entry_count;
    counts.sequenced_document_count = ordered.documents.len();
    counts.assets_copied = ordered.assets.copied;
    counts.asset_copy_failures = ordered.assets.failed.len();
    warnings.extend(
        ordered
            .assets
            .failed
            .iter()
            .map(|path| format!("asset copy failed: {path}")),
    );
    completed_steps.push("order".to_string());

    let cleaned = clean_directory(&layout.reorganized, &pool)?;
    counts.assets_flattened = cleaned.flattened.copied;
    counts.documents_normalized = cleaned.normalized;
    counts.normalize_failures = cleaned.failed.len();
    warnings.extend(
        cleaned
            .flattened
            .failed
            .iter()
            .map(|path| format!("asset flatten failed: {path}")),
    );
    warnings.extend(
        cleaned
            .failed
            .iter()
            .map(|path| format!("normalization failed, rendering as extracted: {path}")),
    );
    completed_steps.push("clean".to_string());

    reset_directory(&layout.pdfs)?;
    let jobs = plan_render_jobs(&ordered.documents, &layout.reorganized, &layout.pdfs);
    let rendered = render_documents(renderer, &jobs, &pool);
    if rendered.rendered.is_empty() {
        bail!(
            "none of {} documents could be rendered with {}",
            jobs.len(),
            renderer.name()
        );
    }
    counts.pdfs_rendered = rendered.rendered.len();
    counts.render_failures = rendered.failed.len();
    warnings.extend(
        rendered
            .failed
            .iter()
            .map(|name| format!("render failed: {name}")),
    );
    completed_steps.push("render".to_string());

    let inputs: Vec<PathBuf> = rendered
        .rendered
        .iter()
        .map(|pdf| {
            debug!(rank = pdf.rank, source = %pdf.source_filename, "queued for merge");
            pdf.pdf_path.clone()
        })
        .collect();
    let merged = merge_pdfs(&inputs, &options.output_pdf)?;
    counts.pdfs_merged = merged.merged.len();
    counts.merge_failures = merged.failed.len();
    counts.merged_page_count = merged.page_count;
    warnings.extend(
        merged
            .failed
            .iter()
            .map(|path| format!("merge skipped: {path}")),
    );
    completed_steps.push("merge".to_string());

    Ok(ConvertOutcome {
        toc_path: ordered.toc_path,
        documents: ordered.documents,
        counts,
        completed_steps,
        warnings,
    })
}

/// `<output_dir>/<archive stem>.pdf`.
fn output_pdf_path(archive: &Path, output_dir: &Path) -> Result<PathBuf> {
    let stem = archive
        .file_stem()
        .with_context(|| format!("archive path has no file name: {}", archive.display()))?;
    Ok(output_dir.join(format!("{}.pdf", stem.to_string_lossy())))
}

fn collect_tool_versions(extractor: ExtractorKind, renderer: RendererKind) -> ToolVersions {
    let external_extractor = ExternalExtractor::new(extractor);
    let external_renderer = ExternalRenderer::new(renderer);
    ToolVersions {
        extractor: extractor.as_str().to_string(),
        extractor_version: command_version_optional(
            external_extractor.program(),
            external_extractor.version_args(),
        ),
        renderer: renderer.as_str().to_string(),
        renderer_version: command_version_optional(
            external_renderer.program(),
            external_renderer.version_args(),
        ),
    }
}

fn render_convert_command(args: &ConvertArgs) -> String {
    let mut command = vec![
        "chm2pdf".to_string(),
        "convert".to_string(),
        args.chm_file.display().to_string(),
        "--output-dir".to_string(),
        args.output_dir.display().to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(path) = &args.work_root {
        command.push("--work-root".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    command.push("--max-workers".to_string());
    command.push(args.max_workers.to_string());
    command.push("--extractor".to_string());
    command.push(args.extractor.as_str().to_string());
    command.push("--renderer".to_string());
    command.push(args.renderer.as_str().to_string());

    command.join(" ")
}
