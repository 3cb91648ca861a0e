use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cli::RendererKind;
use crate::model::{RenderedPdf, SequencedDocument};
use crate::tools::run_tool;

/// Turns one self-contained HTML document into one PDF.
pub trait DocumentRenderer: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, html: &Path, pdf: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct ExternalRenderer {
    kind: RendererKind,
}

impl ExternalRenderer {
    pub fn new(kind: RendererKind) -> Self {
        Self { kind }
    }

    pub fn program(&self) -> &'static str {
        program_for(self.kind)
    }

    pub fn version_args(&self) -> &'static [&'static str] {
        &["--version"]
    }

    pub fn command_args(&self, html: &Path, pdf: &Path) -> Vec<OsString> {
        let mut args = match self.kind {
            // Missing images or scripts must not fail the page.
            RendererKind::Wkhtmltopdf => vec![
                OsString::from("--quiet"),
                OsString::from("--enable-local-file-access"),
                OsString::from("--load-error-handling"),
                OsString::from("ignore"),
                OsString::from("--load-media-error-handling"),
                OsString::from("ignore"),
            ],
            RendererKind::Weasyprint => Vec::new(),
        };
        args.push(html.as_os_str().to_owned());
        args.push(pdf.as_os_str().to_owned());
        args
    }
}

pub fn program_for(kind: RendererKind) -> &'static str {
    match kind {
        RendererKind::Wkhtmltopdf => "wkhtmltopdf",
        RendererKind::Weasyprint => "weasyprint",
    }
}

impl DocumentRenderer for ExternalRenderer {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn render(&self, html: &Path, pdf: &Path) -> Result<()> {
        run_tool(
            self.program(),
            self.command_args(html, pdf),
            &html.display().to_string(),
        )?;
        if !pdf.is_file() {
            bail!(
                "{} did not produce {}",
                self.program(),
                pdf.display()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub rank: u32,
    pub source_filename: String,
    pub html_path: PathBuf,
    pub pdf_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    /// Successful renders, ascending by rank.
    pub rendered: Vec<RenderedPdf>,
    pub failed: Vec<String>,
}

/// One job per sequenced document: `html_dir/0003_page.htm` renders to
/// `pdf_dir/0003_page.pdf`.
pub fn plan_render_jobs(
    documents: &[SequencedDocument],
    html_dir: &Path,
    pdf_dir: &Path,
) -> Vec<RenderJob> {
    documents
        .iter()
        .map(|document| {
            let stem = Path::new(&document.output_filename)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| document.output_filename.clone());
            RenderJob {
                rank: document.rank,
                source_filename: document.output_filename.clone(),
                html_path: html_dir.join(&document.output_filename),
                pdf_path: pdf_dir.join(format!("{stem}.pdf")),
            }
        })
        .collect()
}

/// Renders every job on the pool. Workers finish in any order; the report is
/// re-sorted by rank. A failed render is logged and left out.
pub fn render_documents(
    renderer: &dyn DocumentRenderer,
    jobs: &[RenderJob],
    pool: &ThreadPool,
) -> RenderReport {
    let results: Vec<Result<()>> = pool.install(|| {
        jobs.par_iter()
            .map(|job| renderer.render(&job.html_path, &job.pdf_path))
            .collect()
    });

    let mut report = RenderReport::default();
    for (job, result) in jobs.iter().zip(results) {
        match result {
            Ok(()) => {
                debug!(pdf = %job.pdf_path.display(), rank = job.rank, "rendered document");
                report.rendered.push(RenderedPdf {
                    rank: job.rank,
                    source_filename: job.source_filename.clone(),
                    pdf_path: job.pdf_path.clone(),
                });
            }
            Err(err) => {
                warn!(
                    html = %job.html_path.display(),
                    renderer = renderer.name(),
                    error = %format!("{err:#}"),
                    "render failed"
                );
                report.failed.push(job.source_filename.clone());
            }
        }
    }
    report.rendered.sort_by_key(|pdf| pdf.rank);

    info!(
        rendered = report.rendered.len(),
        failed = report.failed.len(),
        renderer = renderer.name(),
        "documents rendered"
    );
    report
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::pipeline::build_worker_pool;

    struct RecordingRenderer {
        calls: Mutex<Vec<PathBuf>>,
        fail_on: &'static str,
    }

    impl DocumentRenderer for RecordingRenderer {
        fn name(&self) -> &str {
            "recording"
        }

        fn render(&self, html: &Path, pdf: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(html.to_path_buf());
            if html.to_string_lossy().contains(self.fail_on) {
                bail!("refusing {}", html.display());
            }
            fs::write(pdf, b"%PDF-1.5").unwrap();
            Ok(())
        }
    }

    fn document(rank: u32, name: &str) -> SequencedDocument {
        SequencedDocument {
            source_path: name.to_string(),
            rank,
            output_filename: format!("{rank:04}_{name}"),
        }
    }

    #[test]
    fn wkhtmltopdf_arguments_allow_local_assets_and_tolerate_missing_ones() {
        let renderer = ExternalRenderer::new(RendererKind::Wkhtmltopdf);
        let args = renderer.command_args(Path::new("in.htm"), Path::new("out.pdf"));
        assert_eq!(
            args,
            vec![
                OsString::from("--quiet"),
                OsString::from("--enable-local-file-access"),
                OsString::from("--load-error-handling"),
                OsString::from("ignore"),
                OsString::from("--load-media-error-handling"),
                OsString::from("ignore"),
                OsString::from("in.htm"),
                OsString::from("out.pdf"),
            ]
        );
    }

    #[test]
    fn weasyprint_takes_input_then_output() {
        let renderer = ExternalRenderer::new(RendererKind::Weasyprint);
        let args = renderer.command_args(Path::new("in.htm"), Path::new("out.pdf"));
        assert_eq!(args, vec![OsString::from("in.htm"), OsString::from("out.pdf")]);
        assert_eq!(renderer.program(), "weasyprint");
    }

    #[test]
    fn plan_render_jobs_swaps_extension_for_pdf() {
        let jobs = plan_render_jobs(
            &[document(1, "intro.htm"), document(2, "ch1.html")],
            Path::new("html"),
            Path::new("pdfs"),
        );
        assert_eq!(jobs[0].pdf_path, Path::new("pdfs/0001_intro.pdf"));
        assert_eq!(jobs[1].html_path, Path::new("html/0002_ch1.html"));
        assert_eq!(jobs[1].pdf_path, Path::new("pdfs/0002_ch1.pdf"));
    }

    #[test]
    fn render_documents_reports_failures_and_keeps_rank_order() {
        let dir = TempDir::new().unwrap();
        let documents: Vec<SequencedDocument> = ["a.htm", "b.htm", "c.htm", "d.htm"]
            .iter()
            .enumerate()
            .map(|(index, name)| document(index as u32 + 1, name))
            .collect();
        let jobs = plan_render_jobs(&documents, dir.path(), dir.path());
        let renderer = RecordingRenderer {
            calls: Mutex::new(Vec::new()),
            fail_on: "0002_b",
        };

        let pool = build_worker_pool(3).unwrap();
        let report = render_documents(&renderer, &jobs, &pool);

        let ranks: Vec<u32> = report.rendered.iter().map(|pdf| pdf.rank).collect();
        assert_eq!(ranks, vec![1, 3, 4]);
        assert_eq!(report.failed, vec!["0002_b.htm".to_string()]);
        assert_eq!(renderer.calls.lock().unwrap().len(), 4);
    }
}
