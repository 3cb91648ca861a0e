pub mod assets;
pub mod charset;
pub mod extract;
pub mod merge;
pub mod normalize;
pub mod render;
pub mod sequence;
pub mod toc;


use anyhow::{Context, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Extensions of files that are documents or help-project metadata rather than assets.
pub const DOCUMENT_EXTENSIONS: [&str; 4] = ["htm", "html", "hhc", "hhk"];

pub const HTML_EXTENSIONS: [&str; 2] = ["htm", "html"];

/// Bounded pool for per-document work; one worker runs everything sequentially.
pub fn build_worker_pool(max_workers: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(max_workers.max(1))
        .thread_name(|index| format!("chm2pdf-worker-{index}"))
        .build()
        .context("failed to build worker pool")
}
