use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "chm2pdf",
    version,
    about = "Convert compiled HTML help (CHM) archives into a single ordered PDF"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the whole pipeline: extract, order, clean, render, merge.
    Convert(ConvertArgs),
    /// Rank the documents of an extracted archive by table-of-contents order.
    Order(OrderArgs),
    /// Flatten assets and rewrite ranked documents so they render standalone.
    Clean(CleanArgs),
    /// Merge rank-prefixed PDFs into one document.
    Merge(MergeArgs),
    /// Report which extraction and rendering tools are installed.
    Doctor(DoctorArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Path to the CHM archive.
    pub chm_file: PathBuf,

    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = ".cache/chm2pdf")]
    pub cache_root: PathBuf,

    /// Working root for this run; a fresh `run-<timestamp>` directory under
    /// the cache root is used when omitted.
    #[arg(long)]
    pub work_root: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = 4)]
    pub max_workers: usize,

    #[arg(long, value_enum, default_value_t = ExtractorKind::Archmage)]
    pub extractor: ExtractorKind,

    #[arg(long, value_enum, default_value_t = RendererKind::Wkhtmltopdf)]
    pub renderer: RendererKind,
}

#[derive(Args, Debug, Clone)]
pub struct OrderArgs {
    /// Directory holding the extracted archive.
    #[arg(long)]
    pub extracted: PathBuf,

    /// Directory that receives the ranked documents; cleared first.
    #[arg(long)]
    pub target: PathBuf,

    /// Table-of-contents file; discovered under `--extracted` when omitted.
    #[arg(long)]
    pub hhc: Option<PathBuf>,

    #[arg(long, default_value_t = 4)]
    pub max_workers: usize,
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Directory holding ranked documents and their assets.
    #[arg(long)]
    pub dir: PathBuf,

    #[arg(long, default_value_t = 4)]
    pub max_workers: usize,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long)]
    pub pdf_dir: PathBuf,

    #[arg(long, default_value = "combined.pdf")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct DoctorArgs {
    /// Only check the tools selected here instead of every known backend.
    #[arg(long, value_enum)]
    pub extractor: Option<ExtractorKind>,

    #[arg(long, value_enum)]
    pub renderer: Option<RendererKind>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExtractorKind {
    Archmage,
    ExtractChmlib,
    SevenZip,
}

impl ExtractorKind {
    pub const ALL: [ExtractorKind; 3] = [Self::Archmage, Self::ExtractChmlib, Self::SevenZip];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Archmage => "archmage",
            Self::ExtractChmlib => "extract-chmlib",
            Self::SevenZip => "seven-zip",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RendererKind {
    Wkhtmltopdf,
    Weasyprint,
}

impl RendererKind {
    pub const ALL: [RendererKind; 2] = [Self::Wkhtmltopdf, Self::Weasyprint];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wkhtmltopdf => "wkhtmltopdf",
            Self::Weasyprint => "weasyprint",
        }
    }
}
