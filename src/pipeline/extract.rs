use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;
use walkdir::WalkDir;

use crate::cli::ExtractorKind;
use crate::tools::run_tool;
use crate::util::{ensure_directory, has_extension};

pub trait ArchiveExtractor {
    fn name(&self) -> &str;

    /// Writes every file of `archive` under `dest`, keeping relative paths.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Extraction through one of the command-line CHM unpackers.
#[derive(Debug, Clone, Copy)]
pub struct ExternalExtractor {
    kind: ExtractorKind,
}

impl ExternalExtractor {
    pub fn new(kind: ExtractorKind) -> Self {
        Self { kind }
    }

    pub fn program(&self) -> &'static str {
        program_for(self.kind)
    }

    pub fn version_args(&self) -> &'static [&'static str] {
        match self.kind {
            ExtractorKind::Archmage => &["--version"],
            ExtractorKind::ExtractChmlib | ExtractorKind::SevenZip => &[],
        }
    }

    pub fn command_args(&self, archive: &Path, dest: &Path) -> Vec<OsString> {
        match self.kind {
            ExtractorKind::Archmage => vec![
                OsString::from("-x"),
                archive.as_os_str().to_owned(),
                dest.as_os_str().to_owned(),
            ],
            ExtractorKind::ExtractChmlib => {
                vec![archive.as_os_str().to_owned(), dest.as_os_str().to_owned()]
            }
            ExtractorKind::SevenZip => {
                let mut output_flag = OsString::from("-o");
                output_flag.push(dest.as_os_str());
                vec![
                    OsString::from("x"),
                    OsString::from("-y"),
                    output_flag,
                    archive.as_os_str().to_owned(),
                ]
            }
        }
    }
}

pub fn program_for(kind: ExtractorKind) -> &'static str {
    match kind {
        ExtractorKind::Archmage => "archmage",
        ExtractorKind::ExtractChmlib => "extract_chmLib",
        ExtractorKind::SevenZip => "7z",
    }
}

impl ArchiveExtractor for ExternalExtractor {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        if dest.exists() {
            fs::remove_dir_all(dest)
                .with_context(|| format!("failed to clear {}", dest.display()))?;
        }
        // archmage refuses to write into an existing directory.
        match self.kind {
            ExtractorKind::Archmage => {
                if let Some(parent) = dest.parent() {
                    ensure_directory(parent)?;
                }
            }
            ExtractorKind::ExtractChmlib | ExtractorKind::SevenZip => ensure_directory(dest)?,
        }

        info!(
            archive = %archive.display(),
            dest = %dest.display(),
            extractor = self.name(),
            "extracting archive"
        );
        run_tool(
            self.program(),
            self.command_args(archive, dest),
            &archive.display().to_string(),
        )?;

        if !dest.is_dir() {
            bail!(
                "{} did not produce an extraction directory at {}",
                self.program(),
                dest.display()
            );
        }

        Ok(())
    }
}

/// Relative paths of every regular file under an extraction root.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFileSet {
    files: BTreeSet<String>,
}

impl ExtractedFileSet {
    pub fn scan(root: &Path) -> Result<Self> {
        let mut files = BTreeSet::new();

        for entry in WalkDir::new(root).min_depth(1) {
            let entry =
                entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .with_context(|| format!("path outside root: {}", entry.path().display()))?;
            let key = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key);
        }

        Ok(Self { files })
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.files.contains(relative)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExtractedFileSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Shallowest `.hhc` file under `root`, ties broken by path.
pub fn find_toc_file(root: &Path) -> Result<PathBuf> {
    let mut best: Option<(usize, PathBuf)> = None;

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), &["hhc"]) {
            continue;
        }

        let candidate = (entry.depth(), entry.path().to_path_buf());
        best = match best {
            Some(current) if current <= candidate => Some(current),
            _ => Some(candidate),
        };
    }

    match best {
        Some((_, path)) => {
            info!(path = %path.display(), "table of contents found");
            Ok(path)
        }
        None => bail!("no .hhc table of contents found under {}", root.display()),
    }
}
