use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::{DoctorArgs, ExtractorKind, RendererKind};
use crate::pipeline::extract::ExternalExtractor;
use crate::pipeline::render::ExternalRenderer;
use crate::tools::{command_available, command_version_optional};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolRole {
    Extractor,
    Renderer,
}

impl ToolRole {
    fn as_str(self) -> &'static str {
        match self {
            Self::Extractor => "extractor",
            Self::Renderer => "renderer",
        }
    }
}

#[derive(Debug, Clone)]
struct ToolStatus {
    role: ToolRole,
    backend: &'static str,
    program: &'static str,
    available: bool,
    version: Option<String>,
}

pub fn run(args: DoctorArgs) -> Result<()> {
    let extractors = match args.extractor {
        Some(kind) => vec![kind],
        None => ExtractorKind::ALL.to_vec(),
    };
    let renderers = match args.renderer {
        Some(kind) => vec![kind],
        None => RendererKind::ALL.to_vec(),
    };

    let mut statuses = Vec::new();
    for kind in extractors {
        let extractor = ExternalExtractor::new(kind);
        statuses.push(check_tool(
            ToolRole::Extractor,
            kind.as_str(),
            extractor.program(),
            extractor.version_args(),
        ));
    }
    for kind in renderers {
        let renderer = ExternalRenderer::new(kind);
        statuses.push(check_tool(
            ToolRole::Renderer,
            kind.as_str(),
            renderer.program(),
            renderer.version_args(),
        ));
    }

    for status in &statuses {
        if status.available {
            info!(
                role = status.role.as_str(),
                backend = status.backend,
                program = status.program,
                version = %status.version.as_deref().unwrap_or("unknown"),
                "tool available"
            );
        } else {
            warn!(
                role = status.role.as_str(),
                backend = status.backend,
                program = status.program,
                "tool not found"
            );
        }
    }

    let missing = missing_roles(&statuses);
    if !missing.is_empty() {
        bail!("no usable {} installed", missing.join(" or "));
    }

    info!("all required tools available");
    Ok(())
}

fn check_tool(
    role: ToolRole,
    backend: &'static str,
    program: &'static str,
    version_args: &[&str],
) -> ToolStatus {
    let available = command_available(program);
    let version = if available {
        command_version_optional(program, version_args)
    } else {
        None
    };
    ToolStatus {
        role,
        backend,
        program,
        available,
        version,
    }
}

/// Roles with no available backend among the checked tools.
fn missing_roles(statuses: &[ToolStatus]) -> Vec<&'static str> {
    [ToolRole::Extractor, ToolRole::Renderer]
        .into_iter()
        .filter(|role| {
            !statuses
                .iter()
                .any(|status| status.role == *role && status.available)
        })
        .map(ToolRole::as_str)
        .collect()
}
