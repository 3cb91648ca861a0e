//! Table-of-contents (`.hhc`) parsing.
//!
//! A sitemap lists pages as `<param name="Local" value="...">` children of
//! `<object type="text/sitemap">` nodes nested in `<ul>/<li>` outlines. Only
//! traversal order matters here; nesting depth is discarded.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::model::TocEntry;

pub fn read_toc_file(path: &Path) -> Result<Vec<TocEntry>> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_toc(&raw))
}

/// Ordered `Local` references of a sitemap, fragments removed.
///
/// Bytes are decoded as UTF-8 with malformed sequences replaced; the result
/// may contain duplicates and paths that do not exist on disk.
pub fn parse_toc(raw: &[u8]) -> Vec<TocEntry> {
    let text = String::from_utf8_lossy(raw);
    let dom = parse_document(RcDom::default(), Default::default()).one(&*text);

    let mut entries = Vec::new();
    collect_local_params(&dom.document, &mut entries);
    entries
}

fn collect_local_params(node: &Handle, entries: &mut Vec<TocEntry>) {
    if let NodeData::Element { name, attrs, .. } = &node.data {
        if &*name.local == "param" {
            let attrs = attrs.borrow();
            let is_local = attrs.iter().any(|attr| {
                &*attr.name.local == "name" && attr.value.eq_ignore_ascii_case("local")
            });
            if is_local {
                if let Some(value) = attrs.iter().find(|attr| &*attr.name.local == "value") {
                    entries.push(TocEntry::new(value.value.to_string()));
                }
            }
        }
    }

    for child in node.children.borrow().iter() {
        collect_local_params(child, entries);
    }
}
