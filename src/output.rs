//! CLI output formatting.
//!
//! Output is **content-first**: every entity leads with its positional index
//! and label, and the file it becomes is shown after an arrow. Logs go
//! through `tracing` separately; these lines are what the user reads.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Holiday → index.htm
//! 001 Day Trips (2 pictures) → node_3f2a9c01be44.htm
//!     001 harbour → 00001.htm
//!         Source: holiday/030-Day-Trips/001-harbour.jpg
//!     002 ferry → 00002.htm
//!         Source: holiday/030-Day-Trips/002-ferry.jpg
//! 002 beach → 00003.htm
//!     Source: holiday/010-beach.jpg
//!
//! 3 pictures in 2 groups
//! ```
//!
//! ## Export
//!
//! ```text
//! Exporting 3 pictures
//! Holiday
//! Day Trips
//!     [1/3] 00001.htm
//!     [2/3] 00002.htm
//! Holiday
//!     [3/3] 00003.htm
//!     uploaded index.htm
//!     FAILED 00003_l.jpg: Remote I/O error ...
//! Done
//!
//! Rendered 3 pictures, 5 pages
//! Published 11 of 12 files
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function returning `Vec<String>` and a
//! `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::collection::{Group, NodeId, SiteNode};
use crate::export::{ExportReport, ProgressEvent};
use crate::naming::{NamingContext, NamingStrategy};

const ARROW: &str = "\u{2192}";

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Positional index + label, with the picture count for groups.
///
/// ```text
/// 001 Day Trips (2 pictures)
/// 002 beach
/// ```
fn entity_header(index: usize, label: &str, pictures: Option<usize>) -> String {
    match pictures {
        Some(1) => format!("{} {} (1 picture)", format_index(index), label),
        Some(n) => format!("{} {} ({} pictures)", format_index(index), label, n),
        None => format!("{} {}", format_index(index), label),
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Check
// ============================================================================

/// Collection tree with the page each node will be written to.
pub fn format_collection_tree(root: &Group, naming: &NamingStrategy) -> Vec<String> {
    let ctx = naming.context();
    let mut lines = vec![format!(
        "{} {ARROW} {}",
        root.name,
        naming.group_page(&NodeId::root())
    )];
    let mut groups = 1;
    walk_tree(root, &NodeId::root(), 0, naming, &ctx, &mut lines, &mut groups);

    lines.push(String::new());
    lines.push(format!(
        "{} in {}",
        plural(root.count_pictures(), "picture", "pictures"),
        plural(groups, "group", "groups")
    ));
    lines
}

fn walk_tree(
    group: &Group,
    id: &NodeId,
    depth: usize,
    naming: &NamingStrategy,
    ctx: &NamingContext,
    lines: &mut Vec<String>,
    groups: &mut usize,
) {
    let base = indent(depth);
    for (i, child) in group.children.iter().enumerate() {
        let child_id = id.child(i);
        let page = naming
            .node_page(&child_id, child, ctx)
            .unwrap_or_default();
        match child {
            SiteNode::Group(sub) => {
                *groups += 1;
                let header = entity_header(i + 1, &sub.name, Some(sub.count_pictures()));
                lines.push(format!("{base}{header} {ARROW} {page}"));
                walk_tree(sub, &child_id, depth + 1, naming, ctx, lines, groups);
            }
            SiteNode::Picture(picture) => {
                let label = if picture.description.is_empty() {
                    format!("({})", picture.file_name())
                } else {
                    picture.description.clone()
                };
                lines.push(format!("{base}{} {ARROW} {page}", entity_header(i + 1, &label, None)));
                lines.push(format!("{base}    Source: {}", picture.source.display()));
            }
        }
    }
}

/// Print the collection tree to stdout.
pub fn print_collection_tree(root: &Group, naming: &NamingStrategy) {
    for line in format_collection_tree(root, naming) {
        println!("{}", line);
    }
}

// ============================================================================
// Export
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_progress_event(event: &ProgressEvent) -> Vec<String> {
    match event {
        ProgressEvent::Started { total_pictures } => {
            vec![format!("Exporting {}", plural(*total_pictures, "picture", "pictures"))]
        }
        ProgressEvent::GroupStarted { name, .. } => vec![name.clone()],
        ProgressEvent::PictureRendered { file, done, total } => {
            vec![format!("    [{done}/{total}] {file}")]
        }
        ProgressEvent::FileUploaded { file } => vec![format!("    uploaded {file}")],
        ProgressEvent::UploadFailed { file, reason } => {
            vec![format!("    FAILED {file}: {reason}")]
        }
        ProgressEvent::Finished { interrupted: true } => vec!["Interrupted".to_string()],
        ProgressEvent::Finished { interrupted: false } => vec!["Done".to_string()],
    }
}

/// Summary of a finished run.
pub fn format_report(report: &ExportReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Rendered {}, {}",
        plural(report.pictures_rendered, "picture", "pictures"),
        plural(report.pages_written, "page", "pages")
    )];
    if report.pages_failed > 0 {
        lines.push(format!(
            "    {} could not be written",
            plural(report.pages_failed, "file", "files")
        ));
    }
    if report.placeholders > 0 {
        lines.push(format!(
            "    {} shown as placeholder",
            plural(report.placeholders, "picture", "pictures")
        ));
    }
    if report.zip_generated {
        lines.push("Zip archive written".to_string());
    }
    if report.interrupted {
        lines.push("Interrupted: the site is incomplete and was not published".to_string());
    }
    if let Some(publish) = &report.publish {
        let total = publish.delivered.len() + publish.failed.len();
        lines.push(format!("Published {} of {}", publish.delivered.len(), plural(total, "file", "files")));
        if let Some(reason) = &publish.aborted {
            lines.push(format!("    Aborted: {reason}"));
        }
    }
    lines
}

/// Print the run summary to stdout.
pub fn print_report(report: &ExportReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}
