//! The picture collection an export run reads from.
//!
//! A collection is a tree of [`SiteNode`]s: groups own an ordered list of
//! children, pictures are leaves pointing at a source image. The export core
//! only ever borrows the tree; nothing in this crate mutates it once loaded.
//!
//! ## Sources
//!
//! Collections come from one of two places:
//!
//! - **A directory tree.** Directories become groups, image files become
//!   pictures. Entries are ordered by their optional `NNN-` prefix, then by
//!   name, and the prefix is stripped from titles:
//!
//!   ```text
//!   holiday/                      # root group "holiday"
//!   ├── 010-beach.jpg             # picture, description "beach"
//!   ├── 010-beach.txt             # sidecar: replaces the description
//!   ├── 020-sunset.jpg
//!   └── 030-Day-Trips/            # subgroup "Day Trips"
//!       └── 001-harbour.jpg
//!   ```
//!
//! - **A `collection.json` document** carrying the full picture metadata
//!   (rotation, coordinates, photographer and so on) that a directory tree
//!   cannot express.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Collection root must be a group: {0}")]
    NotAGroup(PathBuf),
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp"];

/// A node of the collection tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteNode {
    Group(Group),
    Picture(Picture),
}

impl SiteNode {
    /// Display label used in page titles, breadcrumbs and log lines.
    pub fn label(&self) -> &str {
        match self {
            SiteNode::Group(group) => &group.name,
            SiteNode::Picture(picture) => &picture.description,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            SiteNode::Group(group) => Some(group),
            SiteNode::Picture(_) => None,
        }
    }

    pub fn as_picture(&self) -> Option<&Picture> {
        match self {
            SiteNode::Picture(picture) => Some(picture),
            SiteNode::Group(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub children: Vec<SiteNode>,
}

impl Group {
    /// Number of pictures in this group and every group below it.
    pub fn count_pictures(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                SiteNode::Group(group) => group.count_pictures(),
                SiteNode::Picture(_) => 1,
            })
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Picture {
    /// Location of the original image.
    pub source: PathBuf,
    #[serde(default)]
    pub description: String,
    /// Clockwise rotation in degrees applied when rendering.
    #[serde(default)]
    pub rotation: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LatLng>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub creation_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub photographer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub film_reference: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub copyright_holder: String,
}

impl Picture {
    /// File name of the source image, e.g. `beach.jpg`.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased source extension, empty when there is none.
    pub fn extension(&self) -> String {
        self.source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Structural address of a node: child indices from the root.
///
/// The root group has the empty path. Identical trees produce identical ids,
/// which is what makes hash-mode filenames reproducible across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(Vec<usize>);

impl NodeId {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Position among its siblings; `None` for the root.
    pub fn index(&self) -> Option<usize> {
        self.0.last().copied()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        f.write_str(&parts.join("/"))
    }
}

/// Visit every picture in depth-first pre-order, the order the export walks.
pub fn for_each_picture<'a>(root: &'a Group, mut visit: impl FnMut(NodeId, &'a Picture)) {
    fn walk<'a>(group: &'a Group, id: NodeId, visit: &mut impl FnMut(NodeId, &'a Picture)) {
        for (i, child) in group.children.iter().enumerate() {
            let child_id = id.child(i);
            match child {
                SiteNode::Picture(picture) => visit(child_id, picture),
                SiteNode::Group(sub) => walk(sub, child_id, visit),
            }
        }
    }
    walk(root, NodeId::root(), &mut visit);
}

// =============================================================================
// Loading
// =============================================================================

/// Load a collection from a directory or a `.json` document.
///
/// A directory containing `collection.json` is read from that document;
/// any other directory is scanned.
pub fn load(path: &Path) -> Result<Group, CollectionError> {
    if path.is_dir() {
        let document = path.join("collection.json");
        if document.is_file() {
            return load_json(&document);
        }
        return scan_directory(path);
    }
    load_json(path)
}

/// Read a collection document. The root node must be a group; relative
/// picture sources resolve against the document's directory.
pub fn load_json(path: &Path) -> Result<Group, CollectionError> {
    let content = fs::read_to_string(path)?;
    let node: SiteNode = serde_json::from_str(&content)?;
    let SiteNode::Group(mut root) = node else {
        return Err(CollectionError::NotAGroup(path.to_path_buf()));
    };
    if let Some(base) = path.parent() {
        resolve_sources(&mut root, base);
    }
    Ok(root)
}

fn resolve_sources(group: &mut Group, base: &Path) {
    for child in &mut group.children {
        match child {
            SiteNode::Picture(picture) if picture.source.is_relative() => {
                picture.source = base.join(&picture.source);
            }
            SiteNode::Picture(_) => {}
            SiteNode::Group(sub) => resolve_sources(sub, base),
        }
    }
}

/// Build a collection from a directory tree.
pub fn scan_directory(root: &Path) -> Result<Group, CollectionError> {
    let name = root
        .file_name()
        .map(|n| display_title(&n.to_string_lossy()))
        .unwrap_or_else(|| "Pictures".to_string());
    scan_group(root, name)
}

fn scan_group(path: &Path, name: String) -> Result<Group, CollectionError> {
    let mut children = Vec::new();
    for entry in collect_entries(path)? {
        let file_name = entry.file_name().unwrap_or_default().to_string_lossy().into_owned();
        if entry.is_dir() {
            children.push(SiteNode::Group(scan_group(&entry, display_title(&file_name))?));
        } else if is_image(&entry) {
            children.push(SiteNode::Picture(build_picture(&entry)?));
        }
    }
    Ok(Group { name, children })
}

/// Directory entries ordered by number prefix, then by name.
fn collect_entries(path: &Path) -> Result<Vec<PathBuf>, CollectionError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name == "collection.json" {
            continue;
        }
        entries.push(entry.into_path());
    }
    entries.sort_by_key(|p| {
        let name = p.file_name().unwrap_or_default().to_string_lossy().into_owned();
        (parse_number_prefix(&name).unwrap_or(u32::MAX), name)
    });
    Ok(entries)
}

fn is_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    path.is_file() && IMAGE_EXTENSIONS.contains(&ext.as_str())
}

fn build_picture(path: &Path) -> Result<Picture, CollectionError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sidecar = path.with_extension("txt");
    let description = if sidecar.is_file() {
        fs::read_to_string(&sidecar)?.trim().to_string()
    } else {
        display_title(&stem)
    };
    Ok(Picture {
        source: path.to_path_buf(),
        description,
        ..Picture::default()
    })
}

/// Parse just the number prefix from a name
fn parse_number_prefix(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    prefix.parse().ok()
}

/// Title for an entry name: `NNN-` prefix dropped, dashes become spaces.
///
/// - `"030-Day-Trips"` → `"Day Trips"`
/// - `"001"` → `"001"` (nothing left after the number, keep it)
/// - `"wip-drafts"` → `"wip drafts"`
fn display_title(name: &str) -> String {
    if let Some((prefix, rest)) = name.split_once('-')
        && prefix.parse::<u32>().is_ok()
        && !rest.is_empty()
    {
        return rest.replace('-', " ");
    }
    name.replace('-', " ")
}
