//! Deterministic node → filename mapping.
//!
//! Every filename the export writes or links to comes from here. The page
//! renderer, the index matrix and the Previous/Next links all ask the
//! [`NamingStrategy`] instead of deriving names themselves, so a picture can
//! never be linked under one name and written under another.
//!
//! ## Modes
//!
//! | Mode | Picture stem | Example |
//! |------|--------------|---------|
//! | `hash` | `node_` + 12 hex digits of the node's structural hash | `node_3fa9c0d21b7e_l.jpg` |
//! | `original_name` | sanitized source stem | `Beach_and_Sun_l.jpg` |
//! | `sequential` | zero-padded `start + rendered` | `00007_l.jpg` |
//!
//! The root group is always `index.htm`; every other group is named by the
//! hash rule regardless of mode.
//!
//! ## Sequential numbering
//!
//! The number belongs to the [`NamingContext`], which ticks once per distinct
//! picture the walker claims. Looking up a sibling's filename (for a Next link
//! or the index matrix) never ticks; it answers with the number the picture
//! will receive, which is its depth-first position in the tree.
//!
//! ## Original-name collisions
//!
//! Two pictures that sanitize to the same stem (compared case-insensitively)
//! are disambiguated in traversal order: the first keeps the stem, later ones
//! get `_2`, `_3`, … appended. Stems of the index page, the static assets and
//! the group pages are taken before any picture is planned, so a picture
//! called `index.jpg` becomes `index_2.htm` rather than replacing the root page.

use crate::collection::{Group, NodeId, Picture, SiteNode, for_each_picture};
use crate::config::{NamingMode, NamingOptions};
use crate::generate::{FOLDER_ICON, MOUSEOVER_SCRIPT, ROBOTS_TXT, STYLESHEET};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Filename of the root group's page.
pub const INDEX_PAGE: &str = "index.htm";

const PAGE_EXTENSION: &str = "htm";
const LOWRES_SUFFIX: &str = "_l";
const MIDRES_SUFFIX: &str = "_m";
const HIGHRES_SUFFIX: &str = "_h";
/// Scaled renditions are always JPEG-encoded.
const RENDITION_EXTENSION: &str = "jpg";

/// The four output names belonging to one picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureFiles {
    pub lowres: String,
    pub midres: String,
    pub highres: String,
    /// Midres browsing page.
    pub page: String,
}

/// Make a source file stem safe for use as a URL and filename.
///
/// `%20` and spaces become `_`, `&` becomes `_and_`, `|` becomes `l`, other
/// problematic punctuation becomes `_`. A raw `%` is replaced last so the
/// `%20` pass sees the original text. Applying it twice equals applying it once.
pub fn sanitize_filename(name: &str) -> String {
    let without_encoded_spaces = name.replace("%20", "_");
    let mut out = String::with_capacity(without_encoded_spaces.len());
    for c in without_encoded_spaces.chars() {
        match c {
            ' ' => out.push('_'),
            '&' => out.push_str("_and_"),
            '|' => out.push('l'),
            '<' | '>' | '@' | ':' | '$' | '£' | '^' | '~' | '"' | '\'' | '`' | '?' | '['
            | ']' | '{' | '}' | '(' | ')' | '*' | '+' | '/' | '\\' => out.push('_'),
            _ => out.push(c),
        }
    }
    out.replace('%', "_")
}

/// 12 hex digits of SHA-256 over the node's kind and structural address.
fn structural_hash(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..12].to_string()
}

fn group_key(id: &NodeId) -> String {
    format!("g:{id}")
}

fn picture_key(id: &NodeId, picture: &Picture) -> String {
    format!("p:{id}:{}", picture.file_name())
}

/// Per-picture facts fixed before the walk starts.
#[derive(Debug, Clone)]
struct PicturePlan {
    /// Depth-first position among all pictures, 0-based.
    ordinal: u32,
    /// Stem used by the hash and original-name modes.
    stem: String,
    highres_extension: String,
}

/// Single-writer sequence counter for sequential naming.
///
/// Owned by the export walk and passed by reference to every lookup.
#[derive(Debug)]
pub struct NamingContext {
    start: u32,
    rendered: u32,
    claimed: HashMap<NodeId, u32>,
}

impl NamingContext {
    pub fn new(start: u32) -> Self {
        Self {
            start,
            rendered: 0,
            claimed: HashMap::new(),
        }
    }

    /// Record that `id` is being rendered and return its sequence number.
    ///
    /// Ticks once per distinct picture; claiming the same node again returns
    /// the number it already holds.
    pub fn claim(&mut self, id: &NodeId) -> u32 {
        if let Some(&number) = self.claimed.get(id) {
            return number;
        }
        let number = self.start.saturating_add(self.rendered);
        self.rendered = self.rendered.saturating_add(1);
        self.claimed.insert(id.clone(), number);
        number
    }

    /// Pictures claimed so far.
    pub fn rendered(&self) -> u32 {
        self.rendered
    }

    fn claimed_number(&self, id: &NodeId) -> Option<u32> {
        self.claimed.get(id).copied()
    }
}

/// Filename authority for one export run.
#[derive(Debug, Clone)]
pub struct NamingStrategy {
    mode: NamingMode,
    start: u32,
    pictures: HashMap<NodeId, PicturePlan>,
}

impl NamingStrategy {
    /// Plan names for every picture below `root`.
    pub fn new(root: &Group, options: &NamingOptions, rotate_highres: bool) -> Self {
        let mut pictures = HashMap::new();
        let mut taken = reserved_stems(root);
        let mut ordinal = 0u32;

        for_each_picture(root, |id, picture| {
            let stem = match options.mode {
                NamingMode::OriginalName => {
                    let base = picture
                        .source
                        .file_stem()
                        .map(|s| sanitize_filename(&s.to_string_lossy()))
                        .unwrap_or_default();
                    disambiguate(&base, &mut taken)
                }
                _ => format!("node_{}", structural_hash(&picture_key(&id, picture))),
            };
            let highres_extension = if rotate_highres && picture.rotation % 360 != 0 {
                RENDITION_EXTENSION.to_string()
            } else {
                let ext = picture.extension();
                if ext.is_empty() {
                    RENDITION_EXTENSION.to_string()
                } else {
                    ext
                }
            };
            pictures.insert(
                id,
                PicturePlan {
                    ordinal,
                    stem,
                    highres_extension,
                },
            );
            ordinal += 1;
        });

        Self {
            mode: options.mode,
            start: options.start,
            pictures,
        }
    }

    pub fn mode(&self) -> NamingMode {
        self.mode
    }

    /// A fresh counter for one walk of the tree.
    pub fn context(&self) -> NamingContext {
        NamingContext::new(self.start)
    }

    /// Page filename of a group.
    pub fn group_page(&self, id: &NodeId) -> String {
        if id.is_root() {
            INDEX_PAGE.to_string()
        } else {
            format!("node_{}.{PAGE_EXTENSION}", structural_hash(&group_key(id)))
        }
    }

    /// Output names of the picture at `id`. Never advances the counter.
    ///
    /// Returns `None` when `id` is not a picture of the planned tree.
    pub fn picture_files(&self, id: &NodeId, ctx: &NamingContext) -> Option<PictureFiles> {
        let plan = self.pictures.get(id)?;
        let stem = match self.mode {
            NamingMode::Sequential => {
                let number = ctx
                    .claimed_number(id)
                    .unwrap_or_else(|| self.start.saturating_add(plan.ordinal));
                format!("{number:05}")
            }
            NamingMode::Hash | NamingMode::OriginalName => plan.stem.clone(),
        };
        Some(PictureFiles {
            lowres: format!("{stem}{LOWRES_SUFFIX}.{RENDITION_EXTENSION}"),
            midres: format!("{stem}{MIDRES_SUFFIX}.{RENDITION_EXTENSION}"),
            highres: format!("{stem}{HIGHRES_SUFFIX}.{}", plan.highres_extension),
            page: format!("{stem}.{PAGE_EXTENSION}"),
        })
    }

    /// Page a link to `node` should point at: the group page for groups, the
    /// midres page for pictures.
    pub fn node_page(&self, id: &NodeId, node: &SiteNode, ctx: &NamingContext) -> Option<String> {
        match node {
            SiteNode::Group(_) => Some(self.group_page(id)),
            SiteNode::Picture(_) => self.picture_files(id, ctx).map(|files| files.page),
        }
    }
}

/// Lowercased stems of every non-picture file the export writes.
fn reserved_stems(root: &Group) -> HashSet<String> {
    fn group_stems(group: &Group, id: NodeId, taken: &mut HashSet<String>) {
        for (i, child) in group.children.iter().enumerate() {
            if let SiteNode::Group(sub) = child {
                let child_id = id.child(i);
                taken.insert(format!("node_{}", structural_hash(&group_key(&child_id))));
                group_stems(sub, child_id, taken);
            }
        }
    }

    let mut taken: HashSet<String> = [
        INDEX_PAGE,
        STYLESHEET,
        MOUSEOVER_SCRIPT,
        FOLDER_ICON,
        ROBOTS_TXT,
    ]
    .iter()
    .filter_map(|name| Path::new(name).file_stem())
    .map(|stem| stem.to_string_lossy().to_lowercase())
    .collect();
    group_stems(root, NodeId::root(), &mut taken);
    taken
}

fn disambiguate(base: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while !taken.insert(candidate.to_lowercase()) {
        candidate = format!("{base}_{n}");
        n += 1;
    }
    candidate
}
