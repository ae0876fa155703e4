//! Shared test utilities for the photo-publish test suite.
//!
//! Builders for in-memory collection trees, synthetic image files, and a
//! couple of assertions over exported output.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let root = group("Holiday", vec![
//!     picture("beach.jpg"),
//!     group("Day two", vec![picture("hike.jpg")]),
//! ]);
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let collection = write_image_collection(tmp.path(), &["a.jpg", "sub/b.jpg"]);
//! ```

use image::{ImageEncoder, RgbImage};
use std::path::{Path, PathBuf};

use crate::collection::{Group, Picture, SiteNode};

// =========================================================================
// Tree builders
// =========================================================================

/// A group node with the given children.
pub fn group(name: &str, children: Vec<SiteNode>) -> SiteNode {
    SiteNode::Group(Group {
        name: name.to_string(),
        children,
    })
}

/// A picture node whose source is `file` and whose description is its stem.
pub fn picture(file: &str) -> SiteNode {
    let source = PathBuf::from(file);
    let description = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    SiteNode::Picture(Picture {
        source,
        description,
        ..Picture::default()
    })
}

/// Unwrap a root node built with [`group`]. Panics on a picture.
pub fn into_group(node: SiteNode) -> Group {
    match node {
        SiteNode::Group(g) => g,
        SiteNode::Picture(p) => panic!("expected a group, got picture {:?}", p.source),
    }
}

// =========================================================================
// Synthetic images
// =========================================================================

/// Write a small valid JPEG with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create one 64x48 JPEG per relative path under `dir` and return the
/// matching in-memory tree. Subdirectories become groups, in path order.
pub fn write_image_collection(dir: &Path, files: &[&str]) -> Group {
    for file in files {
        create_test_jpeg(&dir.join(file), 64, 48);
    }
    crate::collection::scan_directory(dir).unwrap()
}

// =========================================================================
// Output assertions
// =========================================================================

/// Read an exported file as a string. Panics with the listing on miss.
pub fn read_output(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap_or_else(|_| {
        let present: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        panic!("'{name}' not found in output. Present: {present:?}")
    })
}

/// Number of non-overlapping occurrences of `needle` in `haystack`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
