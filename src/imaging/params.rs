//! Parameter types for rendition work.
//!
//! These structs describe *what* to produce, not *how*. They are the
//! interface between the export walk (which decides which renditions a
//! picture needs) and the [`backend`](super::backend) that does the pixel
//! work, so a mock backend can stand in during tests.

use std::path::PathBuf;

/// JPEG encoding quality, 0–100 as configured.
///
/// Encoders that reject 0 receive 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Quality in the 1–100 range JPEG encoders accept.
    pub fn for_encoder(self) -> u8 {
        self.0.max(1)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// One scaled, rotated, JPEG-encoded copy of a source image.
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Bounding box `(width, height)`. `None` keeps the source size.
    pub bounds: Option<(u32, u32)>,
    pub quality: Quality,
    /// Clockwise degrees; snapped to the nearest quarter turn.
    pub rotation: u16,
    /// Number of progressive downscale steps.
    pub steps: u32,
}
