//! Rendition backend trait and shared types.
//!
//! The [`RenditionBackend`] trait is the seam between the export walk and
//! pixel work: render a scaled rendition, or write a placeholder when the
//! source cannot be decoded. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::RenditionParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("Failed to encode {path}: {message}")]
    Encode { path: String, message: String },
}

/// Pixel size of a written rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for rendition backends.
///
/// `Send + Sync` so a backend can move into the background export thread.
pub trait RenditionBackend: Send + Sync {
    /// Decode `params.source`, rotate, fit within the bounds without
    /// upscaling, and JPEG-encode to `params.output`.
    fn render(&self, params: &RenditionParams) -> Result<Dimensions, BackendError>;

    /// Write a neutral placeholder image to `params.output`.
    ///
    /// Used when the source is unreadable; only `output`, `bounds` and
    /// `quality` are consulted.
    fn render_placeholder(&self, params: &RenditionParams) -> Result<Dimensions, BackendError>;
}

impl<B: RenditionBackend + ?Sized> RenditionBackend for Box<B> {
    fn render(&self, params: &RenditionParams) -> Result<Dimensions, BackendError> {
        (**self).render(params)
    }

    fn render_placeholder(&self, params: &RenditionParams) -> Result<Dimensions, BackendError> {
        (**self).render_placeholder(params)
    }
}
