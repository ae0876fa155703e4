//! Rendition production: scaled, rotated JPEG copies of source pictures.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Fit + progressive downscale** | [`calculations`] + `resize_exact` |
//! | **Encode** | `JpegEncoder::new_with_quality` |
//! | **Placeholder** | generated gray card |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for rotation and dimension math (unit testable)
//! - **Parameters**: Data structures describing one rendition
//! - **Backend**: [`RenditionBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, RenditionBackend};
pub use params::{Quality, RenditionParams};
pub use rust_backend::RustBackend;
