//! Pure Rust rendition backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::ImageReader` |
//! | Rotate | `DynamicImage::rotate90` / `rotate180` / `rotate270` |
//! | Progressive downscale | `DynamicImage::resize_exact`, Triangle for intermediate steps, Lanczos3 for the last |
//! | Encode | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | Placeholder | `image::RgbImage::from_fn` |

use super::backend::{BackendError, Dimensions, RenditionBackend};
use super::calculations::{fit_within, normalize_rotation, step_sizes};
use super::params::{Quality, RenditionParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader, Rgb, RgbImage};
use std::path::Path;

/// Placeholder size when the request carries no bounding box.
const PLACEHOLDER_SIZE: (u32, u32) = (320, 240);
const PLACEHOLDER_FILL: Rgb<u8> = Rgb([160, 160, 160]);
const PLACEHOLDER_MARK: Rgb<u8> = Rgb([110, 110, 110]);

/// Pure Rust backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| BackendError::Decode {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

fn rotate(img: DynamicImage, degrees: u16) -> DynamicImage {
    match normalize_rotation(degrees) {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img,
    }
}

fn save_jpeg(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(writer, quality.for_encoder());
    encoder
        .encode_image(&img.to_rgb8())
        .map_err(|e| BackendError::Encode {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

/// Gray card with a darker diagonal cross.
fn placeholder_image(width: u32, height: u32) -> RgbImage {
    let (w, h) = (width.max(1) as i64, height.max(1) as i64);
    let thickness = (w.max(h) / 60).max(1);
    RgbImage::from_fn(width.max(1), height.max(1), |x, y| {
        let (x, y) = (x as i64, y as i64);
        let main = (x * h - y * w).abs() / w.max(h);
        let anti = (x * h + y * w - w * h).abs() / w.max(h);
        if main <= thickness || anti <= thickness {
            PLACEHOLDER_MARK
        } else {
            PLACEHOLDER_FILL
        }
    })
}

impl RenditionBackend for RustBackend {
    fn render(&self, params: &RenditionParams) -> Result<Dimensions, BackendError> {
        let img = rotate(load_image(&params.source)?, params.rotation);
        let source = img.dimensions();
        let target = params
            .bounds
            .map(|bounds| fit_within(source, bounds))
            .unwrap_or(source);

        let sizes = step_sizes(source, target, params.steps);
        let last = sizes.len().saturating_sub(1);
        let mut current = img;
        for (i, (w, h)) in sizes.into_iter().enumerate() {
            let filter = if i == last {
                FilterType::Lanczos3
            } else {
                FilterType::Triangle
            };
            current = current.resize_exact(w, h, filter);
        }

        save_jpeg(&current, &params.output, params.quality)?;
        Ok(current.dimensions().into())
    }

    fn render_placeholder(&self, params: &RenditionParams) -> Result<Dimensions, BackendError> {
        let (width, height) = params.bounds.unwrap_or(PLACEHOLDER_SIZE);
        let img = DynamicImage::ImageRgb8(placeholder_image(width, height));
        save_jpeg(&img, &params.output, params.quality)?;
        Ok(img.dimensions().into())
    }
}
