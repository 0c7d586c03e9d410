//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::load_from_memory_with_format` after `image::guess_format` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Resample | `DynamicImage::crop_imm` + `resize_exact` |

use super::backend::{BackendError, Decoded, ImageBackend};
use super::params::{OutputFormat, Quality, ResampleFilter};
use crate::geometry::Rect;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::DynamicImage;

/// Pure Rust backend using the `image` crate ecosystem.
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

/// JPEG has no alpha channel and no 16-bit depth; flatten to 8-bit RGB or luma.
fn jpeg_compatible(image: &DynamicImage) -> DynamicImage {
    if image.color().has_color() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        DynamicImage::ImageLuma8(image.to_luma8())
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, BackendError> {
        let format = image::guess_format(bytes)
            .map_err(|e| BackendError::Decode(format!("Unrecognized image format: {}", e)))?;
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| BackendError::Decode(format!("Failed to decode {:?}: {}", format, e)))?;
        Ok(Decoded { image, format })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let mut buf = Vec::new();
        let result = match format {
            OutputFormat::Png => image.write_with_encoder(PngEncoder::new(&mut buf)),
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
                jpeg_compatible(image).write_with_encoder(encoder)
            }
        };
        result.map_err(|e| BackendError::Encode(format!("{:?} encode failed: {}", format, e)))?;
        Ok(buf)
    }

    fn resample(
        &self,
        image: &DynamicImage,
        source: Rect,
        width: u32,
        height: u32,
        filter: ResampleFilter,
    ) -> Result<DynamicImage, BackendError> {
        let bounds = Rect::new(0, 0, image.width() as i32, image.height() as i32);
        if source.is_empty() || !bounds.contains_rect(&source) {
            return Err(BackendError::ProcessingFailed(format!(
                "Source rect {:?} is outside the {}x{} image",
                source,
                image.width(),
                image.height()
            )));
        }
        let region = image.crop_imm(
            source.min_x as u32,
            source.min_y as u32,
            source.width() as u32,
            source.height() as u32,
        );
        Ok(region.resize_exact(width, height, filter.into()))
    }
}
