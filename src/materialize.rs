//! Producing the pixels of a new rendition.
//!
//! [`plan`] decides between the two paths, [`render`] executes it:
//!
//! 1. **Resample**: the source rectangle lies within the original. The region
//!    is scaled to the output size by the backend.
//! 2. **Canvas**: the source rectangle extends past the original (only
//!    cover-from-outside requests do this). A canvas of the output size is
//!    filled with the outside color. With [`OutsideFill::Composite`] the part
//!    of the original inside the rectangle is then scaled and drawn at its
//!    projected position; with [`OutsideFill::FillOnly`] the canvas stays a
//!    flat fill.
//!
//! Grayscale keys always produce grayscale buffers, on either path.

use crate::cache::VersionKey;
use crate::config::OutsideFill;
use crate::geometry::{Placement, Rect, project_overlap};
use crate::imaging::{BackendError, ImageBackend, ResampleFilter};
use image::{DynamicImage, GrayImage, RgbaImage, imageops};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionPlan {
    Resample { source: Rect },
    Canvas { overlay: Option<Placement> },
}

/// Choose how to produce `key` from an original with the given `bounds`.
pub fn plan(bounds: Rect, key: &VersionKey, outside: OutsideFill) -> RenditionPlan {
    if bounds.contains_rect(&key.source_rect) {
        return RenditionPlan::Resample {
            source: key.source_rect,
        };
    }
    let overlay = match outside {
        OutsideFill::Composite => project_overlap(key.source_rect, bounds, key.width, key.height),
        OutsideFill::FillOnly => None,
    };
    RenditionPlan::Canvas { overlay }
}

/// Execute `plan` against the decoded original.
pub fn render<B: ImageBackend + ?Sized>(
    backend: &B,
    original: &DynamicImage,
    key: &VersionKey,
    plan: &RenditionPlan,
    filter: ResampleFilter,
) -> Result<DynamicImage, BackendError> {
    let rendered = match plan {
        RenditionPlan::Resample { source } => {
            backend.resample(original, *source, key.width, key.height, filter)?
        }
        RenditionPlan::Canvas { overlay } => {
            let mut canvas = blank_canvas(key);
            if let Some(p) = overlay {
                let visible = backend.resample(original, p.crop, p.width, p.height, filter)?;
                imageops::overlay(&mut canvas, &visible, p.x, p.y);
            }
            canvas
        }
    };
    Ok(if key.grayscale && rendered.color().has_color() {
        DynamicImage::ImageLuma8(rendered.to_luma8())
    } else {
        rendered
    })
}

fn blank_canvas(key: &VersionKey) -> DynamicImage {
    if key.grayscale {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(
            key.width,
            key.height,
            key.outside_color.to_luma(),
        ))
    } else {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            key.width,
            key.height,
            key.outside_color.to_rgba(),
        ))
    }
}
