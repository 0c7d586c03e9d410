//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three pixel operations the version
//! engine needs from the outside world: decode, encode, and resample.
//! Everything above it (geometry, caching, persistence) is backend-agnostic.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{OutputFormat, Quality, ResampleFilter};
use crate::geometry::Rect;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// Unrecognized or corrupt source bytes.
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// A decoded buffer plus the format it was decoded from.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

/// Trait for image processing backends.
pub trait ImageBackend: Send + Sync {
    /// Decode raw bytes, detecting the format from content.
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, BackendError>;

    /// Encode a buffer for storage.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;

    /// Scale the `source` region of `image` to exactly `width × height`.
    /// `source` must lie within the image's bounds.
    fn resample(
        &self,
        image: &DynamicImage,
        source: Rect,
        width: u32,
        height: u32,
        filter: ResampleFilter,
    ) -> Result<DynamicImage, BackendError>;
}
