//! Shared test utilities for the media-versions test suite.
//!
//! Provides a ready-made aggregate, real encoded image bytes for backends
//! that decode for real, and a storage wrapper whose writes can be made to
//! fail on demand.

use crate::geometry::Size;
use crate::model::{Image, ImageId, Rendition, RenditionRef};
use crate::storage::{MemoryStorage, Storage, StorageError};
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, Luma, LumaA, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};

// =========================================================================
// Aggregates
// =========================================================================

/// An 800x600 color PNG image with only its original rendition.
pub fn sample_image() -> Image {
    let original = Rendition::original(
        ImageId::new("abc"),
        "photo.png".into(),
        "image/png".into(),
        Size::new(800, 600),
        false,
    )
    .unwrap();
    Image::new(original)
}

// =========================================================================
// Encoded bytes
// =========================================================================

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// A `width × height` RGB PNG with a horizontal gradient.
pub fn rgb_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| Rgb([(x % 256) as u8, 80, 160]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// A `width × height` 8-bit gray-with-alpha PNG.
pub fn gray_alpha_png(width: u32, height: u32) -> Vec<u8> {
    let img = GrayAlphaImage::from_pixel(width, height, LumaA([128, 64]));
    encode(DynamicImage::ImageLumaA8(img), ImageFormat::Png)
}

/// A `width × height` 8-bit grayscale PNG.
pub fn gray_png(width: u32, height: u32) -> Vec<u8> {
    let img = GrayImage::from_pixel(width, height, Luma([128]));
    encode(DynamicImage::ImageLuma8(img), ImageFormat::Png)
}

// =========================================================================
// Storage with injectable failures
// =========================================================================

/// [`MemoryStorage`] whose byte or record writes can be switched to fail.
#[derive(Default)]
pub struct FailingStorage {
    inner: MemoryStorage,
    fail_bytes: AtomicBool,
    fail_images: AtomicBool,
}

impl FailingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_bytes(&self, fail: bool) {
        self.fail_bytes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_images(&self, fail: bool) {
        self.fail_images.store(fail, Ordering::SeqCst);
    }
}

impl Storage for FailingStorage {
    fn load_bytes(&self, rendition: &RenditionRef) -> Result<Vec<u8>, StorageError> {
        self.inner.load_bytes(rendition)
    }

    fn save_bytes(&self, rendition: &RenditionRef, bytes: &[u8]) -> Result<(), StorageError> {
        if self.fail_bytes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected bytes failure".into()));
        }
        self.inner.save_bytes(rendition, bytes)
    }

    fn save_image(&self, image: &Image) -> Result<(), StorageError> {
        if self.fail_images.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected record failure".into()));
        }
        self.inner.save_image(image)
    }

    fn load_image(&self, id: &ImageId) -> Result<Option<Image>, StorageError> {
        self.inner.load_image(id)
    }
}
