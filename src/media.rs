//! The request surface: ingest originals and resolve versions.
//!
//! A version request goes through these steps:
//!
//! ```text
//! request ─▶ geometry ─▶ cache lookup ─┬─ hit ──────────────────────────────▶ rendition
//!                                      └─ miss ─▶ load original ─▶ render
//!                                                 ─▶ save bytes ─▶ append ─▶ save record ─▶ rendition
//! ```
//!
//! ## Per-image locking
//!
//! [`Media`] hands out one shared [`ImageHandle`] per image id. The handle's
//! mutex is held for the whole lookup-then-create sequence, so concurrent
//! requests for the same key materialize it once; the second caller sees
//! the first caller's rendition as a cache hit. Requests for different
//! images never contend.
//!
//! ## Partial failure
//!
//! Bytes are saved before the rendition is appended. If that save fails,
//! nothing changed. If the bytes are saved but the image record is not, the
//! append is undone in memory and [`MediaError::AggregateNotSaved`] is
//! returned: the stored bytes then exist without a record listing them.
//! Retrying the same request writes the same content address again.
//!
//! A failed record save does not guarantee the stored record is unchanged.
//! A backend that fails after partly writing (for example after writing the
//! new record but before reporting success) may already list the rendition,
//! and a later [`Media::open`] from storage will then see it.

use crate::cache::{CacheStats, VersionKey};
use crate::color::FillColor;
use crate::config::{Config, MediaSettings};
use crate::geometry::{FitPolicy, GeometryError, HorAlign, Rect, Size, VerAlign, source_rect};
use crate::imaging::{BackendError, ImageBackend, OutputFormat, Quality, RustBackend};
use crate::materialize;
use crate::model::{Image, ImageId, Rendition};
use crate::storage::{Storage, StorageError};
use image::ColorType;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
    /// Rendition bytes were stored but the image record listing them was not.
    #[error("Rendition {rendition} stored but image record not saved: {source}")]
    AggregateNotSaved {
        rendition: String,
        #[source]
        source: StorageError,
    },
    #[error("Image not found: {0}")]
    NotFound(ImageId),
    #[error("Lock poisoned for image {0}")]
    LockPoisoned(ImageId),
}

impl MediaError {
    /// Whether the source bytes could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, MediaError::Imaging(BackendError::Decode(_)))
    }
}

/// Shared handle to one image. Clones refer to the same aggregate.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    id: ImageId,
    image: Arc<Mutex<Image>>,
}

impl ImageHandle {
    pub fn id(&self) -> &ImageId {
        &self.id
    }

    fn lock(&self) -> Result<MutexGuard<'_, Image>, MediaError> {
        self.image
            .lock()
            .map_err(|_| MediaError::LockPoisoned(self.id.clone()))
    }

    /// A copy of the aggregate as it is now.
    pub fn snapshot(&self) -> Result<Image, MediaError> {
        Ok(self.lock()?.clone())
    }

    /// Whether two handles refer to the same in-memory aggregate.
    pub fn ptr_eq(&self, other: &ImageHandle) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

/// Version engine bound to one storage backend and one pixel backend.
pub struct Media<B: ImageBackend = RustBackend> {
    storage: Arc<dyn Storage>,
    pixels: B,
    settings: MediaSettings,
    open: Mutex<HashMap<ImageId, Weak<Mutex<Image>>>>,
    hits: AtomicU32,
    misses: AtomicU32,
}

impl Media<RustBackend> {
    pub fn new(config: Config) -> Self {
        Self::with_backend(config, RustBackend::new())
    }
}

impl<B: ImageBackend> Media<B> {
    pub fn with_backend(config: Config, pixels: B) -> Self {
        Self {
            storage: config.backend,
            pixels,
            settings: config.settings,
            open: Mutex::new(HashMap::new()),
            hits: AtomicU32::new(0),
            misses: AtomicU32::new(0),
        }
    }

    pub fn settings(&self) -> &MediaSettings {
        &self.settings
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn quality(&self) -> Quality {
        Quality::new(self.settings.encoding.jpeg_quality)
    }

    /// Ingest a new original.
    ///
    /// PNG and JPEG bytes are stored unchanged. Any other decodable format is
    /// re-encoded as PNG (filename gains a `.png` suffix) and re-decoded, so
    /// the recorded size is that of the stored buffer. The image id covers
    /// filename and bytes: uploading the same file under the same name again
    /// returns the existing image, a different name creates a new one.
    pub fn create_from_bytes(&self, filename: &str, data: &[u8]) -> Result<ImageHandle, MediaError> {
        let mut decoded = self.pixels.decode(data)?;
        let (format, reencode) = OutputFormat::for_source(decoded.format);

        let mut filename = filename.to_string();
        let normalized;
        let data = if reencode {
            normalized = self.pixels.encode(&decoded.image, format, self.quality())?;
            filename = format!("{}.{}", filename, format.extension());
            decoded = self.pixels.decode(&normalized)?;
            normalized.as_slice()
        } else {
            data
        };

        let id = ImageId::for_upload(&filename, data);
        let mut open = self.lock_open()?;
        if let Some(handle) = self.find_open(&mut open, &id)? {
            debug!("{filename}: already stored as {id}");
            return Ok(handle);
        }

        let size = Size::new(decoded.image.width(), decoded.image.height());
        // Gray with alpha is stored as color so the alpha channel survives.
        let grayscale = matches!(decoded.image.color(), ColorType::L8 | ColorType::L16);
        let original = Rendition::original(
            id.clone(),
            filename,
            format.content_type().to_string(),
            size,
            grayscale,
        )?;
        self.storage.save_bytes(&original.storage_ref(), data)?;
        let image = Image::new(original);
        self.storage.save_image(&image)?;
        info!(
            "Stored {} ({}x{}, {}) as {id}",
            image.filename(),
            size.width,
            size.height,
            image.content_type()
        );

        Ok(Self::register(&mut open, image))
    }

    /// Handle to a stored image.
    pub fn open(&self, id: &ImageId) -> Result<ImageHandle, MediaError> {
        let mut open = self.lock_open()?;
        self.find_open(&mut open, id)?
            .ok_or_else(|| MediaError::NotFound(id.clone()))
    }

    /// Replace the descriptive metadata of an image and persist the record.
    pub fn set_details(
        &self,
        handle: &ImageHandle,
        description: Option<String>,
        link: Option<String>,
    ) -> Result<(), MediaError> {
        let mut image = handle.lock()?;
        let previous = (image.description.take(), image.link.take());
        image.description = description;
        image.link = link;
        if let Err(e) = self.storage.save_image(&image) {
            (image.description, image.link) = previous;
            return Err(e.into());
        }
        Ok(())
    }

    /// Raw stored bytes of a rendition.
    pub fn load_bytes(&self, rendition: &Rendition) -> Result<Vec<u8>, MediaError> {
        Ok(self.storage.load_bytes(&rendition.storage_ref())?)
    }

    /// Fit-inside version: the largest region of the original with the
    /// requested aspect ratio, scaled to `width × height`.
    pub fn version(
        &self,
        handle: &ImageHandle,
        width: u32,
        height: u32,
        hor: HorAlign,
        ver: VerAlign,
        grayscale: bool,
    ) -> Result<Rendition, MediaError> {
        let fill = self.settings.versions.default_fill;
        self.policy_version(handle, FitPolicy::Inside, width, height, hor, ver, grayscale, fill)
    }

    /// Cover-from-outside version: the whole original, with `outside_color`
    /// bars where the requested aspect ratio extends past it.
    #[allow(clippy::too_many_arguments)]
    pub fn version_covering_outside(
        &self,
        handle: &ImageHandle,
        width: u32,
        height: u32,
        hor: HorAlign,
        ver: VerAlign,
        grayscale: bool,
        outside_color: FillColor,
    ) -> Result<Rendition, MediaError> {
        self.policy_version(
            handle,
            FitPolicy::Outside,
            width,
            height,
            hor,
            ver,
            grayscale,
            outside_color,
        )
    }

    pub fn centered_version(
        &self,
        handle: &ImageHandle,
        width: u32,
        height: u32,
        grayscale: bool,
    ) -> Result<Rendition, MediaError> {
        self.version(handle, width, height, HorAlign::Center, VerAlign::Center, grayscale)
    }

    pub fn centered_version_covering_outside(
        &self,
        handle: &ImageHandle,
        width: u32,
        height: u32,
        grayscale: bool,
        outside_color: FillColor,
    ) -> Result<Rendition, MediaError> {
        self.version_covering_outside(
            handle,
            width,
            height,
            HorAlign::Center,
            VerAlign::Center,
            grayscale,
            outside_color,
        )
    }

    /// Version sampled from an explicit source rectangle.
    ///
    /// Returns the existing rendition for an identical key, or renders,
    /// stores, and records a new one.
    pub fn source_rect_version(
        &self,
        handle: &ImageHandle,
        source_rect: Rect,
        width: u32,
        height: u32,
        grayscale: bool,
        outside_color: FillColor,
    ) -> Result<Rendition, MediaError> {
        let mut image = handle.lock()?;
        self.resolve(
            &mut image,
            VersionKey {
                source_rect,
                width,
                height,
                grayscale,
                outside_color,
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn policy_version(
        &self,
        handle: &ImageHandle,
        policy: FitPolicy,
        width: u32,
        height: u32,
        hor: HorAlign,
        ver: VerAlign,
        grayscale: bool,
        outside_color: FillColor,
    ) -> Result<Rendition, MediaError> {
        let mut image = handle.lock()?;
        let source_rect = source_rect(policy, image.size(), Size::new(width, height), hor, ver)?;
        self.resolve(
            &mut image,
            VersionKey {
                source_rect,
                width,
                height,
                grayscale,
                outside_color,
            },
        )
    }

    /// Cache lookup and, on miss, materialization. Caller holds the image lock.
    fn resolve(&self, image: &mut Image, mut key: VersionKey) -> Result<Rendition, MediaError> {
        if key.width == 0 || key.height == 0 {
            return Err(GeometryError::ZeroDimension {
                width: key.width,
                height: key.height,
            }
            .into());
        }
        if key.source_rect.is_empty() {
            return Err(GeometryError::Degenerate {
                width: key.width,
                height: key.height,
            }
            .into());
        }
        key.source_rect.checked_size()?;
        // Grayscale originals cannot produce color renditions.
        if image.grayscale() {
            key.grayscale = true;
        }

        if let Some(found) = image.find_version(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("{}: cache hit {}", image.id(), found.id);
            return Ok(found.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let original_bytes = self.storage.load_bytes(&image.original().storage_ref())?;
        let original = self.pixels.decode(&original_bytes)?.image;
        let plan = materialize::plan(image.rectangle(), &key, self.settings.versions.outside);
        let pixels = materialize::render(
            &self.pixels,
            &original,
            &key,
            &plan,
            self.settings.versions.filter,
        )?;
        let format = OutputFormat::from_content_type(image.content_type()).unwrap_or(OutputFormat::Png);
        let bytes = self.pixels.encode(&pixels, format, self.quality())?;

        let rendition = Rendition::derived(image, key);
        self.storage.save_bytes(&rendition.storage_ref(), &bytes)?;
        image.push_version(rendition.clone());
        if let Err(source) = self.storage.save_image(image) {
            image.pop_version();
            warn!(
                "{}: rendition {} stored but record not saved: {}",
                image.id(),
                rendition.id,
                source
            );
            return Err(MediaError::AggregateNotSaved {
                rendition: rendition.id,
                source,
            });
        }

        info!(
            "{}: rendered {}x{} from {:?} ({} versions)",
            image.id(),
            key.width,
            key.height,
            key.source_rect,
            image.versions().len()
        );
        Ok(rendition)
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, HashMap<ImageId, Weak<Mutex<Image>>>>, MediaError> {
        self.open
            .lock()
            .map_err(|_| StorageError::Backend("image registry lock poisoned".to_string()).into())
    }

    /// Live handle for `id`, loading the record from storage if no caller
    /// holds one. Runs under the registry lock so an image is loaded once.
    fn find_open(
        &self,
        open: &mut HashMap<ImageId, Weak<Mutex<Image>>>,
        id: &ImageId,
    ) -> Result<Option<ImageHandle>, MediaError> {
        if let Some(image) = open.get(id).and_then(Weak::upgrade) {
            return Ok(Some(ImageHandle {
                id: id.clone(),
                image,
            }));
        }
        match self.storage.load_image(id)? {
            Some(image) if image.id() != id => Err(StorageError::IdMismatch {
                requested: id.to_string(),
                found: image.id().to_string(),
            }
            .into()),
            Some(image) => Ok(Some(Self::register(open, image))),
            None => Ok(None),
        }
    }

    fn register(open: &mut HashMap<ImageId, Weak<Mutex<Image>>>, image: Image) -> ImageHandle {
        open.retain(|_, weak| weak.strong_count() > 0);
        let id = image.id().clone();
        let image = Arc::new(Mutex::new(image));
        open.insert(id.clone(), Arc::downgrade(&image));
        ImageHandle { id, image }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutsideFill;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::storage::{FsStorage, MemoryStorage};
    use crate::test_helpers::{FailingStorage, gray_alpha_png};
    use image::ImageFormat;
    use tempfile::TempDir;

    fn mock_media() -> (Media<MockBackend>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let media = Media::with_backend(Config::new(storage.clone()), MockBackend::new());
        (media, storage)
    }

    fn ingest(media: &Media<MockBackend>, width: u32, height: u32, gray: bool) -> ImageHandle {
        let bytes = MockBackend::source_bytes(ImageFormat::Png, width, height, gray);
        media.create_from_bytes("photo.png", &bytes).unwrap()
    }

    // =========================================================================
    // create_from_bytes
    // =========================================================================

    #[test]
    fn ingest_records_original_metadata() {
        let (media, storage) = mock_media();
        let handle = ingest(&media, 800, 600, false);

        let image = handle.snapshot().unwrap();
        assert_eq!(image.versions().len(), 1);
        assert_eq!(image.filename(), "photo.png");
        assert_eq!(image.content_type(), "image/png");
        assert_eq!(image.rectangle(), Rect::new(0, 0, 800, 600));
        assert!(!image.grayscale());
        assert_eq!(storage.blob_count(), 1);
        assert!(storage.load_image(handle.id()).unwrap().is_some());
    }

    #[test]
    fn non_native_format_is_reencoded_as_png() {
        let (media, _) = mock_media();
        let gif = MockBackend::source_bytes(ImageFormat::Gif, 30, 20, false);

        let handle = media.create_from_bytes("anim.gif", &gif).unwrap();
        let image = handle.snapshot().unwrap();
        assert_eq!(image.filename(), "anim.gif.png");
        assert_eq!(image.content_type(), "image/png");
        assert_eq!(image.size(), Size::new(30, 20));

        let ops = media.pixels.get_operations();
        assert!(matches!(
            ops[1],
            RecordedOp::Encode {
                format: OutputFormat::Png,
                ..
            }
        ));
        assert!(matches!(ops[2], RecordedOp::Decode { .. }));
    }

    #[test]
    fn undecodable_bytes_are_a_decode_error() {
        let (media, storage) = mock_media();
        let err = media.create_from_bytes("x.png", b"junk").unwrap_err();
        assert!(err.is_decode());
        assert_eq!(storage.blob_count(), 0);
    }

    #[test]
    fn identical_content_returns_same_image() {
        let (media, _) = mock_media();
        let a = ingest(&media, 100, 100, false);
        let b = ingest(&media, 100, 100, false);
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn same_bytes_under_new_filename_is_a_new_image() {
        let (media, _) = mock_media();
        let bytes = MockBackend::source_bytes(ImageFormat::Png, 100, 100, false);
        let holiday = media.create_from_bytes("holiday.png", &bytes).unwrap();
        media.set_details(&holiday, Some("holiday".into()), None).unwrap();

        let passport = media.create_from_bytes("passport.png", &bytes).unwrap();
        assert_ne!(holiday.id(), passport.id());
        let image = passport.snapshot().unwrap();
        assert_eq!(image.filename(), "passport.png");
        assert_eq!(image.description, None);
    }

    #[test]
    fn gray_with_alpha_is_not_forced_to_grayscale() {
        let storage = Arc::new(MemoryStorage::new());
        let media = Media::new(Config::new(storage));
        let handle = media.create_from_bytes("mask.png", &gray_alpha_png(40, 40)).unwrap();
        assert!(!handle.snapshot().unwrap().grayscale());

        let r = media.centered_version(&handle, 20, 20, false).unwrap();
        assert!(!r.grayscale);
        let stored = RustBackend::new().decode(&media.load_bytes(&r).unwrap()).unwrap();
        assert!(stored.image.color().has_alpha());
    }

    // =========================================================================
    // open
    // =========================================================================

    #[test]
    fn open_shares_live_handle() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 100, 100, false);
        let reopened = media.open(handle.id()).unwrap();
        assert!(reopened.ptr_eq(&handle));
    }

    #[test]
    fn open_reloads_dropped_image_from_storage() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 800, 600, false);
        media.centered_version(&handle, 40, 40, false).unwrap();
        let id = handle.id().clone();
        drop(handle);

        let reopened = media.open(&id).unwrap().snapshot().unwrap();
        assert_eq!(reopened.versions().len(), 2);
    }

    #[test]
    fn details_are_persisted_with_the_record() {
        let (media, storage) = mock_media();
        let handle = ingest(&media, 100, 100, false);

        media
            .set_details(&handle, Some("Harbor at dusk".into()), Some("https://example.com/harbor".into()))
            .unwrap();

        let stored = storage.load_image(handle.id()).unwrap().unwrap();
        assert_eq!(stored.description.as_deref(), Some("Harbor at dusk"));
        assert_eq!(stored.link.as_deref(), Some("https://example.com/harbor"));
    }

    #[test]
    fn open_unknown_id_is_not_found() {
        let (media, _) = mock_media();
        assert!(matches!(
            media.open(&ImageId::new("missing")),
            Err(MediaError::NotFound(_))
        ));
    }

    // =========================================================================
    // version lookup and materialization
    // =========================================================================

    #[test]
    fn centered_fit_inside_crop_of_landscape() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 800, 600, false);

        let r = media.version(&handle, 400, 400, HorAlign::Center, VerAlign::Center, false).unwrap();
        assert_eq!(r.source_rect, Rect::new(100, 0, 700, 600));
        assert_eq!((r.width, r.height), (400, 400));
        assert_eq!(r.outside_color, FillColor::TRANSPARENT);
        assert_eq!(r.image_id(), handle.id());
    }

    #[test]
    fn repeated_request_hits_cache() {
        let (media, storage) = mock_media();
        let handle = ingest(&media, 800, 600, false);

        let first = media.centered_version(&handle, 400, 400, false).unwrap();
        let second = media.centered_version(&handle, 400, 400, false).unwrap();

        assert_eq!(first.storage_ref(), second.storage_ref());
        assert_eq!(handle.snapshot().unwrap().versions().len(), 2);
        assert_eq!(media.pixels.resample_count(), 1);
        assert_eq!(storage.blob_count(), 2);
        assert_eq!(media.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn original_sized_request_returns_original() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 800, 600, false);

        let r = media.centered_version(&handle, 800, 600, false).unwrap();
        let image = handle.snapshot().unwrap();
        assert_eq!(&r, image.original());
        assert_eq!(image.versions().len(), 1);
    }

    #[test]
    fn grayscale_original_forces_grayscale() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 800, 600, true);

        let r = media.centered_version(&handle, 100, 100, false).unwrap();
        assert!(r.grayscale);
        let again = media.centered_version(&handle, 100, 100, true).unwrap();
        assert_eq!(r.id, again.id);
    }

    #[test]
    fn color_and_gray_of_same_region_are_distinct() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 800, 600, false);

        let color = media.centered_version(&handle, 100, 100, false).unwrap();
        let gray = media.centered_version(&handle, 100, 100, true).unwrap();
        assert_ne!(color.id, gray.id);
        assert!(matches!(
            media.pixels.get_operations().last(),
            Some(RecordedOp::Encode { grayscale: true, .. })
        ));
    }

    #[test]
    fn covering_outside_records_fill_color() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 800, 600, false);

        let white = media
            .centered_version_covering_outside(&handle, 100, 100, false, FillColor::WHITE)
            .unwrap();
        let black = media
            .centered_version_covering_outside(&handle, 100, 100, false, FillColor::BLACK)
            .unwrap();

        assert_eq!(white.source_rect, Rect::new(0, -100, 800, 700));
        assert_eq!(white.outside_color, FillColor::WHITE);
        assert_ne!(white.id, black.id);
        assert_eq!(handle.snapshot().unwrap().versions().len(), 3);
    }

    #[test]
    fn fill_only_setting_skips_resampling() {
        let storage = Arc::new(MemoryStorage::new());
        let mut settings = MediaSettings::default();
        settings.versions.outside = OutsideFill::FillOnly;
        let media = Media::with_backend(
            Config::new(storage).with_settings(settings),
            MockBackend::new(),
        );
        assert_eq!(media.settings().versions.outside, OutsideFill::FillOnly);
        let handle = ingest(&media, 800, 600, false);

        media
            .centered_version_covering_outside(&handle, 100, 100, false, FillColor::WHITE)
            .unwrap();
        assert_eq!(media.pixels.resample_count(), 0);
    }

    #[test]
    fn zero_size_request_fails_fast() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 800, 600, false);

        let err = media.centered_version(&handle, 0, 100, false).unwrap_err();
        assert!(matches!(
            err,
            MediaError::Geometry(GeometryError::ZeroDimension { .. })
        ));
        let err = media
            .source_rect_version(&handle, Rect::new(0, 0, 10, 10), 10, 0, false, FillColor::BLACK)
            .unwrap_err();
        assert!(matches!(err, MediaError::Geometry(_)));
        assert_eq!(handle.snapshot().unwrap().versions().len(), 1);
    }

    #[test]
    fn explicit_source_rect_version() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 800, 600, false);

        let r = media
            .source_rect_version(
                &handle,
                Rect::new(10, 20, 110, 120),
                50,
                50,
                false,
                FillColor::TRANSPARENT,
            )
            .unwrap();
        assert_eq!(r.source_rect, Rect::new(10, 20, 110, 120));
        assert!(media.pixels.get_operations().contains(&RecordedOp::Resample {
            source: Rect::new(10, 20, 110, 120),
            width: 50,
            height: 50,
        }));
    }

    #[test]
    fn source_rect_wider_than_coordinate_range_is_rejected() {
        let (media, _) = mock_media();
        let handle = ingest(&media, 800, 600, false);

        let err = media
            .source_rect_version(
                &handle,
                Rect::new(i32::MIN, 0, i32::MAX, 10),
                10,
                10,
                false,
                FillColor::WHITE,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            MediaError::Geometry(GeometryError::TooLarge(_))
        ));
        assert_eq!(handle.snapshot().unwrap().versions().len(), 1);
    }

    // =========================================================================
    // persistence failures
    // =========================================================================

    #[test]
    fn failed_record_save_rolls_back_append() {
        let storage = Arc::new(FailingStorage::new());
        let media = Media::with_backend(Config::new(storage.clone()), MockBackend::new());
        let handle = ingest(&media, 800, 600, false);

        storage.fail_images(true);
        let err = media.centered_version(&handle, 100, 100, false).unwrap_err();
        assert!(matches!(err, MediaError::AggregateNotSaved { .. }));
        assert_eq!(handle.snapshot().unwrap().versions().len(), 1);

        storage.fail_images(false);
        media.centered_version(&handle, 100, 100, false).unwrap();
        assert_eq!(handle.snapshot().unwrap().versions().len(), 2);
    }

    #[test]
    fn record_stored_under_another_id_is_refused() {
        let tmp = TempDir::new().unwrap();
        let media = Media::with_backend(
            Config::new(Arc::new(FsStorage::new(tmp.path()))),
            MockBackend::new(),
        );
        let handle = ingest(&media, 100, 100, false);

        let other = ImageId::new("ab".repeat(32));
        let other_dir = tmp.path().join(other.as_str());
        std::fs::create_dir_all(&other_dir).unwrap();
        std::fs::copy(
            tmp.path().join(handle.id().as_str()).join("image.json"),
            other_dir.join("image.json"),
        )
        .unwrap();

        assert!(matches!(
            media.open(&other),
            Err(MediaError::Storage(StorageError::IdMismatch { .. }))
        ));
    }

    #[test]
    fn failed_bytes_save_leaves_image_untouched() {
        let storage = Arc::new(FailingStorage::new());
        let media = Media::with_backend(Config::new(storage.clone()), MockBackend::new());
        let handle = ingest(&media, 800, 600, false);

        storage.fail_bytes(true);
        let err = media.centered_version(&handle, 100, 100, false).unwrap_err();
        assert!(matches!(err, MediaError::Storage(_)));
        assert_eq!(handle.snapshot().unwrap().versions().len(), 1);
    }
}
