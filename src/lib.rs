//! # Media Versions
//!
//! On-demand image renditions with an exact-match version cache.
//!
//! An [`Image`] is ingested once from raw bytes. Every later request for a
//! size, crop, or color mode resolves a sampling rectangle in the original's
//! coordinate space, looks the request up among the renditions the image
//! already has, and only materializes (and persists) a new one on a miss.
//!
//! ```text
//! create_from_bytes ─▶ decode ─▶ normalize ─▶ store original ─▶ Image
//!
//! version(w, h, align, gray)
//!   ─▶ geometry  (fit inside / cover from outside)
//!   ─▶ cache     (5-tuple key: rect, width, height, grayscale, fill)
//!   ─▶ materialize on miss ─▶ storage
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`geometry`] | Sizes, rectangles, alignment, and the two fit policies |
//! | [`color`] | Outside fill colors and their `#rrggbbaa` text form |
//! | [`cache`] | The version key, its content address, and the key index |
//! | [`model`] | The [`Image`] aggregate and its [`Rendition`]s |
//! | [`materialize`] | Planning and rendering the pixels of a new rendition |
//! | [`imaging`] | Decode, encode, and resample behind [`ImageBackend`] |
//! | [`storage`] | Persistence of bytes and aggregates behind [`Storage`] |
//! | [`config`] | `media.toml` settings and the explicit [`Config`] |
//! | [`media`] | The request surface, [`Media`], and per-image locking |
//!
//! # Design Decisions
//!
//! ## Explicit Configuration
//!
//! There is no global storage backend. A [`Config`] carrying the backend and
//! the settings is handed to [`Media::new`], so two engines with different
//! backends can coexist in one process and tests never share state.
//!
//! ## Content Addresses Everywhere
//!
//! An image id is the SHA-256 of its stored original bytes and a rendition id
//! is derived from its cache key. Ingesting identical content twice yields one
//! image, and re-materializing a rendition overwrites the same stored object.
//!
//! ## One Lock Per Image
//!
//! [`Media`] hands every caller of the same image the same [`ImageHandle`].
//! The handle's mutex spans the whole lookup, render, and persist sequence,
//! so a key is materialized at most once.
//!
//! ## Letterbox Compositing
//!
//! Cover-from-outside renditions extend past the original. Whether the
//! overlapping part shows the original or only the fill color is a setting,
//! [`config::OutsideFill`].

pub mod cache;
pub mod color;
pub mod config;
pub mod geometry;
pub mod imaging;
pub mod materialize;
pub mod media;
pub mod model;
pub mod storage;

pub use cache::{CacheStats, VersionKey};
pub use color::FillColor;
pub use config::{Config, ConfigError, MediaSettings};
pub use geometry::{GeometryError, HorAlign, Rect, Size, VerAlign};
pub use imaging::{BackendError, ImageBackend, RustBackend};
pub use media::{ImageHandle, Media, MediaError};
pub use model::{Image, ImageId, Rendition};
pub use storage::{FsStorage, MemoryStorage, Storage, StorageError};

#[cfg(test)]
pub(crate) mod test_helpers;
