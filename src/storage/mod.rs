//! Persistence of rendition bytes and image aggregates.
//!
//! The [`Storage`] trait is the only way the version engine touches durable
//! state. Two implementations ship with the crate:
//!
//! - [`MemoryStorage`]: mutex-guarded maps, for tests and short-lived processes.
//! - [`FsStorage`]: one directory per image under a root directory.
//!
//! Saving bytes and saving the aggregate are separate calls with no
//! transaction spanning them. See [`Media`](crate::Media) for how a failure
//! between the two is reported.

mod fs;
mod memory;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

use crate::model::{Image, ImageId, RenditionRef};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage backend failed: {0}")]
    Backend(String),
    /// An id that is not a lowercase hex content address.
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("Record for {requested} belongs to image {found}")]
    IdMismatch { requested: String, found: String },
}

/// Storage backend for image bytes and aggregate records.
///
/// Implementations must be thread-safe; one backend serves every image.
pub trait Storage: Send + Sync {
    /// Raw bytes of one rendition.
    fn load_bytes(&self, rendition: &RenditionRef) -> Result<Vec<u8>, StorageError>;

    /// Store (or overwrite) the raw bytes of one rendition.
    fn save_bytes(&self, rendition: &RenditionRef, bytes: &[u8]) -> Result<(), StorageError>;

    /// Store (or overwrite) an image aggregate with its full version list.
    fn save_image(&self, image: &Image) -> Result<(), StorageError>;

    /// Load a previously saved aggregate, `None` if there is none.
    fn load_image(&self, id: &ImageId) -> Result<Option<Image>, StorageError>;
}
