//! Directory-backed storage.
//!
//! ```text
//! <root>/
//! └── <image-id>/
//!     ├── image.json          # aggregate record, pretty JSON
//!     ├── <rendition-id>      # original bytes
//!     └── <rendition-id>      # one file per derived rendition
//! ```
//!
//! Rendition files are named by their content address, so rewriting a
//! rendition replaces its file instead of adding one. The record is written
//! to a temporary file and renamed into place.
//!
//! Both path components must be lowercase hex content addresses. Anything
//! else is rejected with [`StorageError::InvalidKey`] before the file system
//! is touched, so no id can name a path outside the root.

use super::{Storage, StorageError};
use crate::config::StorageSettings;
use crate::model::{Image, ImageId, RenditionRef, is_content_address};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the aggregate record within an image directory.
const RECORD_FILENAME: &str = "image.json";

#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(&settings.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn image_dir(&self, id: &ImageId) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(path_component(id.as_str())?))
    }

    fn bytes_path(&self, rendition: &RenditionRef) -> Result<PathBuf, StorageError> {
        Ok(self
            .image_dir(&rendition.image_id)?
            .join(path_component(&rendition.rendition_id)?))
    }
}

fn path_component(key: &str) -> Result<&str, StorageError> {
    if is_content_address(key) {
        Ok(key)
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

impl Storage for FsStorage {
    fn load_bytes(&self, rendition: &RenditionRef) -> Result<Vec<u8>, StorageError> {
        fs::read(self.bytes_path(rendition)?).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(rendition.to_string()),
            _ => StorageError::Io(e),
        })
    }

    fn save_bytes(&self, rendition: &RenditionRef, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.bytes_path(rendition)?;
        fs::create_dir_all(self.image_dir(&rendition.image_id)?)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn save_image(&self, image: &Image) -> Result<(), StorageError> {
        let dir = self.image_dir(image.id())?;
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(image)?;
        let tmp = dir.join(format!("{RECORD_FILENAME}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, dir.join(RECORD_FILENAME))?;
        Ok(())
    }

    fn load_image(&self, id: &ImageId) -> Result<Option<Image>, StorageError> {
        let path = self.image_dir(id)?.join(RECORD_FILENAME);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}
