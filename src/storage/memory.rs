use super::{Storage, StorageError};
use crate::model::{Image, ImageId, RenditionRef};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory storage.
///
/// Aggregates are kept as their JSON serialization, so loading one goes
/// through the same deserialization (and back-reference wiring) as a record
/// read from disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bytes: Mutex<HashMap<RenditionRef, Vec<u8>>>,
    images: Mutex<HashMap<ImageId, String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|_| StorageError::Backend("memory storage lock poisoned".to_string()))
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored byte blobs.
    pub fn blob_count(&self) -> usize {
        self.bytes.lock().map(|b| b.len()).unwrap_or(0)
    }
}

impl Storage for MemoryStorage {
    fn load_bytes(&self, rendition: &RenditionRef) -> Result<Vec<u8>, StorageError> {
        lock(&self.bytes)?
            .get(rendition)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(rendition.to_string()))
    }

    fn save_bytes(&self, rendition: &RenditionRef, bytes: &[u8]) -> Result<(), StorageError> {
        lock(&self.bytes)?.insert(rendition.clone(), bytes.to_vec());
        Ok(())
    }

    fn save_image(&self, image: &Image) -> Result<(), StorageError> {
        let json = serde_json::to_string(image)?;
        lock(&self.images)?.insert(image.id().clone(), json);
        Ok(())
    }

    fn load_image(&self, id: &ImageId) -> Result<Option<Image>, StorageError> {
        let images = lock(&self.images)?;
        match images.get(id) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }
}
