//! The image aggregate and its renditions.
//!
//! An [`Image`] owns an ordered list of [`Rendition`]s. Index 0 is the
//! original and the authority for every canonical property (size, aspect
//! ratio, color mode, content type, filename). Derived renditions are only
//! ever appended; the list never shrinks during normal operation.
//!
//! Each rendition carries a non-owning back-reference to its image in the
//! form of the [`ImageId`]. It is not serialized with the record and is
//! re-established whenever an aggregate is built or deserialized, so a
//! rendition pulled out of an image can still name its stored bytes.

use crate::cache::{VersionIndex, VersionKey};
use crate::color::FillColor;
use crate::geometry::{GeometryError, Rect, Size};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Whether `key` is a non-empty lowercase hex string, the only form image
/// and rendition ids take.
pub(crate) fn is_content_address(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Content address of an image: SHA-256 over its filename and stored
/// original bytes.
///
/// Deserialization only accepts lowercase hex. [`ImageId::new`] does not
/// check; storage backends reject malformed ids themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn for_upload(filename: &str, bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(filename.as_bytes());
        hasher.update([0]);
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ImageId {
    type Error = String;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        if is_content_address(&id) {
            Ok(Self(id))
        } else {
            Err(format!("invalid image id {id:?}"))
        }
    }
}

impl From<ImageId> for String {
    fn from(id: ImageId) -> Self {
        id.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of one rendition's stored bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenditionRef {
    pub image_id: ImageId,
    pub rendition_id: String,
}

impl fmt::Display for RenditionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.image_id, self.rendition_id)
    }
}

/// One materialized image buffer at a specific region, size and color mode.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    /// Content address of the key, see [`VersionKey::id`].
    pub id: String,
    pub filename: String,
    pub content_type: String,
    /// Region of the original's coordinate space this was sampled from.
    pub source_rect: Rect,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
    /// Fill for any part of `source_rect` outside the original.
    #[serde(default)]
    pub outside_color: FillColor,
    #[serde(skip)]
    image_id: ImageId,
}

impl Rendition {
    /// The original rendition of a freshly ingested image.
    pub(crate) fn original(
        image_id: ImageId,
        filename: String,
        content_type: String,
        size: Size,
        grayscale: bool,
    ) -> Result<Self, GeometryError> {
        let key = VersionKey {
            source_rect: Rect::from_size(size)?,
            width: size.width,
            height: size.height,
            grayscale,
            outside_color: FillColor::TRANSPARENT,
        };
        Ok(Self::from_key(image_id, filename, content_type, key))
    }

    /// A derived rendition. Filename and content type follow the original.
    pub(crate) fn derived(image: &Image, key: VersionKey) -> Self {
        Self::from_key(
            image.id.clone(),
            image.filename().to_string(),
            image.content_type().to_string(),
            key,
        )
    }

    fn from_key(image_id: ImageId, filename: String, content_type: String, key: VersionKey) -> Self {
        Self {
            id: key.id(),
            filename,
            content_type,
            source_rect: key.source_rect,
            width: key.width,
            height: key.height,
            grayscale: key.grayscale,
            outside_color: key.outside_color,
            image_id,
        }
    }

    /// The owning image.
    pub fn image_id(&self) -> &ImageId {
        &self.image_id
    }

    pub fn storage_ref(&self) -> RenditionRef {
        RenditionRef {
            image_id: self.image_id.clone(),
            rendition_id: self.id.clone(),
        }
    }

    pub fn key(&self) -> VersionKey {
        VersionKey {
            source_rect: self.source_rect,
            width: self.width,
            height: self.height,
            grayscale: self.grayscale,
            outside_color: self.outside_color,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Width / height of the output buffer.
    pub fn aspect_ratio(&self) -> f64 {
        self.size().aspect_ratio()
    }
}

/// Persisted shape of an [`Image`], validated on the way in.
#[derive(Deserialize)]
struct ImageRecord {
    id: ImageId,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    link: Option<String>,
    versions: Vec<Rendition>,
}

/// Aggregate root: an original plus every rendition derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ImageRecord")]
pub struct Image {
    id: ImageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    versions: Vec<Rendition>,
    #[serde(skip)]
    index: VersionIndex,
}

impl TryFrom<ImageRecord> for Image {
    type Error = String;

    fn try_from(record: ImageRecord) -> Result<Self, Self::Error> {
        let Some(original) = record.versions.first() else {
            return Err(format!("image {} has no versions", record.id));
        };
        let bounds = Rect::from_size(original.size()).map_err(|e| e.to_string())?;
        if original.source_rect != bounds {
            return Err(format!(
                "image {} original covers {:?}, expected {:?}",
                record.id, original.source_rect, bounds
            ));
        }
        if let Some(bad) = record.versions.iter().find(|v| v.id != v.key().id()) {
            return Err(format!(
                "image {} rendition id {:?} does not match its key",
                record.id, bad.id
            ));
        }
        let mut image = Self {
            id: record.id,
            description: record.description,
            link: record.link,
            versions: record.versions,
            index: VersionIndex::default(),
        };
        image.attach();
        Ok(image)
    }
}

impl Image {
    pub(crate) fn new(original: Rendition) -> Self {
        let mut image = Self {
            id: original.image_id.clone(),
            description: None,
            link: None,
            versions: vec![original],
            index: VersionIndex::default(),
        };
        image.attach();
        image
    }

    /// Point every rendition back at this image and rebuild the key index.
    fn attach(&mut self) {
        for version in &mut self.versions {
            version.image_id = self.id.clone();
        }
        self.index = VersionIndex::build(self.versions.iter().map(Rendition::key));
    }

    pub fn id(&self) -> &ImageId {
        &self.id
    }

    pub fn original(&self) -> &Rendition {
        &self.versions[0]
    }

    /// All renditions in append order, original first.
    pub fn versions(&self) -> &[Rendition] {
        &self.versions
    }

    pub fn filename(&self) -> &str {
        &self.original().filename
    }

    pub fn content_type(&self) -> &str {
        &self.original().content_type
    }

    pub fn width(&self) -> u32 {
        self.original().width
    }

    pub fn height(&self) -> u32 {
        self.original().height
    }

    pub fn size(&self) -> Size {
        self.original().size()
    }

    /// Full bounds of the original.
    pub fn rectangle(&self) -> Rect {
        self.original().source_rect
    }

    pub fn grayscale(&self) -> bool {
        self.original().grayscale
    }

    /// Width / height of the original.
    pub fn aspect_ratio(&self) -> f64 {
        self.original().aspect_ratio()
    }

    /// The first rendition matching `key` exactly.
    pub fn find_version(&self, key: &VersionKey) -> Option<&Rendition> {
        self.index.get(key).map(|i| &self.versions[i])
    }

    pub(crate) fn push_version(&mut self, mut rendition: Rendition) {
        rendition.image_id = self.id.clone();
        self.index.insert(rendition.key(), self.versions.len());
        self.versions.push(rendition);
    }

    /// Undo the latest [`push_version`](Self::push_version). The original is
    /// never removed.
    pub(crate) fn pop_version(&mut self) -> Option<Rendition> {
        if self.versions.len() <= 1 {
            return None;
        }
        let rendition = self.versions.pop()?;
        self.index.remove(&rendition.key(), self.versions.len());
        Some(rendition)
    }
}
