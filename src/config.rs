//! Configuration.
//!
//! Two layers:
//!
//! - [`MediaSettings`]: plain values loaded from a `media.toml` file. Stock
//!   defaults are overridden by whatever the user file specifies.
//! - [`Config`]: the settings plus the storage backend instance, passed to
//!   [`Media::new`](crate::Media::new). There is no global backend.
//!
//! ## Settings File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [versions]
//! outside = "composite"      # "composite" or "fill-only"
//! default_fill = "#00000000" # fill for fit-inside requests (#rrggbb[aa])
//! filter = "lanczos3"        # nearest | triangle | catmull-rom | gaussian | lanczos3
//!
//! [encoding]
//! jpeg_quality = 90          # 1-100
//!
//! [storage]
//! root = "media"             # directory used by FsStorage::from_settings
//! ```
//!
//! Settings files are sparse. Unknown keys are rejected to catch typos early.

use crate::color::FillColor;
use crate::imaging::ResampleFilter;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// What the part of a cover-from-outside canvas overlapping the original shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutsideFill {
    /// The original, scaled into place over the fill color.
    #[default]
    Composite,
    /// Nothing: the whole canvas is the fill color.
    FillOnly,
}

/// Settings loaded from `media.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaSettings {
    /// How renditions are produced.
    pub versions: VersionSettings,
    /// How renditions are encoded.
    pub encoding: EncodingSettings,
    /// Where [`FsStorage`](crate::storage::FsStorage) keeps its files.
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionSettings {
    pub outside: OutsideFill,
    /// Outside color recorded for fit-inside renditions.
    pub default_fill: FillColor,
    pub filter: ResampleFilter,
}

impl Default for VersionSettings {
    fn default() -> Self {
        Self {
            outside: OutsideFill::default(),
            default_fill: FillColor::TRANSPARENT,
            filter: ResampleFilter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingSettings {
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub jpeg_quality: u32,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self { jpeg_quality: 90 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    pub root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("media"),
        }
    }
}

impl MediaSettings {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.encoding.jpeg_quality) {
            return Err(ConfigError::Validation(
                "encoding.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "storage.root must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Explicit configuration for a [`Media`](crate::Media) instance.
#[derive(Clone)]
pub struct Config {
    /// Storage for rendition bytes and image records.
    pub backend: Arc<dyn Storage>,
    pub settings: MediaSettings,
}

impl Config {
    pub fn new(backend: Arc<dyn Storage>) -> Self {
        Self {
            backend,
            settings: MediaSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: MediaSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backend", &"<dyn Storage>")
            .field("settings", &self.settings)
            .finish()
    }
}

// =============================================================================
// Loading, merging, and validation
// =============================================================================

/// Returns the stock defaults as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(MediaSettings::default())
        .map_err(|e| ConfigError::Validation(format!("stock settings do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_settings(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<MediaSettings, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: MediaSettings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from a TOML file.
///
/// A missing file yields the stock defaults. A file that exists must parse,
/// contain only known keys, and validate.
pub fn load_settings(path: &Path) -> Result<MediaSettings, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    resolve_settings(base, overlay)
}

/// Returns a fully-commented stock `media.toml` with all keys and explanations.
pub fn stock_settings_toml() -> &'static str {
    r##"# Media versions settings
# =======================
# All options are optional. Values shown are the defaults.

[versions]
# What a cover-from-outside rendition shows where it overlaps the original:
#   "composite"  the original, scaled into place over the fill color
#   "fill-only"  nothing, the whole canvas is the fill color
outside = "composite"

# Outside color recorded for fit-inside renditions, as #rrggbb or #rrggbbaa.
default_fill = "#00000000"

# Resampling filter: nearest, triangle, catmull-rom, gaussian, lanczos3.
filter = "lanczos3"

[encoding]
# JPEG quality for renditions of JPEG originals (1-100).
jpeg_quality = 90

[storage]
# Root directory for file-system storage.
root = "media"
"##
}
