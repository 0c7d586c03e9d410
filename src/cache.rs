//! Version cache: exact-match lookup of already materialized renditions.
//!
//! Every rendition of an image is identified by a [`VersionKey`], the tuple
//! of source rectangle, output size, color mode and outside fill color. Two
//! requests share a rendition only when all five fields are equal; there is
//! no nearest-size matching.
//!
//! ## Index
//!
//! The ordered version list of an [`Image`](crate::model::Image) stays the
//! source of truth (index 0 is the original). [`VersionIndex`] is a runtime
//! map from key to list position, built when the aggregate is loaded and
//! maintained on append. It is never serialized. When two list entries share
//! a key, the earlier one wins, same as a front-to-back scan.
//!
//! ## Content addresses
//!
//! [`VersionKey::id`] is a SHA-256 over the key fields. It names the stored
//! bytes of a rendition, so a retried materialization writes to the same
//! place instead of leaving a second copy behind.

use crate::color::FillColor;
use crate::geometry::Rect;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Hex characters kept from the key digest.
const KEY_ID_LEN: usize = 16;

/// The 5-tuple identifying a unique rendition of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionKey {
    pub source_rect: Rect,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
    pub outside_color: FillColor,
}

impl VersionKey {
    /// Content address of the rendition this key describes.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"version\0");
        let r = self.source_rect;
        for coord in [r.min_x, r.min_y, r.max_x, r.max_y] {
            hasher.update(coord.to_le_bytes());
        }
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update([u8::from(self.grayscale)]);
        hasher.update(self.outside_color.0);
        let mut hex = format!("{:x}", hasher.finalize());
        hex.truncate(KEY_ID_LEN);
        hex
    }
}

/// Runtime map from [`VersionKey`] to position in an image's version list.
#[derive(Debug, Clone, Default)]
pub struct VersionIndex {
    positions: HashMap<VersionKey, usize>,
}

impl VersionIndex {
    /// Build from keys in list order.
    pub fn build(keys: impl IntoIterator<Item = VersionKey>) -> Self {
        let mut index = Self::default();
        for (position, key) in keys.into_iter().enumerate() {
            index.insert(key, position);
        }
        index
    }

    pub fn get(&self, key: &VersionKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Record `key` at `position` unless the key is already indexed.
    pub fn insert(&mut self, key: VersionKey, position: usize) {
        self.positions.entry(key).or_insert(position);
    }

    /// Drop `key` if it points at `position`.
    pub fn remove(&mut self, key: &VersionKey, position: usize) {
        if self.positions.get(key) == Some(&position) {
            self.positions.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Lookup outcome counts for a [`Media`](crate::Media) instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} rendered ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} rendered", self.misses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(width: u32) -> VersionKey {
        VersionKey {
            source_rect: Rect::new(100, 0, 700, 600),
            width,
            height: 400,
            grayscale: false,
            outside_color: FillColor::TRANSPARENT,
        }
    }

    // =========================================================================
    // VersionKey::id
    // =========================================================================

    #[test]
    fn id_is_deterministic() {
        assert_eq!(key(400).id(), key(400).id());
        assert_eq!(key(400).id().len(), KEY_ID_LEN);
    }

    #[test]
    fn id_varies_with_every_field() {
        let base = key(400);
        let variants = [
            VersionKey {
                source_rect: Rect::new(0, 0, 600, 600),
                ..base
            },
            VersionKey { width: 401, ..base },
            VersionKey { height: 401, ..base },
            VersionKey {
                grayscale: true,
                ..base
            },
            VersionKey {
                outside_color: FillColor::WHITE,
                ..base
            },
        ];
        for variant in variants {
            assert_ne!(base.id(), variant.id(), "{variant:?}");
        }
    }

    // =========================================================================
    // VersionIndex
    // =========================================================================

    #[test]
    fn build_keeps_first_position_for_duplicate_keys() {
        let index = VersionIndex::build([key(1), key(2), key(1)]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&key(1)), Some(0));
        assert_eq!(index.get(&key(2)), Some(1));
    }

    #[test]
    fn get_misses_on_unknown_key() {
        let index = VersionIndex::build([key(1)]);
        assert_eq!(index.get(&key(3)), None);
    }

    #[test]
    fn remove_only_matching_position() {
        let mut index = VersionIndex::build([key(1), key(2)]);
        index.remove(&key(1), 5);
        assert_eq!(index.get(&key(1)), Some(0));
        index.remove(&key(1), 0);
        assert_eq!(index.get(&key(1)), None);
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats { hits: 3, misses: 1 };
        assert_eq!(s.to_string(), "3 cached, 1 rendered (4 total)");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let s = CacheStats { hits: 0, misses: 2 };
        assert_eq!(s.to_string(), "2 rendered");
    }
}
