//! Source-rectangle geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! A rendition is produced by sampling a rectangle of the original's
//! coordinate space and scaling it to the requested output size. Two policies
//! decide which rectangle:
//!
//! - [`FitPolicy::Inside`]: the largest rectangle with the requested aspect
//!   ratio that fits inside the original ("touch the original from inside").
//!   The result is a crop.
//! - [`FitPolicy::Outside`]: the smallest rectangle with the requested aspect
//!   ratio that contains the original ("touch the original from outside").
//!   The result is a letterbox; one axis extends past the original's edges.
//!
//! Dimensions are computed with float aspect ratios and truncated to whole
//! pixels. Truncation (not rounding) is part of the contract: two requests
//! resolve to the same rectangle only if this arithmetic says so, and the
//! rectangle is what the version cache keys on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
    #[error("dimension {0} exceeds the coordinate range")]
    TooLarge(u32),
    #[error("a {width}x{height} request resolves to an empty source rectangle")]
    Degenerate { width: u32, height: u32 },
}

/// Pixel dimensions of an image or a requested rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width / height.
    pub fn aspect_ratio(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    fn validate(self) -> Result<(i32, i32), GeometryError> {
        if self.width == 0 || self.height == 0 {
            return Err(GeometryError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        let w = i32::try_from(self.width).map_err(|_| GeometryError::TooLarge(self.width))?;
        let h = i32::try_from(self.height).map_err(|_| GeometryError::TooLarge(self.height))?;
        Ok((w, h))
    }
}

/// Half-open rectangle `[min_x, max_x) × [min_y, max_y)`.
///
/// Coordinates are signed: a cover-from-outside rectangle can start left of
/// or above the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Rect {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The full bounds of an image of the given size, anchored at the origin.
    pub fn from_size(size: Size) -> Result<Self, GeometryError> {
        let (w, h) = size.validate()?;
        Ok(Self::new(0, 0, w, h))
    }

    /// Saturates at `i32::MAX`; see [`checked_size`](Self::checked_size).
    pub fn width(&self) -> i32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> i32 {
        self.max_y.saturating_sub(self.min_y)
    }

    /// Width and height, or `TooLarge` when a side spans more than `i32::MAX`.
    pub fn checked_size(&self) -> Result<(i32, i32), GeometryError> {
        let span = |min: i32, max: i32| {
            max.checked_sub(min)
                .ok_or(GeometryError::TooLarge((i64::from(max) - i64::from(min)) as u32))
        };
        Ok((span(self.min_x, self.max_x)?, span(self.min_y, self.max_y)?))
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.min_x + dx,
            self.min_y + dy,
            self.max_x + dx,
            self.max_y + dy,
        )
    }

    /// Whether `other` lies entirely within `self`. An empty `other` is
    /// contained by every rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        if other.is_empty() {
            return true;
        }
        self.min_x <= other.min_x
            && other.max_x <= self.max_x
            && self.min_y <= other.min_y
            && other.max_y <= self.max_y
    }

    /// The overlap of two rectangles, `None` if they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        (!r.is_empty()).then_some(r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorAlign {
    #[default]
    Center,
    Left,
    Right,
}

impl HorAlign {
    /// Horizontal offset for a band that leaves `leftover` pixels
    /// (negative when the band is wider than the original).
    pub fn offset(self, leftover: i32) -> i32 {
        match self {
            HorAlign::Center => leftover / 2,
            HorAlign::Left => 0,
            HorAlign::Right => leftover,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerAlign {
    #[default]
    Center,
    Top,
    Bottom,
}

impl VerAlign {
    pub fn offset(self, leftover: i32) -> i32 {
        match self {
            VerAlign::Center => leftover / 2,
            VerAlign::Top => 0,
            VerAlign::Bottom => leftover,
        }
    }
}

/// How the sampling rectangle relates to the original's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitPolicy {
    /// Largest matching rectangle contained in the original.
    Inside,
    /// Smallest matching rectangle containing the original.
    Outside,
}

/// Resolve the sampling rectangle for a `target`-sized rendition of an
/// `original`-sized image.
pub fn source_rect(
    policy: FitPolicy,
    original: Size,
    target: Size,
    hor: HorAlign,
    ver: VerAlign,
) -> Result<Rect, GeometryError> {
    match policy {
        FitPolicy::Inside => touch_from_inside(original, target, hor, ver),
        FitPolicy::Outside => touch_from_outside(original, target, hor, ver),
    }
}

/// Largest rectangle with `target`'s aspect ratio inside `original`.
///
/// A request wider than the original keeps the full width and aligns a
/// horizontal band vertically; otherwise the full height is kept and a
/// vertical band is aligned horizontally.
///
/// ```
/// # use media_versions::geometry::{touch_from_inside, HorAlign, Rect, Size, VerAlign};
/// let r = touch_from_inside(Size::new(800, 600), Size::new(400, 400), HorAlign::Center, VerAlign::Center);
/// assert_eq!(r, Ok(Rect::new(100, 0, 700, 600)));
/// ```
pub fn touch_from_inside(
    original: Size,
    target: Size,
    hor: HorAlign,
    ver: VerAlign,
) -> Result<Rect, GeometryError> {
    let (orig_w, orig_h) = original.validate()?;
    target.validate()?;
    let aspect = target.aspect_ratio();

    let rect = if aspect > original.aspect_ratio() {
        let h = (f64::from(orig_w) / aspect) as i32;
        Rect::new(0, 0, orig_w, h).offset(0, ver.offset(orig_h - h))
    } else {
        let w = (f64::from(orig_h) * aspect) as i32;
        Rect::new(0, 0, w, orig_h).offset(hor.offset(orig_w - w), 0)
    };
    non_degenerate(rect, target)
}

/// Smallest rectangle with `target`'s aspect ratio containing `original`.
///
/// A request wider than the original keeps the full height and grows the
/// width past the original's edges; otherwise the full width is kept and the
/// height grows.
pub fn touch_from_outside(
    original: Size,
    target: Size,
    hor: HorAlign,
    ver: VerAlign,
) -> Result<Rect, GeometryError> {
    let (orig_w, orig_h) = original.validate()?;
    target.validate()?;
    let aspect = target.aspect_ratio();

    let rect = if aspect > original.aspect_ratio() {
        let w = (f64::from(orig_h) * aspect) as i32;
        Rect::new(0, 0, w, orig_h).offset(hor.offset(orig_w - w), 0)
    } else {
        let h = (f64::from(orig_w) / aspect) as i32;
        Rect::new(0, 0, orig_w, h).offset(0, ver.offset(orig_h - h))
    };
    non_degenerate(rect, target)
}

fn non_degenerate(rect: Rect, target: Size) -> Result<Rect, GeometryError> {
    if rect.is_empty() {
        return Err(GeometryError::Degenerate {
            width: target.width,
            height: target.height,
        });
    }
    Ok(rect)
}

/// Where the visible part of the original lands inside a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Region of the original to sample (original coordinates).
    pub crop: Rect,
    /// Top-left corner in the rendition's pixel space.
    pub x: i64,
    pub y: i64,
    /// Scaled size of `crop` in the rendition.
    pub width: u32,
    pub height: u32,
}

/// Project the overlap of `source` and `bounds` into a `width × height`
/// rendition sampled from `source`.
///
/// Returns `None` when the rectangles do not overlap.
pub fn project_overlap(source: Rect, bounds: Rect, width: u32, height: u32) -> Option<Placement> {
    let crop = source.intersect(&bounds)?;
    let scale_x = f64::from(width) / f64::from(source.width());
    let scale_y = f64::from(height) / f64::from(source.height());

    let x = (f64::from(crop.min_x - source.min_x) * scale_x).round() as i64;
    let y = (f64::from(crop.min_y - source.min_y) * scale_y).round() as i64;
    let w = (f64::from(crop.width()) * scale_x).round().max(1.0) as i64;
    let h = (f64::from(crop.height()) * scale_y).round().max(1.0) as i64;

    // Rounding may push the last pixel column/row past the canvas edge.
    let w = w.min(i64::from(width) - x).max(1);
    let h = h.min(i64::from(height) - y).max(1);

    Some(Placement {
        crop,
        x,
        y,
        width: w as u32,
        height: h as u32,
    })
}
