//! Quadtree tile addressing

use super::coord_system::CoordSystemId;
use super::SpatialError;
use crate::foundation::math::{Mbr, Point2};

/// A tile of a quadtree pyramid; `y` grows upward from the bottom row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId {
    /// Zoom level; level `n` is a `2^n` by `2^n` grid
    pub level: u32,
    /// Column
    pub x: u32,
    /// Row
    pub y: u32,
}

impl TileId {
    /// Create a tile identifier
    pub const fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// Tiles per side at this level
    pub fn grid_size(self) -> Option<u32> {
        1u32.checked_shl(self.level)
    }

    /// Check that the tile lies inside its level
    pub fn validate(self) -> Result<(), SpatialError> {
        match self.grid_size() {
            Some(n) if self.x < n && self.y < n => Ok(()),
            _ => Err(SpatialError::TileOutOfRange(self)),
        }
    }

    /// Tile rectangle within a pyramid covering `extent`
    pub fn bounds(self, extent: &Mbr) -> Mbr {
        let n = f64::from(self.grid_size().unwrap_or(u32::MAX));
        let (w, h) = (extent.width() / n, extent.height() / n);
        let ll = Point2::new(
            extent.ll.x + f64::from(self.x) * w,
            extent.ll.y + f64::from(self.y) * h,
        );
        Mbr::new(ll, Point2::new(ll.x + w, ll.y + h))
    }

    /// Inclusive column and row ranges of the tiles at `level` overlapping `area`
    pub fn covering(level: u32, extent: &Mbr, area: &Mbr) -> Option<((u32, u32), (u32, u32))> {
        let n = 1u32.checked_shl(level)?;
        let (w, h) = (extent.width() / f64::from(n), extent.height() / f64::from(n));
        if !(w > 0.0 && h > 0.0) {
            return None;
        }
        if area.ur.x < extent.ll.x || area.ll.x > extent.ur.x || area.ur.y < extent.ll.y || area.ll.y > extent.ur.y {
            return None;
        }
        let max = f64::from(n - 1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cell = |v: f64, origin: f64, size: f64| ((v - origin) / size).floor().clamp(0.0, max) as u32;
        Some((
            (cell(area.ll.x, extent.ll.x, w), cell(area.ur.x, extent.ll.x, w)),
            (cell(area.ll.y, extent.ll.y, h), cell(area.ur.y, extent.ll.y, h)),
        ))
    }
}

/// Ordering key of a tile bundle: coordinate system, level, x, y
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileSortKey {
    /// Coordinate system the tile belongs to
    pub coord_sys: CoordSystemId,
    /// Tile address
    pub tile: TileId,
}

impl TileSortKey {
    /// Create a key
    pub const fn new(coord_sys: CoordSystemId, tile: TileId) -> Self {
        Self { coord_sys, tile }
    }
}
