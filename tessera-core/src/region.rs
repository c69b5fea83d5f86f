//! Rectangular regions of a spatial job's input space

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle in integer cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Axis along which a region is bisected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether both far edges are representable as `u32` coordinates
    pub fn fits_coordinates(&self) -> bool {
        self.x.checked_add(self.width).is_some() && self.y.checked_add(self.height).is_some()
    }

    /// Exclusive right edge, saturating at `u32::MAX`
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `u32::MAX`
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(&self, other: &Region) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn longer_axis(&self) -> Axis {
        if self.width >= self.height {
            Axis::X
        } else {
            Axis::Y
        }
    }

    /// Length of the region along an axis
    pub fn extent(&self, axis: Axis) -> u32 {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
        }
    }

    /// Split into two regions at `offset` cells from the start of `axis`.
    ///
    /// Returns `None` unless `0 < offset < extent(axis)`.
    pub fn split(&self, axis: Axis, offset: u32) -> Option<(Region, Region)> {
        if offset == 0 || offset >= self.extent(axis) {
            return None;
        }
        let halves = match axis {
            Axis::X => (
                Region::new(self.x, self.y, offset, self.height),
                Region::new(self.x + offset, self.y, self.width - offset, self.height),
            ),
            Axis::Y => (
                Region::new(self.x, self.y, self.width, offset),
                Region::new(self.x, self.y + offset, self.width, self.height - offset),
            ),
        };
        Some(halves)
    }

    /// Grow by `margin` cells on every side, clipped to `bounds`
    pub fn expand_within(&self, margin: u32, bounds: &Region) -> Region {
        let x = self.x.saturating_sub(margin).max(bounds.x);
        let y = self.y.saturating_sub(margin).max(bounds.y);
        let right = self.right().saturating_add(margin).min(bounds.right());
        let bottom = self.bottom().saturating_add(margin).min(bounds.bottom());
        Region::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }

    /// Row-major index of absolute cell `(cx, cy)` inside this region
    pub fn index_of(&self, cx: u32, cy: u32) -> Option<usize> {
        if cx < self.x || cy < self.y || cx >= self.right() || cy >= self.bottom() {
            return None;
        }
        Some(((cy - self.y) as usize) * self.width as usize + (cx - self.x) as usize)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@({},{})", self.width, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_along_axes() {
        let r = Region::new(0, 0, 10, 4);
        let (a, b) = r.split(Axis::X, 3).unwrap();
        assert_eq!(a, Region::new(0, 0, 3, 4));
        assert_eq!(b, Region::new(3, 0, 7, 4));
        assert_eq!(a.area() + b.area(), r.area());

        let (top, bottom) = r.split(Axis::Y, 1).unwrap();
        assert_eq!(top.height + bottom.height, 4);
        assert!(r.split(Axis::X, 0).is_none());
        assert!(r.split(Axis::Y, 4).is_none());
    }

    #[test]
    fn test_expand_is_clipped() {
        let bounds = Region::new(0, 0, 8, 8);
        let tile = Region::new(0, 4, 4, 4);
        let padded = tile.expand_within(2, &bounds);
        assert_eq!(padded, Region::new(0, 2, 6, 6));
        assert!(bounds.contains(&padded));
        assert!(padded.contains(&tile));
    }

    #[test]
    fn test_edges_past_coordinate_space() {
        let r = Region::new(u32::MAX - 1, 0, 4, 4);
        assert!(!r.fits_coordinates());
        assert_eq!(r.right(), u32::MAX);
        assert!(Region::new(u32::MAX - 4, 0, 4, 4).fits_coordinates());
    }

    #[test]
    fn test_index_of() {
        let r = Region::new(2, 2, 3, 2);
        assert_eq!(r.index_of(2, 2), Some(0));
        assert_eq!(r.index_of(4, 3), Some(5));
        assert_eq!(r.index_of(5, 3), None);
    }
}
