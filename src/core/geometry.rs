//! Plain geometry types shared by the tree, snapping and rendering layers.
//!
//! All values are deck millimetres in a y-up coordinate system, matching the
//! hardware descriptions produced by the protocol side.

use serde::{Deserialize, Serialize};

// ───────────────────────────────────────── coordinate ────────

/// A 3D offset.  Locations are always relative to the parent resource except
/// for the root, whose location is taken as absolute.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Coordinate {
    pub const ZERO: Coordinate = Coordinate { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Flat helper for the 2D layers, which never care about `z`.
    pub fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn offset_by(self, other: Coordinate) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn minus(self, other: Coordinate) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

// ───────────────────────────────────────── size ──────────────

/// Bounding box dimensions of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Size {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

// ───────────────────────────────────────── rect ──────────────

/// Axis-aligned rectangle in absolute deck coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn at(origin: Coordinate, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.x, size.y)
    }

    /// Strict containment: points on the border are outside.
    pub fn contains_strict(&self, x: f64, y: f64) -> bool {
        x > self.x && x < self.x + self.width && y > self.y && y < self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(x, y, self.right().max(other.right()) - x, self.top().max(other.top()) - y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_points_are_not_contained() {
        let r = Rect::new(10.0, 10.0, 5.0, 5.0);
        assert!(r.contains_strict(12.0, 12.0));
        assert!(!r.contains_strict(10.0, 12.0));
        assert!(!r.contains_strict(12.0, 15.0));
    }

    #[test]
    fn union_covers_both() {
        let a = Rect::new(0.0, 0.0, 2.0, 2.0);
        let b = Rect::new(5.0, -1.0, 1.0, 1.0);
        assert_eq!(a.union(&b), Rect::new(0.0, -1.0, 6.0, 3.0));
    }
}
