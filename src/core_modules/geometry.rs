// THEORY:
// Shared 2D primitives. Contours come out of the image as integer pixel
// coordinates (`PixelPoint`); everything downstream of the spectral model works
// in sub-pixel floating point (`Point2`). Both are small `Copy` values so the
// pipeline can pass them around freely.

use serde::{Deserialize, Serialize};

/// An integer pixel coordinate on the image grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_point2(self) -> Point2 {
        Point2::new(self.x as f64, self.y as f64)
    }
}

/// A sub-pixel 2D point or vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const ZERO: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn sub(self, other: Point2) -> Point2 {
        Point2::new(self.x - other.x, self.y - other.y)
    }

    pub fn add(self, other: Point2) -> Point2 {
        Point2::new(self.x + other.x, self.y + other.y)
    }

    pub fn scale(self, factor: f64) -> Point2 {
        Point2::new(self.x * factor, self.y * factor)
    }

    pub fn midpoint(self, other: Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Angle of this vector in radians, `(-PI, PI]`.
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn distance(self, other: Point2) -> f64 {
        self.sub(other).norm()
    }

    pub fn distance_squared(self, other: Point2) -> f64 {
        let d = self.sub(other);
        d.x * d.x + d.y * d.y
    }
}

/// Axis-aligned bounding box in pixel coordinates, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: PixelPoint,
    pub max: PixelPoint,
}

impl BoundingBox {
    pub fn from_points(points: &[PixelPoint]) -> Option<Self> {
        let first = *points.first()?;
        let mut bbox = BoundingBox { min: first, max: first };
        for p in &points[1..] {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x + 1
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y + 1
    }
}

/// Wraps a possibly negative index onto `0..len`.
pub fn wrap_index(index: isize, len: usize) -> usize {
    index.rem_euclid(len as isize) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_covers_all_points() {
        let points = [
            PixelPoint::new(4, 9),
            PixelPoint::new(-2, 3),
            PixelPoint::new(7, 5),
        ];
        let bbox = BoundingBox::from_points(&points).expect("non-empty");
        assert_eq!(bbox.min, PixelPoint::new(-2, 3));
        assert_eq!(bbox.max, PixelPoint::new(7, 9));
        assert_eq!(bbox.width(), 10);
        assert_eq!(bbox.height(), 7);
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn wrap_index_handles_both_directions() {
        assert_eq!(wrap_index(-1, 10), 9);
        assert_eq!(wrap_index(-11, 10), 9);
        assert_eq!(wrap_index(12, 10), 2);
        assert_eq!(wrap_index(3, 10), 3);
    }
}
