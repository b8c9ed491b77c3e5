//! Math utilities and types
//!
//! Map geometry lives in a double-precision local frame (the coordinate
//! system's projected plane); screen space is pixels with the origin at the
//! top-left of the frame.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix3, Vector2, Vector3};

/// 2D point in local or screen coordinates
pub type Point2 = nalgebra::Point2<f64>;

/// 2D vector in local or screen coordinates
pub type Vec2 = Vector2<f64>;

/// 3x3 homogeneous 2D transform
pub type Mat3 = Matrix3<f64>;

/// Axis-aligned bounding rectangle ("minimum bounding rectangle")
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mbr {
    /// Lower-left corner
    pub ll: Point2,
    /// Upper-right corner
    pub ur: Point2,
}

impl Mbr {
    /// Create a rectangle from its corners
    pub const fn new(ll: Point2, ur: Point2) -> Self {
        Self { ll, ur }
    }

    /// An inverted rectangle that any added point will replace
    pub fn empty() -> Self {
        Self {
            ll: Point2::new(f64::MAX, f64::MAX),
            ur: Point2::new(f64::MIN, f64::MIN),
        }
    }

    /// Smallest rectangle containing every point
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Self {
        let mut mbr = Self::empty();
        for pt in points {
            mbr.add_point(pt);
        }
        mbr
    }

    /// Grow to include a point
    pub fn add_point(&mut self, pt: &Point2) {
        self.ll.x = self.ll.x.min(pt.x);
        self.ll.y = self.ll.y.min(pt.y);
        self.ur.x = self.ur.x.max(pt.x);
        self.ur.y = self.ur.y.max(pt.y);
    }

    /// True once at least one point has been added
    pub fn is_valid(&self) -> bool {
        self.ll.x <= self.ur.x && self.ll.y <= self.ur.y
    }

    /// Width of the rectangle
    pub fn width(&self) -> f64 {
        self.ur.x - self.ll.x
    }

    /// Height of the rectangle
    pub fn height(&self) -> f64 {
        self.ur.y - self.ll.y
    }

    /// The four corners, counter-clockwise from lower-left
    pub fn corners(&self) -> [Point2; 4] {
        [
            self.ll,
            Point2::new(self.ur.x, self.ll.y),
            self.ur,
            Point2::new(self.ll.x, self.ur.y),
        ]
    }

    /// Inclusive containment test
    pub fn contains(&self, pt: &Point2) -> bool {
        pt.x >= self.ll.x && pt.x <= self.ur.x && pt.y >= self.ll.y && pt.y <= self.ur.y
    }

    /// Rectangle grown by `amount` on every side
    pub fn expanded(&self, amount: f64) -> Self {
        Self {
            ll: Point2::new(self.ll.x - amount, self.ll.y - amount),
            ur: Point2::new(self.ur.x + amount, self.ur.y + amount),
        }
    }
}

/// Distance from `pt` to the segment `a`-`b`
pub fn distance_to_segment(pt: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= f64::EPSILON {
        return (pt - a).norm();
    }
    let t = ((pt - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    let closest = a + ab * t;
    (pt - closest).norm()
}

/// Even-odd point-in-polygon test (ring may be open or closed)
pub fn point_in_polygon(pt: &Point2, ring: &[Point2]) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi.y > pt.y) != (pj.y > pt.y)
            && pt.x < (pj.x - pi.x) * (pt.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
