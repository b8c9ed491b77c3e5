//! Vector shape input

use serde::{Deserialize, Serialize};

use super::SceneError;
use crate::foundation::math::{Mbr, Point2};

/// A line string or polygon ring in the local frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VectorShape {
    /// Open line string
    Linear(Vec<Point2>),
    /// Polygon outer ring (implicitly closed)
    Areal(Vec<Point2>),
}

impl VectorShape {
    /// Points of the shape
    pub fn points(&self) -> &[Point2] {
        match self {
            Self::Linear(points) | Self::Areal(points) => points,
        }
    }

    /// True for polygons
    pub const fn is_areal(&self) -> bool {
        matches!(self, Self::Areal(_))
    }

    /// Consecutive point pairs, including the closing edge of a ring
    pub fn segments(&self) -> impl Iterator<Item = (Point2, Point2)> + '_ {
        let points = self.points();
        let closing = match self {
            Self::Areal(ring) if ring.len() > 2 && ring.first() != ring.last() => {
                ring.last().copied().zip(ring.first().copied())
            }
            _ => None,
        };
        points.windows(2).map(|w| (w[0], w[1])).chain(closing)
    }

    /// Bounding rectangle
    pub fn bounds(&self) -> Mbr {
        Mbr::from_points(self.points())
    }

    /// Reject shapes that cannot produce geometry
    pub fn validate(&self) -> Result<(), SceneError> {
        let points = self.points();
        let needed = if self.is_areal() { 3 } else { 2 };
        if points.len() < needed {
            return Err(SceneError::InvalidGeometry(format!(
                "shape has {} points, needs at least {needed}",
                points.len()
            )));
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(SceneError::InvalidGeometry("non-finite coordinate".to_string()));
        }
        let bounds = self.bounds();
        if bounds.width() <= 0.0 && bounds.height() <= 0.0 {
            return Err(SceneError::InvalidGeometry("all points coincide".to_string()));
        }
        Ok(())
    }
}

/// Validate a whole batch; an empty batch is invalid
pub(crate) fn validate_all(shapes: &[VectorShape]) -> Result<(), SceneError> {
    if shapes.is_empty() {
        return Err(SceneError::InvalidGeometry("no shapes given".to_string()));
    }
    shapes.iter().try_for_each(VectorShape::validate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn test_ring_segments_close() {
        let ring = VectorShape::Areal(vec![pt(0.0, 0.0), pt(1.0, 0.0), pt(1.0, 1.0)]);
        let segments: Vec<_> = ring.segments().collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2], (pt(1.0, 1.0), pt(0.0, 0.0)));

        let line = VectorShape::Linear(vec![pt(0.0, 0.0), pt(1.0, 0.0), pt(1.0, 1.0)]);
        assert_eq!(line.segments().count(), 2);
    }

    #[test]
    fn test_degenerate_shapes_rejected() {
        assert!(VectorShape::Linear(vec![pt(0.0, 0.0)]).validate().is_err());
        assert!(VectorShape::Linear(vec![pt(2.0, 2.0), pt(2.0, 2.0)]).validate().is_err());
        assert!(VectorShape::Areal(vec![pt(0.0, 0.0), pt(1.0, 1.0)]).validate().is_err());
        assert!(VectorShape::Linear(vec![pt(0.0, f64::NAN), pt(1.0, 1.0)]).validate().is_err());
        assert!(validate_all(&[]).is_err());
    }

    #[test]
    fn test_valid_line() {
        let line = VectorShape::Linear(vec![pt(0.0, 0.0), pt(3.0, 0.0)]);
        assert!(line.validate().is_ok());
        assert!((line.bounds().width() - 3.0).abs() < f64::EPSILON);
    }
}
