//! Read-only view snapshot used by selection queries

use super::SpatialError;
use crate::foundation::math::{Mat3, Mbr, Point2, Vec2, Vector3};

/// Local-to-screen mapping and frame size at one instant
///
/// Screen coordinates are pixels with the origin at the top-left corner of
/// the frame and `y` growing downward.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    local_to_screen: Mat3,
    screen_to_local: Mat3,
    frame_size: Vec2,
}

impl ViewState {
    /// Create a view from a homogeneous local-to-screen transform
    pub fn new(local_to_screen: Mat3, frame_size: Vec2) -> Result<Self, SpatialError> {
        let screen_to_local = local_to_screen.try_inverse().ok_or(SpatialError::SingularView)?;
        Ok(Self {
            local_to_screen,
            screen_to_local,
            frame_size,
        })
    }

    /// A north-up view centered on `center`
    pub fn looking_at(center: Point2, units_per_pixel: f64, frame_size: Vec2) -> Result<Self, SpatialError> {
        if !(units_per_pixel.is_finite() && units_per_pixel > 0.0) {
            return Err(SpatialError::SingularView);
        }
        let s = 1.0 / units_per_pixel;
        #[rustfmt::skip]
        let m = Mat3::new(
            s,   0.0, frame_size.x / 2.0 - center.x * s,
            0.0, -s,  frame_size.y / 2.0 + center.y * s,
            0.0, 0.0, 1.0,
        );
        Self::new(m, frame_size)
    }

    /// Frame size in pixels
    pub const fn frame_size(&self) -> Vec2 {
        self.frame_size
    }

    /// Local point to screen pixels
    pub fn project(&self, local: &Point2) -> Point2 {
        apply(&self.local_to_screen, local)
    }

    /// Screen pixels to local point
    pub fn unproject(&self, screen: &Point2) -> Point2 {
        apply(&self.screen_to_local, screen)
    }

    /// Local length of one horizontal screen pixel
    pub fn units_per_pixel(&self) -> f64 {
        let step = self.screen_to_local * Vector3::new(1.0, 0.0, 0.0);
        Vec2::new(step.x, step.y).norm()
    }

    /// Screen-space bounding rectangle of a local rectangle
    pub fn screen_rect(&self, local: &Mbr) -> Mbr {
        Mbr::from_points(&local.corners().map(|p| self.project(&p)))
    }

    /// Local bounding rectangle of a screen rectangle
    pub fn local_rect(&self, screen: &Mbr) -> Mbr {
        Mbr::from_points(&screen.corners().map(|p| self.unproject(&p)))
    }

    /// True when the pixel lies inside the frame
    pub fn in_frame(&self, screen: &Point2) -> bool {
        screen.x >= 0.0 && screen.y >= 0.0 && screen.x <= self.frame_size.x && screen.y <= self.frame_size.y
    }
}

fn apply(m: &Mat3, p: &Point2) -> Point2 {
    let v = m * Vector3::new(p.x, p.y, 1.0);
    if v.z.abs() > f64::EPSILON {
        Point2::new(v.x / v.z, v.y / v.z)
    } else {
        Point2::new(v.x, v.y)
    }
}
