//! Widened line features
//!
//! Real-width lines are extruded into triangles here, in local units. Screen
//! width lines keep their centerline and carry a per-vertex normal so the GPU
//! can extrude them by a pixel width every frame.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{check_fade, MAX_DRAWABLE_VERTICES};
use crate::changes::{Drawable, DrawableFlags, DrawableKind, Geometry, Primitive};
use crate::foundation::ids::Identifier;
use crate::foundation::math::{Point2, Vec2};
use crate::scene::manager::{BuildContext, FeatureBuilder};
use crate::scene::shapes::{validate_all, VectorShape};
use crate::scene::SceneError;

/// Units of [`WideVectorStyle::width`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WidthCoordType {
    /// Pixels, applied on the GPU
    #[default]
    Screen,
    /// Local map units, baked into the geometry
    Real,
}

/// Shape of the corner between two segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineJoin {
    /// Sharp corner, beveled beyond the miter limit
    #[default]
    Miter,
    /// Circular corner
    Round,
    /// Flat corner
    Bevel,
}

/// Shape of the ends of an open line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineCap {
    /// Ends exactly at the endpoint
    #[default]
    Butt,
    /// Semicircle around the endpoint
    Round,
    /// Extends half the width past the endpoint
    Square,
}

/// Style of a wide vector add
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WideVectorStyle {
    /// RGBA color
    pub color: [u8; 4],
    /// Line width in the units given by `coord_type`
    pub width: f64,
    /// Units of `width`
    pub coord_type: WidthCoordType,
    /// Corner shape
    pub join: LineJoin,
    /// End shape
    pub cap: LineCap,
    /// Miter length limit as a multiple of half the width
    pub miter_limit: f64,
    /// Fade-in time in seconds
    pub fade: f32,
    /// Sort order
    pub draw_priority: i32,
    /// Initial visibility
    pub enable: bool,
    /// Pattern texture repeated along the line
    pub texture: Option<Identifier>,
    /// Length of one texture repeat, in the units of `width`
    pub repeat_size: f64,
    /// Whether the object answers selection queries
    pub selectable: bool,
}

impl Default for WideVectorStyle {
    fn default() -> Self {
        Self {
            color: [255, 255, 255, 255],
            width: 2.0,
            coord_type: WidthCoordType::Screen,
            join: LineJoin::Miter,
            cap: LineCap::Butt,
            miter_limit: 2.0,
            fade: 0.0,
            draw_priority: 0,
            enable: true,
            texture: None,
            repeat_size: 32.0,
            selectable: true,
        }
    }
}

/// Builds [`DrawableKind::WideVector`] drawables
#[derive(Debug, Default, Clone, Copy)]
pub struct WideVectorBuilder;

/// Upper bound of vertices one segment can add (quad, join fan, two caps)
const SEGMENT_VERTEX_BUDGET: usize = 4 + 2 * 10 + 20;

/// Angle covered by one triangle of a round join or cap
const ROUND_STEP: f64 = PI / 8.0;

impl WideVectorBuilder {
    fn start_drawable(ctx: &BuildContext<'_>, style: &WideVectorStyle) -> Drawable {
        let mut drawable = ctx.new_drawable(DrawableKind::WideVector, Primitive::Triangles);
        drawable.color = style.color;
        #[allow(clippy::cast_possible_truncation)]
        {
            drawable.line_width = style.width as f32;
        }
        drawable.draw_priority = style.draw_priority;
        drawable.fade = style.fade;
        drawable.enabled = style.enable;
        drawable.texture = style.texture;
        if style.coord_type == WidthCoordType::Screen {
            drawable.flags |= DrawableFlags::GPU_WIDENED;
        }
        drawable
    }
}

impl FeatureBuilder for WideVectorBuilder {
    type Shape = VectorShape;
    type Style = WideVectorStyle;

    const NAME: &'static str = "wide vector";
    const KIND: DrawableKind = DrawableKind::WideVector;

    fn validate(&self, shapes: &[VectorShape], style: &WideVectorStyle) -> Result<(), SceneError> {
        validate_all(shapes)?;
        if !(style.width.is_finite() && style.width > 0.0) {
            return Err(SceneError::InvalidStyle(format!("width must be positive, got {}", style.width)));
        }
        if !(style.miter_limit >= 1.0) {
            return Err(SceneError::InvalidStyle("miter_limit must be at least 1".to_string()));
        }
        if !(style.repeat_size >= 0.0) {
            return Err(SceneError::InvalidStyle("repeat_size must be non-negative".to_string()));
        }
        check_fade(style.fade)
    }

    fn build(&self, shapes: &[VectorShape], style: &WideVectorStyle, ctx: &mut BuildContext<'_>) -> Result<(), SceneError> {
        ctx.set_fade(style.fade);
        let mut drawable = Self::start_drawable(ctx, style);

        for shape in shapes {
            let mut points = shape.points().to_vec();
            let closed = shape.is_areal();
            if closed && points.first() != points.last() {
                points.push(points[0]);
            }

            let mut line = Polyline::new(&points, closed, style);
            for segment in 0..points.len().saturating_sub(1) {
                if drawable.geometry.vertex_count() + SEGMENT_VERTEX_BUDGET > MAX_DRAWABLE_VERTICES {
                    let fresh = Self::start_drawable(ctx, style);
                    let full = std::mem::replace(&mut drawable, fresh);
                    ctx.push(full);
                }
                line.emit_segment(&mut drawable.geometry, segment);
            }
        }

        ctx.push(drawable);
        Ok(())
    }
}

/// Widening state for one polyline
struct Polyline<'a> {
    points: &'a [Point2],
    closed: bool,
    half: f64,
    style: &'a WideVectorStyle,
    along: f64,
}

impl<'a> Polyline<'a> {
    fn new(points: &'a [Point2], closed: bool, style: &'a WideVectorStyle) -> Self {
        Self {
            points,
            closed,
            half: style.width / 2.0,
            style,
            along: 0.0,
        }
    }

    const fn screen(&self) -> bool {
        matches!(self.style.coord_type, WidthCoordType::Screen)
    }

    fn direction(&self, from: usize) -> Option<Vec2> {
        let a = self.points.get(from)?;
        let b = self.points.get(from + 1)?;
        let d = b - a;
        let len = d.norm();
        (len > f64::EPSILON).then(|| d / len)
    }

    fn u(&self, along: f64) -> f32 {
        #[allow(clippy::cast_possible_truncation)]
        let u = if self.style.repeat_size > 0.0 {
            (along / self.style.repeat_size) as f32
        } else {
            0.0
        };
        u
    }

    /// Push a vertex at `pivot` displaced by `offset` (half-width scaled)
    fn vertex(&self, geom: &mut Geometry, pivot: Point2, offset: Vec2, uv: [f32; 2]) -> u32 {
        let index = if self.screen() {
            geom.normals.push(offset / self.half);
            geom.push_vertex(pivot)
        } else {
            geom.push_vertex(pivot + offset)
        };
        geom.tex_coords.push(uv);
        index
    }

    fn emit_segment(&mut self, geom: &mut Geometry, i: usize) {
        let Some(d) = self.direction(i) else {
            return;
        };
        let (a, b) = (self.points[i], self.points[i + 1]);
        let n = Vec2::new(-d.y, d.x) * self.half;
        let last = i + 2 == self.points.len();

        let mut start = a;
        let mut end = b;
        if !self.closed && self.style.cap == LineCap::Square && !self.screen() {
            if i == 0 {
                start -= d * self.half;
            }
            if last {
                end += d * self.half;
            }
        }

        let length = (b - a).norm();
        let (u0, u1) = (self.u(self.along), self.u(self.along + length));
        let p0 = self.vertex(geom, start, n, [u0, 0.0]);
        let p1 = self.vertex(geom, start, -n, [u0, 1.0]);
        let p2 = self.vertex(geom, end, n, [u1, 0.0]);
        let p3 = self.vertex(geom, end, -n, [u1, 1.0]);
        geom.indices.extend([p0, p1, p3, p0, p3, p2]);

        if !self.closed && self.style.cap == LineCap::Round {
            if i == 0 {
                self.fan(geom, a, -n, -PI, u0);
            }
            if last {
                self.fan(geom, b, n, -PI, u1);
            }
        }

        self.along += length;

        let next = if !last {
            self.direction(i + 1)
        } else if self.closed {
            self.direction(0)
        } else {
            None
        };
        if let Some(next) = next {
            self.join(geom, b, d, next, u1);
        }
    }

    fn join(&self, geom: &mut Geometry, pivot: Point2, d0: Vec2, d1: Vec2, u: f32) {
        let cross = d0.x * d1.y - d0.y * d1.x;
        if cross.abs() <= f64::EPSILON {
            return;
        }
        // The outer side of a left turn is the right-hand side.
        let side = if cross > 0.0 { -1.0 } else { 1.0 };
        let o0 = Vec2::new(-d0.y, d0.x) * self.half * side;
        let o1 = Vec2::new(-d1.y, d1.x) * self.half * side;

        match self.style.join {
            LineJoin::Round => {
                let sweep = o0.angle(&o1) * cross.signum();
                self.fan(geom, pivot, o0, sweep, u);
            }
            LineJoin::Miter => {
                let bisector = (o0 + o1).normalize();
                let cos_half = bisector.dot(&o0) / self.half;
                let miter = self.half / cos_half.max(f64::EPSILON);
                if miter / self.half <= self.style.miter_limit {
                    let c = self.vertex(geom, pivot, Vec2::zeros(), [u, 0.5]);
                    let a = self.vertex(geom, pivot, o0, [u, 0.5]);
                    let m = self.vertex(geom, pivot, bisector * miter, [u, 0.5]);
                    let b = self.vertex(geom, pivot, o1, [u, 0.5]);
                    geom.indices.extend([c, a, m, c, m, b]);
                } else {
                    self.bevel(geom, pivot, o0, o1, u);
                }
            }
            LineJoin::Bevel => self.bevel(geom, pivot, o0, o1, u),
        }
    }

    fn bevel(&self, geom: &mut Geometry, pivot: Point2, o0: Vec2, o1: Vec2, u: f32) {
        let c = self.vertex(geom, pivot, Vec2::zeros(), [u, 0.5]);
        let a = self.vertex(geom, pivot, o0, [u, 0.5]);
        let b = self.vertex(geom, pivot, o1, [u, 0.5]);
        geom.indices.extend([c, a, b]);
    }

    /// Triangle fan around `center` starting at `from`, turning by `sweep` radians
    fn fan(&self, geom: &mut Geometry, center: Point2, from: Vec2, sweep: f64, u: f32) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = ((sweep.abs() / ROUND_STEP).ceil() as usize).max(1);
        let c = self.vertex(geom, center, Vec2::zeros(), [u, 0.5]);
        let mut prev = self.vertex(geom, center, from, [u, 0.5]);
        for step in 1..=steps {
            #[allow(clippy::cast_precision_loss)]
            let angle = sweep * step as f64 / steps as f64;
            let (sin, cos) = angle.sin_cos();
            let rotated = Vec2::new(from.x * cos - from.y * sin, from.x * sin + from.y * cos);
            let next = self.vertex(geom, center, rotated, [u, 0.5]);
            geom.indices.extend([c, prev, next]);
            prev = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeCommand, ChangeQueue, ChangeSet};
    use crate::core::config::ResourceConfig;
    use crate::foundation::ids::IdentifierAllocator;
    use crate::resources::ResourceRegistry;
    use crate::scene::SceneManager;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn manager() -> SceneManager<WideVectorBuilder> {
        let resources = ResourceRegistry::new(
            &ResourceConfig::default(),
            Arc::new(IdentifierAllocator::new()),
            Arc::new(ChangeQueue::new()),
        );
        SceneManager::new(WideVectorBuilder, Arc::new(resources), 0)
    }

    fn built(shapes: &[VectorShape], style: &WideVectorStyle) -> Vec<Drawable> {
        let mut changes = ChangeSet::new();
        manager().add(shapes, style, &mut changes).unwrap();
        changes
            .into_commands()
            .into_iter()
            .filter_map(|c| match c {
                ChangeCommand::CreateDrawable(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    fn line(points: &[(f64, f64)]) -> VectorShape {
        VectorShape::Linear(points.iter().map(|&(x, y)| Point2::new(x, y)).collect())
    }

    fn real(width: f64) -> WideVectorStyle {
        WideVectorStyle {
            width,
            coord_type: WidthCoordType::Real,
            ..WideVectorStyle::default()
        }
    }

    #[test]
    fn test_real_width_is_baked() {
        let drawables = built(&[line(&[(0.0, 0.0), (10.0, 0.0)])], &real(2.0));
        assert_eq!(drawables.len(), 1);

        let geom = &drawables[0].geometry;
        assert_eq!(geom.vertex_count(), 4);
        assert_eq!(geom.indices.len(), 6);
        assert!(geom.normals.is_empty());
        assert_relative_eq!(geom.vertices[0].y, 1.0);
        assert_relative_eq!(geom.vertices[1].y, -1.0);
        assert!(!drawables[0].flags.contains(DrawableFlags::GPU_WIDENED));
    }

    #[test]
    fn test_screen_width_uses_normals() {
        let drawables = built(&[line(&[(0.0, 0.0), (0.0, 5.0)])], &WideVectorStyle::default());
        let drawable = &drawables[0];
        assert!(drawable.flags.contains(DrawableFlags::GPU_WIDENED));
        assert_eq!(drawable.geometry.normals.len(), drawable.geometry.vertex_count());
        // Centerline stays in place; the normal points left of travel.
        assert_relative_eq!(drawable.geometry.vertices[0].x, 0.0);
        assert_relative_eq!(drawable.geometry.normals[0].x, -1.0);
    }

    #[test]
    fn test_bevel_join_adds_triangle() {
        let style = WideVectorStyle {
            join: LineJoin::Bevel,
            ..real(2.0)
        };
        let drawables = built(&[line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)])], &style);
        let geom = &drawables[0].geometry;
        assert_eq!(geom.vertex_count(), 4 + 4 + 3);
        assert_eq!(geom.indices.len(), 6 + 6 + 3);
    }

    #[test]
    fn test_square_cap_extends_ends() {
        let style = WideVectorStyle {
            cap: LineCap::Square,
            ..real(4.0)
        };
        let drawables = built(&[line(&[(0.0, 0.0), (10.0, 0.0)])], &style);
        let xs: Vec<f64> = drawables[0].geometry.vertices.iter().map(|p| p.x).collect();
        assert_relative_eq!(xs[0], -2.0);
        assert_relative_eq!(xs[3], 12.0);
    }

    #[test]
    fn test_round_cap_fans() {
        let style = WideVectorStyle {
            cap: LineCap::Round,
            ..real(2.0)
        };
        let drawables = built(&[line(&[(0.0, 0.0), (10.0, 0.0)])], &style);
        // Quad plus two semicircle fans of 8 steps (center + 9 rim vertices).
        assert_eq!(drawables[0].geometry.vertex_count(), 4 + 2 * 10);
    }

    #[test]
    fn test_closed_ring_joins_every_corner() {
        let style = WideVectorStyle {
            join: LineJoin::Bevel,
            ..real(1.0)
        };
        let ring = VectorShape::Areal(vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ]);
        let drawables = built(&[ring], &style);
        assert_eq!(drawables[0].geometry.vertex_count(), 4 * 4 + 4 * 3);
    }

    #[test]
    fn test_invalid_width_rejected() {
        let mut changes = ChangeSet::new();
        let result = manager().add(&[line(&[(0.0, 0.0), (1.0, 1.0)])], &real(0.0), &mut changes);
        assert!(matches!(result, Err(SceneError::InvalidStyle(_))));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_style_from_toml() {
        let style: WideVectorStyle = toml::from_str(
            r#"
            width = 6.0
            coord_type = "Real"
            join = "Round"
            "#,
        )
        .unwrap();
        assert_eq!(style.coord_type, WidthCoordType::Real);
        assert_eq!(style.join, LineJoin::Round);
        assert!(style.enable);
    }
}
