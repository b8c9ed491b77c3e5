//! Plain line features drawn with hardware lines

use serde::{Deserialize, Serialize};

use super::{check_fade, MAX_DRAWABLE_VERTICES};
use crate::changes::{Drawable, DrawableKind, Primitive};
use crate::scene::manager::{BuildContext, FeatureBuilder};
use crate::scene::shapes::{validate_all, VectorShape};
use crate::scene::SceneError;

/// Style of a vector add
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStyle {
    /// RGBA color
    pub color: [u8; 4],
    /// Line width in pixels
    pub line_width: f32,
    /// Fade-in time in seconds
    pub fade: f32,
    /// Sort order
    pub draw_priority: i32,
    /// Initial visibility
    pub enable: bool,
    /// Whether the object answers selection queries
    pub selectable: bool,
}

impl Default for VectorStyle {
    fn default() -> Self {
        Self {
            color: [255, 255, 255, 255],
            line_width: 1.0,
            fade: 0.0,
            draw_priority: 0,
            enable: true,
            selectable: true,
        }
    }
}

/// Builds [`DrawableKind::Vector`] drawables: line segments, rings closed
#[derive(Debug, Default, Clone, Copy)]
pub struct VectorBuilder;

impl VectorBuilder {
    fn start_drawable(ctx: &BuildContext<'_>, style: &VectorStyle) -> Drawable {
        let mut drawable = ctx.new_drawable(DrawableKind::Vector, Primitive::Lines);
        drawable.color = style.color;
        drawable.line_width = style.line_width;
        drawable.draw_priority = style.draw_priority;
        drawable.fade = style.fade;
        drawable.enabled = style.enable;
        drawable
    }
}

impl FeatureBuilder for VectorBuilder {
    type Shape = VectorShape;
    type Style = VectorStyle;

    const NAME: &'static str = "vector";
    const KIND: DrawableKind = DrawableKind::Vector;

    fn validate(&self, shapes: &[VectorShape], style: &VectorStyle) -> Result<(), SceneError> {
        validate_all(shapes)?;
        if !(style.line_width > 0.0) {
            return Err(SceneError::InvalidStyle("line_width must be positive".to_string()));
        }
        check_fade(style.fade)
    }

    fn build(&self, shapes: &[VectorShape], style: &VectorStyle, ctx: &mut BuildContext<'_>) -> Result<(), SceneError> {
        ctx.set_fade(style.fade);
        let mut drawable = Self::start_drawable(ctx, style);

        for shape in shapes {
            for (a, b) in shape.segments() {
                if drawable.geometry.vertex_count() + 2 > MAX_DRAWABLE_VERTICES {
                    let fresh = Self::start_drawable(ctx, style);
                    ctx.push(std::mem::replace(&mut drawable, fresh));
                }
                let geom = &mut drawable.geometry;
                let i = geom.push_vertex(a);
                let j = geom.push_vertex(b);
                geom.indices.extend([i, j]);
            }
        }

        ctx.push(drawable);
        Ok(())
    }
}
