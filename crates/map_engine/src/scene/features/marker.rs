//! Screen-space markers: fixed pixel-size quads anchored at map locations

use std::collections::BTreeMap;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::{check_fade, MAX_DRAWABLE_VERTICES};
use crate::changes::{Drawable, DrawableFlags, DrawableKind, Primitive, TextureFormat, WrapFlags};
use crate::foundation::ids::Identifier;
use crate::foundation::math::{Point2, Vec2};
use crate::resources::SelectableObject;
use crate::scene::manager::{BuildContext, FeatureBuilder};
use crate::scene::SceneError;

/// One marker
#[derive(Debug, Clone)]
pub struct ScreenMarker {
    /// Anchor in the local frame
    pub location: Point2,
    /// Width and height in pixels
    pub size: [f64; 2],
    /// Pixel offset of the quad center from the anchor
    pub offset: [f64; 2],
    /// Rotation in radians, counter-clockwise
    pub rotation: f64,
    /// RGBA tint
    pub color: [u8; 4],
    /// Marker image; untextured markers are drawn as solid quads
    pub image: Option<Arc<RgbaImage>>,
    /// Object returned when this marker is selected
    pub user_object: Option<SelectableObject>,
    /// Selection ID the user object is registered under
    pub selection_id: Identifier,
}

impl ScreenMarker {
    /// An untextured marker of `size` pixels at `location`
    pub fn new(location: Point2, size: [f64; 2]) -> Self {
        Self {
            location,
            size,
            offset: [0.0, 0.0],
            rotation: 0.0,
            color: [255, 255, 255, 255],
            image: None,
            user_object: None,
            selection_id: Identifier::EMPTY,
        }
    }

    /// Attach an image
    #[must_use]
    pub fn with_image(mut self, image: Arc<RgbaImage>) -> Self {
        self.image = Some(image);
        self
    }

    /// Attach the object returned on selection
    #[must_use]
    pub fn with_user_object(mut self, object: SelectableObject) -> Self {
        self.user_object = Some(object);
        self
    }

    /// Corner offsets in pixels, counter-clockwise from lower-left
    pub fn corner_offsets(&self) -> [Vec2; 4] {
        let (hw, hh) = (self.size[0] / 2.0, self.size[1] / 2.0);
        let (sin, cos) = self.rotation.sin_cos();
        let offset = Vec2::new(self.offset[0], self.offset[1]);
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
            .map(|(x, y)| Vec2::new(x * cos - y * sin, x * sin + y * cos) + offset)
    }
}

/// Style of a marker add
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    /// Sort order before the screen-space offset is added
    pub draw_priority: i32,
    /// Fade-in time in seconds
    pub fade: f32,
    /// Initial visibility
    pub enable: bool,
    /// Texture format marker images are uploaded in
    pub format: TextureFormat,
    /// Whether markers answer selection queries
    pub selectable: bool,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            draw_priority: 0,
            fade: 0.0,
            enable: true,
            format: TextureFormat::Rgba8888,
            selectable: true,
        }
    }
}

/// Builds [`DrawableKind::ScreenMarker`] drawables, one per distinct texture
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerBuilder;

impl MarkerBuilder {
    fn start_drawable(ctx: &BuildContext<'_>, style: &MarkerStyle, texture: Option<Identifier>) -> Drawable {
        let mut drawable = ctx.new_drawable(DrawableKind::ScreenMarker, Primitive::Triangles);
        drawable.draw_priority = style.draw_priority.saturating_add(ctx.screen_priority_offset());
        drawable.fade = style.fade;
        drawable.enabled = style.enable;
        drawable.texture = texture;
        drawable.flags = DrawableFlags::SCREEN_SPACE | DrawableFlags::NO_DEPTH;
        drawable
    }
}

impl FeatureBuilder for MarkerBuilder {
    type Shape = ScreenMarker;
    type Style = MarkerStyle;

    const NAME: &'static str = "screen marker";
    const KIND: DrawableKind = DrawableKind::ScreenMarker;

    fn validate(&self, markers: &[ScreenMarker], style: &MarkerStyle) -> Result<(), SceneError> {
        if markers.is_empty() {
            return Err(SceneError::InvalidGeometry("no markers given".to_string()));
        }
        for marker in markers {
            if !(marker.location.x.is_finite() && marker.location.y.is_finite()) {
                return Err(SceneError::InvalidGeometry("marker location is not finite".to_string()));
            }
            if !(marker.size[0] > 0.0 && marker.size[1] > 0.0) {
                return Err(SceneError::InvalidGeometry(format!(
                    "marker size {:?} must be positive",
                    marker.size
                )));
            }
        }
        check_fade(style.fade)
    }

    fn build(&self, markers: &[ScreenMarker], style: &MarkerStyle, ctx: &mut BuildContext<'_>) -> Result<(), SceneError> {
        ctx.set_fade(style.fade);
        let mut by_texture: BTreeMap<Option<Identifier>, Drawable> = BTreeMap::new();

        for marker in markers {
            let texture = match &marker.image {
                Some(image) => Some(ctx.acquire_image(image, style.format, WrapFlags::empty())?),
                None => None,
            };

            if by_texture
                .get(&texture)
                .is_some_and(|d| d.geometry.vertex_count() + 4 > MAX_DRAWABLE_VERTICES)
            {
                if let Some(full) = by_texture.remove(&texture) {
                    ctx.push(full);
                }
            }
            let drawable = by_texture
                .entry(texture)
                .or_insert_with(|| Self::start_drawable(ctx, style, texture));
            drawable.color = marker.color;

            let geom = &mut drawable.geometry;
            let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
            let mut corners = [0u32; 4];
            for ((corner, offset), uv) in corners.iter_mut().zip(marker.corner_offsets()).zip(uvs) {
                *corner = geom.push_vertex(Point2::from(offset));
                geom.anchors.push(marker.location);
                geom.tex_coords.push(uv);
            }
            geom.indices
                .extend([corners[0], corners[1], corners[2], corners[0], corners[2], corners[3]]);

            if let Some(object) = &marker.user_object {
                if style.selectable && !marker.selection_id.is_empty() {
                    ctx.register_selectable(marker.selection_id, Arc::clone(object));
                }
            }
        }

        for drawable in by_texture.into_values() {
            ctx.push(drawable);
        }
        Ok(())
    }
}
