//! Stickers: images draped over a rectangle of the map

use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::check_fade;
use crate::changes::{DrawableKind, Primitive, TextureFormat, WrapFlags};
use crate::foundation::math::{Mbr, Point2, Vec2};
use crate::scene::manager::{BuildContext, FeatureBuilder};
use crate::scene::SceneError;

/// One sticker
#[derive(Debug, Clone)]
pub struct Sticker {
    /// Lower-left corner in the local frame
    pub ll: Point2,
    /// Upper-right corner in the local frame
    pub ur: Point2,
    /// Rotation about the center in radians
    pub rotation: f64,
    /// Image to drape
    pub image: Arc<RgbaImage>,
}

impl Sticker {
    /// An unrotated sticker covering `ll`..`ur`
    pub fn new(ll: Point2, ur: Point2, image: Arc<RgbaImage>) -> Self {
        Self {
            ll,
            ur,
            rotation: 0.0,
            image,
        }
    }

    /// Corners in the local frame, counter-clockwise from lower-left
    pub fn corners(&self) -> [Point2; 4] {
        let rect = Mbr::new(self.ll, self.ur);
        if self.rotation.abs() <= f64::EPSILON {
            return rect.corners();
        }
        let center = Point2::new(
            (self.ll.x + self.ur.x) / 2.0,
            (self.ll.y + self.ur.y) / 2.0,
        );
        let (sin, cos) = self.rotation.sin_cos();
        rect.corners().map(|p| {
            let v: Vec2 = p - center;
            center + Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
        })
    }
}

/// Style of a sticker add
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickerStyle {
    /// Sort order
    pub draw_priority: i32,
    /// Fade-in time in seconds
    pub fade: f32,
    /// Initial visibility
    pub enable: bool,
    /// Texture format images are uploaded in
    pub format: TextureFormat,
    /// Whether stickers answer selection queries
    pub selectable: bool,
}

impl Default for StickerStyle {
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

/// Builds [`DrawableKind::Sticker`] drawables, one per sticker
#[derive(Debug, Default, Clone, Copy)]
pub struct StickerBuilder;

impl FeatureBuilder for StickerBuilder {
    type Shape = Sticker;
    type Style = StickerStyle;

    const NAME: &'static str = "sticker";
    const KIND: DrawableKind = DrawableKind::Sticker;

    fn validate(&self, stickers: &[Sticker], style: &StickerStyle) -> Result<(), SceneError> {
        if stickers.is_empty() {
            return Err(SceneError::InvalidGeometry("no stickers given".to_string()));
        }
        for sticker in stickers {
            if !(sticker.ll.x < sticker.ur.x && sticker.ll.y < sticker.ur.y) {
                return Err(SceneError::InvalidGeometry(format!(
                    "sticker corners {:?}..{:?} do not span an area",
                    sticker.ll, sticker.ur
                )));
            }
            if sticker.image.width() == 0 || sticker.image.height() == 0 {
                return Err(SceneError::InvalidGeometry("sticker image is empty".to_string()));
            }
        }
        check_fade(style.fade)
    }

    fn build(&self, stickers: &[Sticker], style: &StickerStyle, ctx: &mut BuildContext<'_>) -> Result<(), SceneError> {
        ctx.set_fade(style.fade);
        for sticker in stickers {
            let texture = ctx.acquire_image(&sticker.image, style.format, WrapFlags::empty())?;

            let mut drawable = ctx.new_drawable(DrawableKind::Sticker, Primitive::Triangles);
            drawable.draw_priority = style.draw_priority;
            drawable.fade = style.fade;
            drawable.enabled = style.enable;
            drawable.texture = Some(texture);

            let geom = &mut drawable.geometry;
            let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
            for (corner, uv) in sticker.corners().into_iter().zip(uvs) {
                geom.push_vertex(corner);
                geom.tex_coords.push(uv);
            }
            geom.indices.extend([0, 1, 2, 0, 2, 3]);
            ctx.push(drawable);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn image() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::new(4, 4))
    }

    #[test]
    fn test_unrotated_corners() {
        let sticker = Sticker::new(Point2::new(0.0, 0.0), Point2::new(2.0, 1.0), image());
        let corners = sticker.corners();
        assert_relative_eq!(corners[2].x, 2.0);
        assert_relative_eq!(corners[2].y, 1.0);
    }

    #[test]
    fn test_rotation_keeps_center() {
        let mut sticker = Sticker::new(Point2::new(0.0, 0.0), Point2::new(2.0, 2.0), image());
        sticker.rotation = std::f64::consts::PI;
        let corners = sticker.corners();
        assert_relative_eq!(corners[0].x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(corners[0].y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverted_rect_rejected() {
        let sticker = Sticker::new(Point2::new(2.0, 0.0), Point2::new(0.0, 1.0), image());
        assert!(StickerBuilder.validate(&[sticker], &StickerStyle::default()).is_err());
    }
}
