//! Style changes applied to features that are already built

use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::features::{Sticker, StickerStyle, VectorStyle, WideVectorStyle};
use super::SceneError;
use crate::changes::TextureFormat;

/// Changes to vectors or wide vectors; unset fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorChange {
    /// RGBA color
    pub color: Option<[u8; 4]>,
    /// Line width: pixels for vectors, the style's width units for wide vectors
    pub width: Option<f64>,
    /// Sort order
    pub draw_priority: Option<i32>,
    /// Fade-in time in seconds
    pub fade: Option<f32>,
    /// Visibility
    pub enable: Option<bool>,
}

impl VectorChange {
    /// Reject values no style could take
    pub fn validate(&self) -> Result<(), SceneError> {
        if let Some(width) = self.width {
            if !(width.is_finite() && width > 0.0) {
                return Err(SceneError::InvalidStyle(format!("width must be positive, got {width}")));
            }
        }
        if let Some(fade) = self.fade {
            if !(fade.is_finite() && fade >= 0.0) {
                return Err(SceneError::InvalidStyle(format!("fade must be a non-negative time, got {fade}")));
            }
        }
        Ok(())
    }

    /// True when the drawables have to be rebuilt, not just shown or hidden
    pub fn needs_rebuild(&self) -> bool {
        self.color.is_some() || self.width.is_some() || self.draw_priority.is_some() || self.fade.is_some()
    }

    /// Apply the set fields to a vector style
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply_to_vector(&self, style: &mut VectorStyle) {
        if let Some(color) = self.color {
            style.color = color;
        }
        if let Some(width) = self.width {
            style.line_width = width as f32;
        }
        if let Some(priority) = self.draw_priority {
            style.draw_priority = priority;
        }
        if let Some(fade) = self.fade {
            style.fade = fade;
        }
    }

    /// Apply the set fields to a wide vector style
    pub fn apply_to_wide_vector(&self, style: &mut WideVectorStyle) {
        if let Some(color) = self.color {
            style.color = color;
        }
        if let Some(width) = self.width {
            style.width = width;
        }
        if let Some(priority) = self.draw_priority {
            style.draw_priority = priority;
        }
        if let Some(fade) = self.fade {
            style.fade = fade;
        }
    }
}

/// Changes to stickers; unset fields keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StickerChange {
    /// Sort order
    pub draw_priority: Option<i32>,
    /// Fade-in time in seconds
    pub fade: Option<f32>,
    /// Texture format images are uploaded in
    pub format: Option<TextureFormat>,
    /// Visibility
    pub enable: Option<bool>,
    /// Replacement images, given to the stickers in order and repeated when
    /// there are fewer images than stickers
    #[serde(skip)]
    pub images: Vec<Arc<RgbaImage>>,
}

impl StickerChange {
    /// Replace the images of every sticker
    #[must_use]
    pub fn with_images(mut self, images: Vec<Arc<RgbaImage>>) -> Self {
        self.images = images;
        self
    }

    /// Reject values no style could take
    pub fn validate(&self) -> Result<(), SceneError> {
        if let Some(fade) = self.fade {
            if !(fade.is_finite() && fade >= 0.0) {
                return Err(SceneError::InvalidStyle(format!("fade must be a non-negative time, got {fade}")));
            }
        }
        Ok(())
    }

    /// True when the drawables have to be rebuilt
    pub fn needs_rebuild(&self) -> bool {
        self.draw_priority.is_some() || self.fade.is_some() || self.format.is_some() || !self.images.is_empty()
    }

    /// Apply the set fields to stickers and their style
    pub fn apply(&self, stickers: &mut [Sticker], style: &mut StickerStyle) {
        if let Some(priority) = self.draw_priority {
            style.draw_priority = priority;
        }
        if let Some(fade) = self.fade {
            style.fade = fade;
        }
        if let Some(format) = self.format {
            style.format = format;
        }
        if !self.images.is_empty() {
            for (sticker, image) in stickers.iter_mut().zip(self.images.iter().cycle()) {
                sticker.image = Arc::clone(image);
            }
        }
    }
}
