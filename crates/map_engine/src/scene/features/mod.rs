//! Feature builders: one per kind of map geometry

mod marker;
mod sticker;
mod vector;
mod wide_vector;

pub use marker::{MarkerBuilder, MarkerStyle, ScreenMarker};
pub use sticker::{Sticker, StickerBuilder, StickerStyle};
pub use vector::{VectorBuilder, VectorStyle};
pub use wide_vector::{LineCap, LineJoin, WideVectorBuilder, WideVectorStyle, WidthCoordType};

use super::SceneError;

/// Largest vertex count a single drawable may carry (16-bit index buffers)
pub(crate) const MAX_DRAWABLE_VERTICES: usize = u16::MAX as usize;

fn check_fade(fade: f32) -> Result<(), SceneError> {
    if fade.is_finite() && fade >= 0.0 {
        Ok(())
    } else {
        Err(SceneError::InvalidStyle(format!("fade must be a non-negative time, got {fade}")))
    }
}
