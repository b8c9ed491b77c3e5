//! # Feature Scene Managers
//!
//! A scene manager turns one logical "add these shapes with this style"
//! request into drawables and records the result as a [`SceneRep`]. The
//! generic [`SceneManager`] handles bookkeeping; a [`FeatureBuilder`] per
//! feature type produces the geometry.
//!
//! Managers never touch render-side state. Every mutation is appended to the
//! caller's [`ChangeSet`](crate::changes::ChangeSet) and reaches the render
//! thread through the change queue.

pub mod features;
mod manager;
mod restyle;
mod scene_rep;
mod shapes;

pub use features::{
    LineCap, LineJoin, MarkerBuilder, MarkerStyle, ScreenMarker, Sticker, StickerBuilder, StickerStyle,
    VectorBuilder, VectorStyle, WideVectorBuilder, WideVectorStyle, WidthCoordType,
};
pub use manager::{BuildContext, FeatureBuilder, SceneManager};
pub use restyle::{StickerChange, VectorChange};
pub use scene_rep::SceneRep;
pub use shapes::VectorShape;
pub(crate) use shapes::validate_all;

use crate::resources::ResourceError;
use thiserror::Error;

/// Scene construction errors
#[derive(Debug, Error)]
pub enum SceneError {
    /// Shape input is empty or degenerate
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Style values are out of range
    #[error("Invalid style: {0}")]
    InvalidStyle(String),

    /// A texture or selection resource could not be obtained
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}
