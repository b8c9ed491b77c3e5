//! # Spatial Selection
//!
//! Answers "what is near this screen point" without scanning every object.
//! Selectable objects are registered against the map tiles they cover; a
//! query only visits tiles whose projected rectangle is close enough to the
//! point and asks each contributing object to hit-test itself.
//!
//! The index stores object identifiers only. Objects are resolved through an
//! [`ObjectResolver`] at query time, so an object removed by another thread
//! simply stops resolving.

mod coord_system;
mod selection_index;
mod tile;
mod view_state;

pub use coord_system::{CoordSystemId, CoordSystemRegistry};
pub use hit_test::{
    Hit, HitContext, HitTest, LineWidth, MarkerHitShape, ObjectResolver, StickerHitShape, VectorHitShape,
};
pub use selection_index::{SelectionIter, SelectionMatch, SelectionQuery, SpatialSelectionIndex, TileSortData};
pub use tile::{TileId, TileSortKey};
pub use view_state::ViewState;

use thiserror::Error;

/// Spatial index errors
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The coordinate system was never registered
    #[error("Unknown coordinate system {0:?}")]
    UnknownCoordSystem(CoordSystemId),

    /// Tile coordinates lie outside the level's grid
    #[error("Tile {0:?} is outside its level")]
    TileOutOfRange(TileId),

    /// The view transform cannot be inverted
    #[error("View transform is singular")]
    SingularView,
}
