//! # Map Engine
//!
//! The concurrency and spatial-selection core of an interactive map renderer.
//!
//! ## Features
//!
//! - **Deferred Scene Mutation**: caller threads describe scene changes as
//!   commands; one render thread applies them once per frame
//! - **Feature Scene Managers**: wide vectors, vectors, screen markers and
//!   stickers turned into drawables
//! - **Shared Resources**: reference-counted texture cache, texture atlas,
//!   selectable-object table and transient context pool
//! - **Tile Selection Index**: "what is near this pixel" answered by visiting
//!   only nearby tiles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use map_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let layer = InteractionLayer::new(EngineConfig::default())?;
//!     layer.bind_render_thread();
//!
//!     let extent = Mbr::new(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0));
//!     let web_mercator = layer.register_coord_system("web mercator", extent);
//!
//!     let road = VectorShape::Linear(vec![Point2::new(1.0, 1.5), Point2::new(3.0, 1.5)]);
//!     let object = layer.add_wide_vectors(vec![road], WideVectorStyle::default(), ThreadMode::Current)?;
//!     layer.add_tile_object(object, TileId::new(1, 0, 0), web_mercator)?;
//!
//!     // Once per frame, on the render thread
//!     let mut scene = RenderScene::new();
//!     let mut draw_list = RecordingDrawList::new();
//!     layer.drain_and_apply(&mut scene, &mut draw_list)?;
//!
//!     let view = ViewState::looking_at(Point2::new(2.0, 2.0), 0.01, Vec2::new(400.0, 400.0))?;
//!     for hit in layer.find_vectors_in_point(Point2::new(150.0, 250.0), &view, true) {
//!         println!("selected {}", hit.object.id());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;

pub mod changes;
pub mod interaction;
pub mod resources;
pub mod scene;
pub mod spatial;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        changes::{
            ApplyStats, ChangeCommand, ChangeQueue, ChangeSet, DrainTicket, DrawListBuilder, DrawListEvent,
            RecordingDrawList, RenderScene, TextureFormat, WrapFlags,
        },
        config::Config,
        core::config::{EngineConfig, InteractionConfig, ResourceConfig, SelectionConfig},
        foundation::{
            ids::Identifier,
            math::{Mbr, Point2, Vec2},
        },
        interaction::{ComponentObject, InteractionError, InteractionLayer, SelectedObject, ThreadMode},
        resources::{ResourceError, SelectableObject},
        scene::{
            LineCap, LineJoin, MarkerStyle, SceneError, ScreenMarker, Sticker, StickerChange, StickerStyle,
            VectorChange, VectorShape, VectorStyle, WideVectorStyle, WidthCoordType,
        },
        spatial::{CoordSystemId, LineWidth, SpatialError, TileId, TileSortKey, ViewState},
    };
}
