//! # Interaction Layer
//!
//! The caller-facing facade. Every add returns a [`ComponentObject`] handle
//! immediately; the work behind it runs on the calling thread or on the
//! layer's background worker, as chosen per call with a [`ThreadMode`].
//!
//! ## Ownership
//!
//! Component objects live in a single [`ComponentObjectStore`]. The spatial
//! index refers to them by identifier only and resolves them through the
//! store at query time, so removing an object from the store is enough to
//! make it unselectable, even while its tile entries are being cleaned up.
//!
//! ## Races
//!
//! A remove that overtakes an add still running on the worker wins: the
//! add finds its record gone when it finishes and removes what it built
//! before anything reaches the queue.

mod component_object;
mod layer;
mod thread_mode;

pub use component_object::{ComponentObject, ComponentObjectStore};
pub use layer::{InteractionLayer, SelectedObject};
pub use thread_mode::ThreadMode;

use crate::config::ConfigError;
use crate::foundation::ids::Identifier;
use crate::resources::ResourceError;
use crate::scene::SceneError;
use crate::spatial::SpatialError;
use thiserror::Error;

/// Interaction layer errors
#[derive(Debug, Error)]
pub enum InteractionError {
    /// Draining was attempted off the bound render thread
    #[error("Scene changes may only be applied on the render thread")]
    NotRenderThread,

    /// The background worker has shut down
    #[error("Background worker is not running")]
    WorkerStopped,

    /// The object was removed or never existed
    #[error("Unknown object {0}")]
    UnknownObject(Identifier),

    /// The background worker could not be started
    #[error("Failed to start background worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Scene construction failed
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// A resource could not be obtained or released
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Tile or coordinate system problem
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}
