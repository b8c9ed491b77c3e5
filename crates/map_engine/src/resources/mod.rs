//! # Shared Resources
//!
//! State that caller threads mutate directly, outside the change queue:
//!
//! - [`SelectableTable`]: selection ID → caller object
//! - [`TextureCache`]: content-keyed, reference-counted textures
//! - [`TextureAtlasGroup`]: small images packed into shared pages
//! - [`ContextPool`]: transient rendering contexts for worker threads
//!
//! Each category has its own lock so they are contended independently. No
//! lock here is held across GPU work or a queue drain; anything the render
//! thread must do is expressed as a change command.

mod atlas;
mod contexts;
mod registry;
mod selectables;
mod textures;

pub use atlas::{SubTexture, TextureAtlasGroup};
pub use contexts::{ContextPool, TransientContext};
pub use registry::ResourceRegistry;
pub use selectables::{SelectableObject, SelectableTable};
pub use textures::{AcquiredTexture, TextureCache, TextureKey};

use crate::foundation::ids::Identifier;
use thiserror::Error;

/// Resource errors
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A texture was released more often than it was acquired
    #[error("Texture {0} released more times than acquired")]
    TextureOverRelease(Identifier),

    /// Building upload parameters failed
    #[error("Texture creation failed: {0}")]
    TextureCreation(String),

    /// Every transient context is borrowed
    #[error("Transient context pool exhausted ({max} contexts in use)")]
    ContextPoolExhausted {
        /// Pool limit
        max: usize,
    },

    /// A context was returned that the pool never lent out
    #[error("Context {0} is not borrowed from this pool")]
    UnknownContext(Identifier),

    /// Image does not fit on an atlas page
    #[error("Image {width}x{height} does not fit an atlas page of {page_size}")]
    AtlasImageTooLarge {
        /// Image width
        width: u32,
        /// Image height
        height: u32,
        /// Page edge length
        page_size: u32,
    },

    /// Sub-texture is not (or no longer) in the atlas
    #[error("Sub-texture {0} is not in the atlas")]
    UnknownSubTexture(Identifier),
}
