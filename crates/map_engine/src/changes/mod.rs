//! # Deferred Scene Mutation
//!
//! Producer threads never touch render-side state. They describe what should
//! change as [`ChangeCommand`]s, collect them in a [`ChangeSet`] and hand the
//! set to the [`ChangeQueue`]. Once per frame the render thread drains the
//! queue into its [`RenderScene`], which forwards the surviving mutations to
//! the external [`DrawListBuilder`].
//!
//! ```text
//! caller threads ──▶ ChangeSet ──▶ ChangeQueue ──(drain, render thread)──▶ RenderScene ──▶ DrawListBuilder
//! ```

mod command;
mod queue;
mod render_scene;

pub use command::{
    ChangeCommand, ChangeSet, Drawable, DrawableFlags, DrawableKind, Geometry, Primitive,
    TextureFormat, TextureRegion, TextureUpload, WrapFlags,
};
pub use queue::{ChangeQueue, DrainTicket};
pub use render_scene::{
    ApplyStats, DrawListBuilder, DrawListEvent, RecordingDrawList, RenderScene, DEFAULT_PENDING_LIFETIME,
};
