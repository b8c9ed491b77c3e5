//! Render-thread side of the change protocol
//!
//! [`RenderScene`] owns every GPU-visible drawable. It is mutated only by
//! drained [`ChangeCommand`]s and forwards what survives to a
//! [`DrawListBuilder`], the boundary to the actual GPU backend.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::command::{ChangeCommand, Drawable, TextureRegion, TextureUpload};
use super::queue::ChangeQueue;
use crate::foundation::ids::Identifier;

/// Consumer of applied scene mutations (GPU draw-list construction)
pub trait DrawListBuilder {
    /// A drawable became part of the scene
    fn add_drawable(&mut self, drawable: &Drawable);

    /// A drawable left the scene
    fn remove_drawable(&mut self, id: Identifier);

    /// A drawable's visibility changed
    fn set_enabled(&mut self, id: Identifier, enabled: bool);

    /// A texture must be created
    fn upload_texture(&mut self, upload: &TextureUpload);

    /// Part of a texture must be overwritten
    fn update_sub_texture(&mut self, texture: Identifier, region: &TextureRegion, pixels: &[u8]);

    /// A texture must be destroyed
    fn release_texture(&mut self, id: Identifier);
}

/// Counters for one applied batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Drawables handed to the builder
    pub created: usize,
    /// Drawables removed from the builder
    pub removed: usize,
    /// Creates dropped because a removal overtook them
    pub cancelled: usize,
    /// Visibility changes forwarded
    pub enabled_changes: usize,
    /// Textures created
    pub textures_uploaded: usize,
    /// Textures destroyed
    pub textures_released: usize,
    /// Visibility changes held until their drawable is created
    pub deferred: usize,
    /// Pending entries dropped because their create never arrived
    pub expired: usize,
    /// Commands whose target was unknown (tolerated)
    pub skipped: usize,
}

/// Batches a pending entry survives before it is dropped as stale
pub const DEFAULT_PENDING_LIFETIME: u64 = 1024;

/// Commands that reached the scene before the drawable they target
#[derive(Debug, Clone, Copy)]
struct Pending {
    removed: bool,
    enabled: Option<bool>,
    since: u64,
}

/// Render-side scene state
#[derive(Debug)]
pub struct RenderScene {
    drawables: BTreeMap<Identifier, Drawable>,
    textures: BTreeSet<Identifier>,
    /// Drawables removed or toggled before their create arrived
    pending: HashMap<Identifier, Pending>,
    batches: u64,
    pending_lifetime: u64,
}

impl Default for RenderScene {
    fn default() -> Self {
        Self {
            drawables: BTreeMap::new(),
            textures: BTreeSet::new(),
            pending: HashMap::new(),
            batches: 0,
            pending_lifetime: DEFAULT_PENDING_LIFETIME,
        }
    }
}

impl RenderScene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop pending removals and visibility changes after `batches` applied
    /// batches without the matching create
    pub fn with_pending_lifetime(mut self, batches: u64) -> Self {
        self.pending_lifetime = batches;
        self
    }

    fn pending_entry(&mut self, id: Identifier) -> &mut Pending {
        let since = self.batches;
        self.pending.entry(id).or_insert(Pending {
            removed: false,
            enabled: None,
            since,
        })
    }

    /// Drain `queue` and apply the batch. Render thread only.
    pub fn drain(&mut self, queue: &ChangeQueue, builder: &mut dyn DrawListBuilder) -> ApplyStats {
        queue.drain_with(|commands| self.apply(commands, builder))
    }

    /// Apply one drained batch in order
    ///
    /// A create followed later in the same batch by a removal of the same
    /// drawable is dropped without reaching the builder, as is a create whose
    /// removal arrived in an earlier batch. A visibility change that arrives
    /// ahead of its create is applied when the create lands.
    pub fn apply(&mut self, commands: Vec<ChangeCommand>, builder: &mut dyn DrawListBuilder) -> ApplyStats {
        let mut stats = ApplyStats::default();

        let mut last_removal: HashMap<Identifier, usize> = HashMap::new();
        for (index, command) in commands.iter().enumerate() {
            if let ChangeCommand::RemoveDrawable { id } = command {
                last_removal.insert(*id, index);
            }
        }
        let mut overtaken: HashSet<Identifier> = HashSet::new();

        for (index, command) in commands.into_iter().enumerate() {
            match command {
                ChangeCommand::CreateDrawable(mut drawable) => {
                    let id = drawable.id;
                    let pending = self.pending.remove(&id);
                    if pending.is_some_and(|p| p.removed) {
                        log::debug!("Dropping drawable {id}: removed before it was created");
                        stats.cancelled += 1;
                    } else if last_removal.get(&id).is_some_and(|&at| at > index) {
                        overtaken.insert(id);
                        stats.cancelled += 1;
                    } else {
                        if let Some(enabled) = pending.and_then(|p| p.enabled) {
                            drawable.enabled = enabled;
                        }
                        builder.add_drawable(&drawable);
                        self.drawables.insert(id, *drawable);
                        stats.created += 1;
                    }
                }
                ChangeCommand::RemoveDrawable { id } => {
                    if self.drawables.remove(&id).is_some() {
                        builder.remove_drawable(id);
                        stats.removed += 1;
                    } else if !overtaken.remove(&id) {
                        self.pending_entry(id).removed = true;
                    }
                }
                ChangeCommand::SetEnable { id, enabled } => {
                    if let Some(drawable) = self.drawables.get_mut(&id) {
                        drawable.enabled = enabled;
                        builder.set_enabled(id, enabled);
                        stats.enabled_changes += 1;
                    } else if overtaken.contains(&id) {
                        stats.skipped += 1;
                    } else {
                        self.pending_entry(id).enabled = Some(enabled);
                        stats.deferred += 1;
                    }
                }
                ChangeCommand::UploadTexture(upload) => {
                    if self.textures.insert(upload.id) {
                        builder.upload_texture(&upload);
                        stats.textures_uploaded += 1;
                    } else {
                        log::warn!("Texture {} uploaded twice; ignoring", upload.id);
                        stats.skipped += 1;
                    }
                }
                ChangeCommand::UpdateSubTexture {
                    texture,
                    region,
                    pixels,
                } => {
                    if self.textures.contains(&texture) {
                        builder.update_sub_texture(texture, &region, &pixels);
                    } else {
                        log::warn!("Sub-texture update for unknown texture {texture}");
                        stats.skipped += 1;
                    }
                }
                ChangeCommand::ReleaseTexture { id } => {
                    if self.textures.remove(&id) {
                        builder.release_texture(id);
                        stats.textures_released += 1;
                    } else {
                        log::warn!("Release of unknown texture {id}");
                        stats.skipped += 1;
                    }
                }
            }
        }

        self.batches += 1;
        stats.expired = self.expire_pending();

        if stats != ApplyStats::default() {
            log::trace!("Applied scene changes: {stats:?}");
        }
        stats
    }

    fn expire_pending(&mut self) -> usize {
        let (now, lifetime) = (self.batches, self.pending_lifetime);
        let before = self.pending.len();
        self.pending.retain(|id, pending| {
            let live = now - pending.since <= lifetime;
            if !live {
                log::warn!("Drawable {id} was never created; dropping its pending commands");
            }
            live
        });
        before - self.pending.len()
    }

    /// Number of drawables with commands waiting for their create
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Look up a live drawable
    pub fn drawable(&self, id: Identifier) -> Option<&Drawable> {
        self.drawables.get(&id)
    }

    /// Live drawables in identifier order
    pub fn drawables(&self) -> impl Iterator<Item = &Drawable> {
        self.drawables.values()
    }

    /// Number of live drawables
    pub fn drawable_count(&self) -> usize {
        self.drawables.len()
    }

    /// True when the texture exists on the render side
    pub fn has_texture(&self, id: Identifier) -> bool {
        self.textures.contains(&id)
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

/// One call received by a [`RecordingDrawList`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawListEvent {
    /// `add_drawable`
    Added(Identifier),
    /// `remove_drawable`
    Removed(Identifier),
    /// `set_enabled`
    Enabled(Identifier, bool),
    /// `upload_texture`
    TextureUploaded(Identifier),
    /// `update_sub_texture`
    TextureUpdated(Identifier, TextureRegion),
    /// `release_texture`
    TextureReleased(Identifier),
}

/// Draw-list builder that only records what it was told
///
/// Used by headless tools and tests.
#[derive(Debug, Default)]
pub struct RecordingDrawList {
    /// Calls in arrival order
    pub events: Vec<DrawListEvent>,
}

impl RecordingDrawList {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the drawable was ever handed to `add_drawable`
    pub fn ever_added(&self, id: Identifier) -> bool {
        self.events.contains(&DrawListEvent::Added(id))
    }

    /// Number of textures uploaded so far
    pub fn uploads(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DrawListEvent::TextureUploaded(_)))
            .count()
    }
}

impl DrawListBuilder for RecordingDrawList {
    fn add_drawable(&mut self, drawable: &Drawable) {
        self.events.push(DrawListEvent::Added(drawable.id));
    }

    fn remove_drawable(&mut self, id: Identifier) {
        self.events.push(DrawListEvent::Removed(id));
    }

    fn set_enabled(&mut self, id: Identifier, enabled: bool) {
        self.events.push(DrawListEvent::Enabled(id, enabled));
    }

    fn upload_texture(&mut self, upload: &TextureUpload) {
        self.events.push(DrawListEvent::TextureUploaded(upload.id));
    }

    fn update_sub_texture(&mut self, texture: Identifier, region: &TextureRegion, _pixels: &[u8]) {
        self.events.push(DrawListEvent::TextureUpdated(texture, *region));
    }

    fn release_texture(&mut self, id: Identifier) {
        self.events.push(DrawListEvent::TextureReleased(id));
    }
}
