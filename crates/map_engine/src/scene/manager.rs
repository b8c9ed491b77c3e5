//! Generic scene manager and the feature builder seam

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use image::RgbaImage;

use super::{SceneError, SceneRep};
use crate::changes::{ChangeSet, Drawable, DrawableKind, Primitive, TextureFormat, WrapFlags};
use crate::foundation::ids::{Identifier, IdentifierSet};
use crate::foundation::sync::lock;
use crate::resources::{ResourceRegistry, SelectableObject};

/// Produces drawables for one feature type
pub trait FeatureBuilder: Send + Sync {
    /// One input shape
    type Shape: Clone + Send + Sync + 'static;
    /// Style shared by all shapes of one add
    type Style: Clone + Send + Sync + 'static;

    /// Feature name used in log output
    const NAME: &'static str;

    /// Drawable kind this builder emits
    const KIND: DrawableKind;

    /// Reject structurally invalid input before anything is allocated
    fn validate(&self, shapes: &[Self::Shape], style: &Self::Style) -> Result<(), SceneError>;

    /// Build drawables into `ctx`
    fn build(
        &self,
        shapes: &[Self::Shape],
        style: &Self::Style,
        ctx: &mut BuildContext<'_>,
    ) -> Result<(), SceneError>;
}

/// Scratch state for one build
///
/// Collects the drawables, textures and selection IDs a builder creates so
/// the manager can record them, or undo them if the build fails.
pub struct BuildContext<'a> {
    resources: &'a ResourceRegistry,
    screen_priority_offset: i32,
    drawables: Vec<Drawable>,
    textures: Vec<Identifier>,
    selection_ids: IdentifierSet,
    fade: f32,
}

impl<'a> BuildContext<'a> {
    fn new(resources: &'a ResourceRegistry, screen_priority_offset: i32) -> Self {
        Self {
            resources,
            screen_priority_offset,
            drawables: Vec::new(),
            textures: Vec::new(),
            selection_ids: IdentifierSet::new(),
            fade: 0.0,
        }
    }

    /// A fresh drawable with a newly allocated identifier
    pub fn new_drawable(&self, kind: DrawableKind, primitive: Primitive) -> Drawable {
        Drawable::new(self.resources.ids().next(), kind, primitive)
    }

    /// Keep a finished drawable; empty geometry is dropped
    pub fn push(&mut self, drawable: Drawable) {
        if !drawable.geometry.is_empty() {
            self.drawables.push(drawable);
        }
    }

    /// Acquire a cached texture for `image`, owned by the resulting rep
    pub fn acquire_image(
        &mut self,
        image: &RgbaImage,
        format: TextureFormat,
        wrap: WrapFlags,
    ) -> Result<Identifier, SceneError> {
        let texture = self.resources.acquire_image(image, format, wrap)?.texture;
        self.textures.push(texture);
        Ok(texture)
    }

    /// Register a caller object under `selection_id`
    pub fn register_selectable(&mut self, selection_id: Identifier, object: SelectableObject) {
        self.resources.register_selectable(selection_id, object);
        self.selection_ids.insert(selection_id);
    }

    /// Offset added to the draw priority of screen-space drawables
    pub const fn screen_priority_offset(&self) -> i32 {
        self.screen_priority_offset
    }

    /// Set the fade time recorded on the rep
    pub fn set_fade(&mut self, fade: f32) {
        self.fade = fade;
    }

    /// Release whatever was acquired so far
    fn rollback(self, changes: &mut ChangeSet) {
        for texture in self.textures {
            if let Err(err) = self.resources.release_texture(texture, changes) {
                log::error!("Rollback of texture {texture} failed: {err}");
            }
        }
        self.resources.unregister_selectables(self.selection_ids);
    }
}

/// A live rep and the input it was built from
struct RepEntry<F: FeatureBuilder> {
    rep: SceneRep,
    shapes: Arc<[F::Shape]>,
    style: Arc<F::Style>,
}

/// Tracks the [`SceneRep`]s of one feature type
pub struct SceneManager<F: FeatureBuilder> {
    builder: F,
    resources: Arc<ResourceRegistry>,
    screen_priority_offset: i32,
    reps: Mutex<BTreeMap<Identifier, RepEntry<F>>>,
}

impl<F: FeatureBuilder> std::fmt::Debug for SceneManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneManager")
            .field("feature", &F::NAME)
            .field("reps", &self.len())
            .finish()
    }
}

impl<F: FeatureBuilder> SceneManager<F> {
    /// Create a manager around `builder`
    pub fn new(builder: F, resources: Arc<ResourceRegistry>, screen_priority_offset: i32) -> Self {
        Self {
            builder,
            resources,
            screen_priority_offset,
            reps: Mutex::new(BTreeMap::new()),
        }
    }

    /// Validate input without building anything
    pub fn validate(&self, shapes: &[F::Shape], style: &F::Style) -> Result<(), SceneError> {
        self.builder.validate(shapes, style)
    }

    /// Run the builder, returning an unnumbered rep and its drawables
    ///
    /// Nothing is appended to `changes` unless the build fails and has to
    /// give back what it acquired.
    fn build(
        &self,
        shapes: &[F::Shape],
        style: &F::Style,
        changes: &mut ChangeSet,
    ) -> Result<(SceneRep, Vec<Drawable>), SceneError> {
        self.builder.validate(shapes, style)?;

        let mut ctx = BuildContext::new(&self.resources, self.screen_priority_offset);
        if let Err(err) = self.builder.build(shapes, style, &mut ctx) {
            ctx.rollback(changes);
            return Err(err);
        }

        let mut rep = SceneRep::new(Identifier::EMPTY);
        rep.fade = ctx.fade;
        rep.textures = ctx.textures;
        rep.selection_ids = ctx.selection_ids;
        rep.enabled = ctx.drawables.iter().all(|d| d.enabled);
        rep.drawables = ctx.drawables.iter().map(|d| d.id).collect();
        Ok((rep, ctx.drawables))
    }

    /// Give back the textures and selection IDs a rep holds
    fn release_contents(&self, rep: &SceneRep, changes: &mut ChangeSet) {
        for &texture in &rep.textures {
            if let Err(err) = self.resources.release_texture(texture, changes) {
                log::error!("{} rep {}: {err}", F::NAME, rep.id);
            }
        }
        self.resources.unregister_selectables(rep.selection_ids.iter().copied());
    }

    /// Build `shapes` and queue their creation
    ///
    /// Invalid input is rejected before any identifier, texture or command is
    /// produced. Returns the identifier of the new [`SceneRep`].
    pub fn add(&self, shapes: &[F::Shape], style: &F::Style, changes: &mut ChangeSet) -> Result<Identifier, SceneError> {
        let (mut rep, drawables) = self.build(shapes, style, changes)?;
        rep.id = self.resources.ids().next();
        for drawable in drawables {
            changes.create_drawable(drawable);
        }

        let id = rep.id;
        log::debug!("{} rep {id} added with {} drawables", F::NAME, rep.drawables.len());
        lock(&self.reps).insert(
            id,
            RepEntry {
                rep,
                shapes: shapes.into(),
                style: Arc::new(style.clone()),
            },
        );
        Ok(id)
    }

    /// Rebuild a live rep from changed input, keeping its identifier
    ///
    /// `change` edits a copy of the shapes and style the rep was built from.
    /// The old drawables are removed and the new ones created in `changes`,
    /// so one drain swaps them. The rep keeps its current visibility.
    /// Returns `Ok(false)` when `id` is not live; invalid input leaves the
    /// rep untouched.
    pub fn rebuild(
        &self,
        id: Identifier,
        change: impl FnOnce(&mut Vec<F::Shape>, &mut F::Style),
        changes: &mut ChangeSet,
    ) -> Result<bool, SceneError> {
        let Some((mut shapes, mut style)) = self.source_copy(id) else {
            return Ok(false);
        };
        change(&mut shapes, &mut style);
        let (mut rep, mut drawables) = self.build(&shapes, &style, changes)?;
        rep.id = id;

        let mut reps = lock(&self.reps);
        let Some(entry) = reps.get_mut(&id) else {
            drop(reps);
            log::debug!("{} rep {id} was removed while rebuilding", F::NAME);
            self.release_contents(&rep, changes);
            return Ok(false);
        };
        rep.enabled = entry.rep.enabled;
        for drawable in &mut drawables {
            drawable.enabled = entry.rep.enabled;
        }
        let old = std::mem::replace(
            entry,
            RepEntry {
                rep,
                shapes: shapes.into(),
                style: Arc::new(style),
            },
        );
        drop(reps);

        old.rep.clear_contents(changes);
        for drawable in drawables {
            changes.create_drawable(drawable);
        }
        self.release_contents(&old.rep, changes);
        log::debug!("{} rep {id} rebuilt", F::NAME);
        Ok(true)
    }

    /// Add a new rep from the input of a live one, edited by `change`
    ///
    /// Returns `Ok(None)` when `id` is not live.
    pub fn instance(
        &self,
        id: Identifier,
        change: impl FnOnce(&mut Vec<F::Shape>, &mut F::Style),
        changes: &mut ChangeSet,
    ) -> Result<Option<Identifier>, SceneError> {
        let Some((mut shapes, mut style)) = self.source_copy(id) else {
            return Ok(None);
        };
        change(&mut shapes, &mut style);
        self.add(&shapes, &style, changes).map(Some)
    }

    fn source_copy(&self, id: Identifier) -> Option<(Vec<F::Shape>, F::Style)> {
        let reps = lock(&self.reps);
        let entry = reps.get(&id)?;
        Some((entry.shapes.to_vec(), (*entry.style).clone()))
    }

    /// Shapes and style a live rep was last built from
    pub fn source(&self, id: Identifier) -> Option<(Arc<[F::Shape]>, Arc<F::Style>)> {
        lock(&self.reps)
            .get(&id)
            .map(|entry| (Arc::clone(&entry.shapes), Arc::clone(&entry.style)))
    }

    /// Show or hide the drawables of each live rep in `ids`
    pub fn enable(&self, ids: &[Identifier], enabled: bool, changes: &mut ChangeSet) {
        let mut reps = lock(&self.reps);
        for id in ids {
            if let Some(entry) = reps.get_mut(id) {
                entry.rep.enable_contents(enabled, changes);
            }
        }
    }

    /// Remove each live rep in `ids`; unknown identifiers are ignored
    pub fn remove(&self, ids: &[Identifier], changes: &mut ChangeSet) {
        let removed: Vec<RepEntry<F>> = {
            let mut reps = lock(&self.reps);
            ids.iter().filter_map(|id| reps.remove(id)).collect()
        };

        for entry in removed {
            entry.rep.clear_contents(changes);
            self.release_contents(&entry.rep, changes);
            log::debug!("{} rep {} removed", F::NAME, entry.rep.id);
        }
    }

    /// True when `id` names a live rep
    pub fn contains(&self, id: Identifier) -> bool {
        lock(&self.reps).contains_key(&id)
    }

    /// Drawables of a live rep
    pub fn drawables_of(&self, id: Identifier) -> Option<IdentifierSet> {
        lock(&self.reps).get(&id).map(|entry| entry.rep.drawables.clone())
    }

    /// Identifiers of live reps in ascending order
    pub fn ids(&self) -> Vec<Identifier> {
        lock(&self.reps).keys().copied().collect()
    }

    /// Number of live reps
    pub fn len(&self) -> usize {
        lock(&self.reps).len()
    }

    /// True when no rep is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeCommand, ChangeQueue};
    use crate::core::config::ResourceConfig;
    use crate::foundation::ids::IdentifierAllocator;
    use crate::foundation::math::Point2;

    /// One line drawable per point pair, optionally textured
    struct PairBuilder {
        fail_after_texture: bool,
    }

    impl FeatureBuilder for PairBuilder {
        type Shape = (Point2, Point2);
        type Style = bool;

        const NAME: &'static str = "pairs";
        const KIND: DrawableKind = DrawableKind::Vector;

        fn validate(&self, shapes: &[Self::Shape], _style: &bool) -> Result<(), SceneError> {
            if shapes.is_empty() {
                return Err(SceneError::InvalidGeometry("empty".into()));
            }
            Ok(())
        }

        fn build(&self, shapes: &[Self::Shape], textured: &bool, ctx: &mut BuildContext<'_>) -> Result<(), SceneError> {
            let texture = if *textured {
                let image = RgbaImage::new(1, 1);
                Some(ctx.acquire_image(&image, TextureFormat::Rgba8888, WrapFlags::empty())?)
            } else {
                None
            };
            if self.fail_after_texture {
                return Err(SceneError::InvalidStyle("forced".into()));
            }
            for (a, b) in shapes {
                let mut drawable = ctx.new_drawable(Self::KIND, Primitive::Lines);
                let i = drawable.geometry.push_vertex(*a);
                let j = drawable.geometry.push_vertex(*b);
                drawable.geometry.indices.extend([i, j]);
                drawable.texture = texture;
                ctx.push(drawable);
            }
            Ok(())
        }
    }

    fn manager(fail_after_texture: bool) -> SceneManager<PairBuilder> {
        let resources = ResourceRegistry::new(
            &ResourceConfig::default(),
            Arc::new(IdentifierAllocator::new()),
            Arc::new(ChangeQueue::new()),
        );
        SceneManager::new(PairBuilder { fail_after_texture }, Arc::new(resources), 0)
    }

    fn pairs(n: usize) -> Vec<(Point2, Point2)> {
        (0..n)
            .map(|i| (Point2::new(i as f64, 0.0), Point2::new(i as f64, 1.0)))
            .collect()
    }

    #[test]
    fn test_add_emits_creates() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let id = manager.add(&pairs(3), &false, &mut changes).unwrap();

        assert_eq!(changes.len(), 3);
        assert!(changes
            .commands()
            .iter()
            .all(|c| matches!(c, ChangeCommand::CreateDrawable(_))));
        assert_eq!(manager.drawables_of(id).unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_input_changes_nothing() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let result = manager.add(&[], &false, &mut changes);
        assert!(matches!(result, Err(SceneError::InvalidGeometry(_))));
        assert!(changes.is_empty());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_failed_build_releases_textures() {
        let manager = manager(true);
        let mut changes = ChangeSet::new();
        assert!(manager.add(&pairs(1), &true, &mut changes).is_err());
        assert!(matches!(changes.commands(), [ChangeCommand::ReleaseTexture { .. }]));
        assert_eq!(manager.resources.texture_count(), 0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let id = manager.add(&pairs(2), &true, &mut changes).unwrap();

        let mut first = ChangeSet::new();
        manager.remove(&[id], &mut first);
        let mut second = ChangeSet::new();
        manager.remove(&[id], &mut second);

        // Two drawable removals plus the texture release.
        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
        assert!(!manager.contains(id));
    }

    #[test]
    fn test_enable_skips_unknown_ids() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let id = manager.add(&pairs(1), &false, &mut changes).unwrap();

        let mut toggles = ChangeSet::new();
        manager.enable(&[Identifier::from_raw(999_999), id], false, &mut toggles);
        assert_eq!(toggles.len(), 1);
    }

    #[test]
    fn test_reps_iterate_in_id_order() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let ids: Vec<_> = (0..4)
            .map(|_| manager.add(&pairs(1), &false, &mut changes).unwrap())
            .collect();
        assert_eq!(manager.ids(), ids);
    }

    #[test]
    fn test_rebuild_swaps_drawables_under_the_same_rep() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let id = manager.add(&pairs(2), &false, &mut changes).unwrap();
        let before = manager.drawables_of(id).unwrap();

        let mut rebuild = ChangeSet::new();
        let rebuilt = manager
            .rebuild(id, |shapes, _| shapes.extend(pairs(1)), &mut rebuild)
            .unwrap();
        assert!(rebuilt);

        let commands = rebuild.commands();
        assert_eq!(commands.len(), 5);
        assert!(commands[..2]
            .iter()
            .all(|c| matches!(c, ChangeCommand::RemoveDrawable { .. })));
        assert!(commands[2..]
            .iter()
            .all(|c| matches!(c, ChangeCommand::CreateDrawable(_))));

        let after = manager.drawables_of(id).unwrap();
        assert_eq!(after.len(), 3);
        assert!(after.is_disjoint(&before));
        assert_eq!(manager.source(id).unwrap().0.len(), 3);
    }

    #[test]
    fn test_rebuild_keeps_a_hidden_rep_hidden() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let id = manager.add(&pairs(1), &false, &mut changes).unwrap();
        manager.enable(&[id], false, &mut changes);

        let mut rebuild = ChangeSet::new();
        manager.rebuild(id, |_, _| {}, &mut rebuild).unwrap();
        let created: Vec<_> = rebuild
            .commands()
            .iter()
            .filter_map(|c| match c {
                ChangeCommand::CreateDrawable(drawable) => Some(drawable.enabled),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![false]);
    }

    #[test]
    fn test_rebuild_releases_textures_it_no_longer_uses() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let id = manager.add(&pairs(1), &true, &mut changes).unwrap();

        // Same image again: the cache entry is shared, then handed back once.
        let mut same = ChangeSet::new();
        manager.rebuild(id, |_, _| {}, &mut same).unwrap();
        assert_eq!(manager.resources.texture_count(), 1);
        assert!(!same
            .commands()
            .iter()
            .any(|c| matches!(c, ChangeCommand::ReleaseTexture { .. })));

        let mut plain = ChangeSet::new();
        manager.rebuild(id, |_, textured| *textured = false, &mut plain).unwrap();
        assert_eq!(manager.resources.texture_count(), 0);
        assert!(matches!(plain.commands().last(), Some(ChangeCommand::ReleaseTexture { .. })));
    }

    #[test]
    fn test_invalid_rebuild_leaves_the_rep_alone() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let id = manager.add(&pairs(2), &false, &mut changes).unwrap();
        let before = manager.drawables_of(id).unwrap();

        let mut rebuild = ChangeSet::new();
        let result = manager.rebuild(id, |shapes, _| shapes.clear(), &mut rebuild);
        assert!(matches!(result, Err(SceneError::InvalidGeometry(_))));
        assert!(rebuild.is_empty());
        assert_eq!(manager.drawables_of(id).unwrap(), before);
    }

    #[test]
    fn test_unknown_reps_cannot_be_rebuilt_or_instanced() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let unknown = Identifier::from_raw(999_999);
        assert!(!manager.rebuild(unknown, |_, _| {}, &mut changes).unwrap());
        assert_eq!(manager.instance(unknown, |_, _| {}, &mut changes).unwrap(), None);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_instance_adds_an_independent_rep() {
        let manager = manager(false);
        let mut changes = ChangeSet::new();
        let base = manager.add(&pairs(2), &false, &mut changes).unwrap();

        let copy = manager
            .instance(base, |_, textured| *textured = true, &mut changes)
            .unwrap()
            .unwrap();
        assert_ne!(copy, base);
        assert_eq!(manager.len(), 2);
        assert!(*manager.source(copy).unwrap().1);
        assert!(!*manager.source(base).unwrap().1);

        manager.remove(&[base], &mut changes);
        assert_eq!(manager.drawables_of(copy).unwrap().len(), 2);
    }
}
