//! The interaction facade and its background worker

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use image::RgbaImage;

use super::component_object::{ComponentObject, ComponentObjectStore};
use super::thread_mode::ThreadMode;
use super::InteractionError;
use crate::changes::{
    ApplyStats, ChangeQueue, ChangeSet, DrainTicket, DrawListBuilder, DrawableKind, RenderScene, TextureFormat,
    WrapFlags,
};
use crate::core::config::EngineConfig;
use crate::foundation::ids::{Identifier, IdentifierAllocator};
use crate::foundation::math::{Mbr, Point2};
use crate::foundation::sync::lock;
use crate::resources::{ResourceRegistry, SelectableObject, SubTexture, TransientContext};
use crate::scene::{
    validate_all, FeatureBuilder, MarkerBuilder, MarkerStyle, SceneError, SceneManager, ScreenMarker, Sticker,
    StickerBuilder, StickerChange, StickerStyle, VectorBuilder, VectorChange, VectorShape, VectorStyle,
    WideVectorBuilder, WideVectorStyle, WidthCoordType,
};
use crate::spatial::{
    CoordSystemId, CoordSystemRegistry, HitTest, LineWidth, MarkerHitShape, SelectionMatch, SpatialSelectionIndex,
    StickerHitShape, TileId, TileSortKey, VectorHitShape, ViewState,
};

/// One object found by a selection query
#[derive(Debug, Clone)]
pub struct SelectedObject {
    /// The object hit
    pub object: ComponentObject,
    /// Tile the object was found through
    pub tile: TileSortKey,
    /// Distance from the query point in pixels
    pub distance: f64,
    /// Selection ID of the sub-object hit, if any
    pub selection_id: Option<Identifier>,
    /// Caller object registered under `selection_id`, if still registered
    pub user_object: Option<SelectableObject>,
}

/// Feature builders the layer keeps a manager for
trait LayerFeature: FeatureBuilder + Sized + 'static {
    fn manager(shared: &LayerShared) -> &SceneManager<Self>;
}

impl LayerFeature for WideVectorBuilder {
    fn manager(shared: &LayerShared) -> &SceneManager<Self> {
        &shared.wide_vectors
    }
}

impl LayerFeature for VectorBuilder {
    fn manager(shared: &LayerShared) -> &SceneManager<Self> {
        &shared.vectors
    }
}

impl LayerFeature for MarkerBuilder {
    fn manager(shared: &LayerShared) -> &SceneManager<Self> {
        &shared.markers
    }
}

impl LayerFeature for StickerBuilder {
    fn manager(shared: &LayerShared) -> &SceneManager<Self> {
        &shared.stickers
    }
}

/// State shared between the caller threads and the worker
struct LayerShared {
    config: EngineConfig,
    queue: Arc<ChangeQueue>,
    resources: Arc<ResourceRegistry>,
    wide_vectors: SceneManager<WideVectorBuilder>,
    vectors: SceneManager<VectorBuilder>,
    markers: SceneManager<MarkerBuilder>,
    stickers: SceneManager<StickerBuilder>,
    objects: ComponentObjectStore,
    coord_systems: Arc<CoordSystemRegistry>,
    selection: SpatialSelectionIndex,
    /// Open `start_changes` batches per thread
    batches: Mutex<HashMap<ThreadId, ChangeSet>>,
    render_thread: Mutex<Option<ThreadId>>,
}

impl LayerShared {
    fn new(config: EngineConfig) -> Self {
        let ids = IdentifierAllocator::global();
        let queue = Arc::new(ChangeQueue::new());
        let resources = Arc::new(ResourceRegistry::new(
            &config.resources,
            Arc::clone(&ids),
            Arc::clone(&queue),
        ));
        let offset = config.interaction.screen_draw_priority_offset;
        let coord_systems = Arc::new(CoordSystemRegistry::new());

        Self {
            wide_vectors: SceneManager::new(WideVectorBuilder, Arc::clone(&resources), offset),
            vectors: SceneManager::new(VectorBuilder, Arc::clone(&resources), offset),
            markers: SceneManager::new(MarkerBuilder, Arc::clone(&resources), offset),
            stickers: SceneManager::new(StickerBuilder, Arc::clone(&resources), offset),
            objects: ComponentObjectStore::new(ids),
            selection: SpatialSelectionIndex::new(Arc::clone(&coord_systems)),
            coord_systems,
            batches: Mutex::new(HashMap::new()),
            render_thread: Mutex::new(None),
            config,
            queue,
            resources,
        }
    }

    fn is_render_thread(&self) -> bool {
        *lock(&self.render_thread) == Some(thread::current().id())
    }

    /// Build the scene rep of an object that is already in the store
    fn build<F: LayerFeature>(
        &self,
        object: ComponentObject,
        shapes: &[F::Shape],
        style: &F::Style,
        mode: ThreadMode,
    ) -> Result<(), InteractionError> {
        let manager = F::manager(self);
        let mut changes = ChangeSet::new();

        let rep = match manager.add(shapes, style, &mut changes) {
            Ok(rep) => rep,
            Err(err) => {
                self.objects.take(object.id());
                self.flush(changes, ThreadMode::Any);
                return Err(err.into());
            }
        };

        match self.objects.attach_rep(object.id(), F::KIND, rep) {
            Some(true) => {}
            Some(false) => manager.enable(&[rep], false, &mut changes),
            None => {
                log::debug!("{} object {} was removed while building", F::NAME, object.id());
                manager.remove(&[rep], &mut changes);
            }
        }
        self.flush(changes, mode);
        Ok(())
    }

    fn remove_objects(&self, objects: &[ComponentObject], mode: ThreadMode) {
        let mut changes = ChangeSet::new();
        for object in objects {
            let Some(record) = self.objects.take(object.id()) else {
                continue;
            };
            for (kind, reps) in by_kind(&record.reps) {
                self.remove_reps(kind, &reps, &mut changes);
            }
            for key in &record.tiles {
                self.selection.remove_from_tile(record.id, *key);
            }
            log::debug!("Removed object {}", record.id);
        }
        self.flush(changes, mode);
    }

    fn set_enabled(&self, objects: &[ComponentObject], enabled: bool, mode: ThreadMode) {
        let mut changes = ChangeSet::new();
        for object in objects {
            self.enable_object(*object, enabled, &mut changes);
        }
        self.flush(changes, mode);
    }

    fn enable_object(&self, object: ComponentObject, enabled: bool, changes: &mut ChangeSet) {
        if let Some(reps) = self.objects.set_enabled(object.id(), enabled) {
            for (kind, reps) in by_kind(&reps) {
                self.enable_reps(kind, &reps, enabled, changes);
            }
        }
    }

    /// Rebuild the reps of a live object through `rebuild`, then apply `enable`
    ///
    /// Reps rebuilt before a failure stay rebuilt. A removed object is left
    /// alone.
    fn change_object(
        &self,
        object: ComponentObject,
        enable: Option<bool>,
        mode: ThreadMode,
        mut rebuild: impl FnMut(DrawableKind, Identifier, &mut ChangeSet) -> Result<bool, SceneError>,
    ) -> Result<(), InteractionError> {
        let Some(reps) = self.objects.reps_of(object) else {
            log::debug!("Object {} is gone; change skipped", object.id());
            return Ok(());
        };

        let mut changes = ChangeSet::new();
        let mut result = Ok(());
        for (kind, rep) in reps {
            if let Err(err) = rebuild(kind, rep, &mut changes) {
                result = Err(err.into());
                break;
            }
        }
        if result.is_ok() {
            if let Some(enabled) = enable {
                self.enable_object(object, enabled, &mut changes);
            }
        }
        self.flush(changes, mode);
        result
    }

    fn change_vectors(
        &self,
        object: ComponentObject,
        change: &VectorChange,
        mode: ThreadMode,
    ) -> Result<(), InteractionError> {
        let rebuild = change.needs_rebuild();
        self.change_object(object, change.enable, mode, |kind, rep, changes| match kind {
            DrawableKind::Vector if rebuild => {
                self.vectors
                    .rebuild(rep, |_, style| change.apply_to_vector(style), changes)
            }
            DrawableKind::WideVector if rebuild => {
                self.wide_vectors
                    .rebuild(rep, |_, style| change.apply_to_wide_vector(style), changes)
            }
            _ => Ok(false),
        })?;
        if change.width.is_some() {
            self.refresh_vector_hit_shape(object);
        }
        Ok(())
    }

    fn change_stickers(
        &self,
        object: ComponentObject,
        change: &StickerChange,
        mode: ThreadMode,
    ) -> Result<(), InteractionError> {
        let rebuild = change.needs_rebuild();
        self.change_object(object, change.enable, mode, |kind, rep, changes| match kind {
            DrawableKind::Sticker if rebuild => {
                self.stickers
                    .rebuild(rep, |stickers, style| change.apply(stickers, style), changes)
            }
            _ => Ok(false),
        })
    }

    /// Give `object` copies of the vector reps of `base`
    fn instance_vectors(
        &self,
        base: ComponentObject,
        object: ComponentObject,
        change: &VectorChange,
        mode: ThreadMode,
    ) -> Result<(), InteractionError> {
        let Some(reps) = self.objects.reps_of(base) else {
            self.objects.take(object.id());
            return Err(InteractionError::UnknownObject(base.id()));
        };

        let mut changes = ChangeSet::new();
        let mut copies = Vec::new();
        for (kind, rep) in reps {
            let copied = match kind {
                DrawableKind::Vector => {
                    self.vectors
                        .instance(rep, |_, style| change.apply_to_vector(style), &mut changes)
                }
                DrawableKind::WideVector => {
                    self.wide_vectors
                        .instance(rep, |_, style| change.apply_to_wide_vector(style), &mut changes)
                }
                DrawableKind::ScreenMarker | DrawableKind::Sticker => continue,
            };
            match copied {
                Ok(Some(copy)) => copies.push((kind, copy)),
                Ok(None) => {}
                Err(err) => {
                    self.objects.take(object.id());
                    for (kind, reps) in by_kind(&copies) {
                        self.remove_reps(kind, &reps, &mut changes);
                    }
                    self.flush(changes, ThreadMode::Any);
                    return Err(err.into());
                }
            }
        }
        if copies.is_empty() {
            log::warn!("Object {} has no vectors to instance", base.id());
        }

        for (kind, copy) in copies {
            match self.objects.attach_rep(object.id(), kind, copy) {
                Some(true) => {}
                Some(false) => self.enable_reps(kind, &[copy], false, &mut changes),
                None => self.remove_reps(kind, &[copy], &mut changes),
            }
        }
        if let Some(enabled) = change.enable {
            self.enable_object(object, enabled, &mut changes);
        }
        self.refresh_vector_hit_shape(object);
        self.flush(changes, mode);

        for key in self.objects.tiles_of(base).unwrap_or_default() {
            self.objects
                .attach_tile(object.id(), || self.selection.add_to_tile(object.id(), key.tile, key.coord_sys))?;
        }
        log::debug!("Object {} instanced from {}", object.id(), base.id());
        Ok(())
    }

    /// Rebuild the hit shape of an object from the source of its first vector rep
    fn refresh_vector_hit_shape(&self, object: ComponentObject) {
        let Some(reps) = self.objects.reps_of(object) else {
            return;
        };
        let shape = reps.iter().find_map(|&(kind, rep)| match kind {
            DrawableKind::WideVector => self
                .wide_vectors
                .source(rep)
                .map(|(shapes, style)| wide_vector_hit_shape(&shapes, &style)),
            DrawableKind::Vector => self
                .vectors
                .source(rep)
                .map(|(shapes, style)| vector_hit_shape(&shapes, &style)),
            DrawableKind::ScreenMarker | DrawableKind::Sticker => None,
        });
        if let Some(shape) = shape {
            self.objects.set_hit_shape(object.id(), shape);
        }
    }

    fn remove_textures(&self, textures: &[Identifier], mode: ThreadMode) -> Result<(), InteractionError> {
        let mut changes = ChangeSet::new();
        let mut first_error = None;
        for &texture in textures {
            let result = if self.resources.atlas_contains(texture) {
                self.resources.remove_from_atlas(texture, &mut changes)
            } else {
                self.resources.release_texture(texture, &mut changes)
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        self.flush(changes, mode);
        first_error.map_or(Ok(()), |err| Err(err.into()))
    }

    fn remove_reps(&self, kind: DrawableKind, reps: &[Identifier], changes: &mut ChangeSet) {
        match kind {
            DrawableKind::WideVector => self.wide_vectors.remove(reps, changes),
            DrawableKind::Vector => self.vectors.remove(reps, changes),
            DrawableKind::ScreenMarker => self.markers.remove(reps, changes),
            DrawableKind::Sticker => self.stickers.remove(reps, changes),
        }
    }

    fn enable_reps(&self, kind: DrawableKind, reps: &[Identifier], enabled: bool, changes: &mut ChangeSet) {
        match kind {
            DrawableKind::WideVector => self.wide_vectors.enable(reps, enabled, changes),
            DrawableKind::Vector => self.vectors.enable(reps, enabled, changes),
            DrawableKind::ScreenMarker => self.markers.enable(reps, enabled, changes),
            DrawableKind::Sticker => self.stickers.enable(reps, enabled, changes),
        }
    }

    /// Hand `changes` to the open batch of this thread, or to the queue
    fn flush(&self, mut changes: ChangeSet, mode: ThreadMode) {
        if changes.is_empty() {
            return;
        }
        if let Some(batch) = lock(&self.batches).get_mut(&thread::current().id()) {
            batch.append(&mut changes);
            return;
        }
        let ticket = self.queue.enqueue_all(changes);
        if mode == ThreadMode::CurrentWaitApplied {
            self.wait_applied(ticket);
        }
    }

    fn wait_applied(&self, ticket: DrainTicket) -> bool {
        if self.is_render_thread() {
            log::warn!(
                "Not waiting for drain cycle {} on the render thread; it only advances between frames",
                ticket.cycle()
            );
            return false;
        }
        let applied = self.queue.wait_for(ticket, self.config.interaction.apply_wait_timeout());
        if !applied {
            log::warn!("Timed out waiting for drain cycle {}", ticket.cycle());
        }
        applied
    }

    fn selected(&self, found: SelectionMatch) -> SelectedObject {
        SelectedObject {
            object: ComponentObject::from_id(found.object),
            tile: found.tile,
            distance: found.hit.distance,
            selection_id: found.hit.selection_id,
            user_object: found
                .hit
                .selection_id
                .and_then(|id| self.resources.lookup_selectable(id)),
        }
    }
}

fn wide_vector_hit_shape(shapes: &[VectorShape], style: &WideVectorStyle) -> Arc<dyn HitTest> {
    let width = match style.coord_type {
        WidthCoordType::Screen => LineWidth::Screen(style.width),
        WidthCoordType::Real => LineWidth::Local(style.width),
    };
    Arc::new(VectorHitShape::new(shapes.to_vec(), width))
}

fn vector_hit_shape(shapes: &[VectorShape], style: &VectorStyle) -> Arc<dyn HitTest> {
    Arc::new(VectorHitShape::new(
        shapes.to_vec(),
        LineWidth::Screen(f64::from(style.line_width)),
    ))
}

/// Group scene reps by the manager that owns them
fn by_kind(reps: &[(DrawableKind, Identifier)]) -> BTreeMap<DrawableKind, Vec<Identifier>> {
    let mut grouped: BTreeMap<DrawableKind, Vec<Identifier>> = BTreeMap::new();
    for &(kind, rep) in reps {
        grouped.entry(kind).or_default().push(rep);
    }
    grouped
}

type Job = Box<dyn FnOnce(&LayerShared) + Send + 'static>;

/// Single background thread running [`ThreadMode::Any`] work in order
struct LayerWorker {
    sender: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl LayerWorker {
    fn spawn(name: &str, shared: Arc<LayerShared>) -> Result<Self, InteractionError> {
        let (sender, receiver) = unbounded::<Job>();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || Self::run(&shared, &receiver))
            .map_err(InteractionError::WorkerSpawn)?;

        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    fn run(shared: &LayerShared, receiver: &Receiver<Job>) {
        while let Ok(job) = receiver.recv() {
            job(shared);
        }
        log::debug!("Layer worker stopped");
    }

    fn execute(&self, job: Job) -> Result<(), InteractionError> {
        self.sender
            .as_ref()
            .ok_or(InteractionError::WorkerStopped)?
            .send(job)
            .map_err(|_| InteractionError::WorkerStopped)
    }
}

impl Drop for LayerWorker {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Layer worker panicked");
            }
        }
    }
}

/// Thread-safe entry point for adding, removing and selecting map objects
///
/// Any number of threads may call into the layer. Exactly one thread, bound
/// with [`InteractionLayer::bind_render_thread`], applies the resulting scene
/// changes once per frame through [`InteractionLayer::drain_and_apply`].
pub struct InteractionLayer {
    shared: Arc<LayerShared>,
    worker: LayerWorker,
}

impl std::fmt::Debug for InteractionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionLayer")
            .field("objects", &self.shared.objects.len())
            .field("pending_commands", &self.shared.queue.pending_len())
            .field("tiles", &self.shared.selection.len())
            .finish_non_exhaustive()
    }
}

impl InteractionLayer {
    /// Create a layer and start its background worker
    pub fn new(config: EngineConfig) -> Result<Self, InteractionError> {
        config.validate()?;
        let worker_name = config.interaction.worker_thread_name.clone();
        let shared = Arc::new(LayerShared::new(config));
        let worker = LayerWorker::spawn(&worker_name, Arc::clone(&shared))?;
        log::debug!("Interaction layer started");
        Ok(Self { shared, worker })
    }

    /// Configuration the layer runs with
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// The change queue drained by the render thread
    pub fn queue(&self) -> &Arc<ChangeQueue> {
        &self.shared.queue
    }

    /// Shared textures, selectables and contexts
    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.shared.resources
    }

    /// Live component objects
    pub fn objects(&self) -> &ComponentObjectStore {
        &self.shared.objects
    }

    /// Tile index of selectable objects
    pub fn selection(&self) -> &SpatialSelectionIndex {
        &self.shared.selection
    }

    /// Known coordinate systems
    pub fn coord_systems(&self) -> &Arc<CoordSystemRegistry> {
        &self.shared.coord_systems
    }

    fn run(
        &self,
        mode: ThreadMode,
        job: impl FnOnce(&LayerShared) -> Result<(), InteractionError> + Send + 'static,
    ) -> Result<(), InteractionError> {
        if mode.is_synchronous() {
            return job(&self.shared);
        }
        self.worker.execute(Box::new(move |shared| {
            if let Err(err) = job(shared) {
                log::error!("Background layer job failed: {err}");
            }
        }))
    }

    fn add_feature<F: LayerFeature>(
        &self,
        shapes: Vec<F::Shape>,
        style: F::Style,
        hit_shape: Arc<dyn HitTest>,
        selectable: bool,
        mode: ThreadMode,
    ) -> Result<ComponentObject, InteractionError> {
        F::manager(&self.shared).validate(&shapes, &style)?;

        let object = self.shared.objects.insert(Some(hit_shape), selectable);
        let built = self.run(mode, move |shared| shared.build::<F>(object, &shapes, &style, mode));
        if let Err(err) = built {
            self.shared.objects.take(object.id());
            return Err(err);
        }
        Ok(object)
    }

    /// Add widened lines
    pub fn add_wide_vectors(
        &self,
        shapes: Vec<VectorShape>,
        style: WideVectorStyle,
        mode: ThreadMode,
    ) -> Result<ComponentObject, InteractionError> {
        let hit = wide_vector_hit_shape(&shapes, &style);
        let selectable = style.selectable;
        self.add_feature::<WideVectorBuilder>(shapes, style, hit, selectable, mode)
    }

    /// Add hairline vectors
    pub fn add_vectors(
        &self,
        shapes: Vec<VectorShape>,
        style: VectorStyle,
        mode: ThreadMode,
    ) -> Result<ComponentObject, InteractionError> {
        let hit = vector_hit_shape(&shapes, &style);
        let selectable = style.selectable;
        self.add_feature::<VectorBuilder>(shapes, style, hit, selectable, mode)
    }

    /// Add vectors that are only hit-tested, never drawn
    pub fn add_selection_vectors(
        &self,
        shapes: Vec<VectorShape>,
        width: LineWidth,
    ) -> Result<ComponentObject, InteractionError> {
        validate_all(&shapes)?;
        let (LineWidth::Screen(w) | LineWidth::Local(w)) = width;
        if !(w.is_finite() && w >= 0.0) {
            return Err(SceneError::InvalidStyle(format!("selection width must be non-negative, got {w}")).into());
        }
        let hit = Arc::new(VectorHitShape::new(shapes, width));
        Ok(self.shared.objects.insert(Some(hit), true))
    }

    /// Add screen markers
    ///
    /// Markers carrying a user object without a selection ID get one
    /// assigned, so selecting them yields the user object.
    pub fn add_screen_markers(
        &self,
        mut markers: Vec<ScreenMarker>,
        style: MarkerStyle,
        mode: ThreadMode,
    ) -> Result<ComponentObject, InteractionError> {
        self.shared.markers.validate(&markers, &style)?;
        for marker in &mut markers {
            if marker.user_object.is_some() && marker.selection_id.is_empty() {
                marker.selection_id = self.shared.resources.ids().next();
            }
        }
        let hit = Arc::new(MarkerHitShape::new(&markers));
        let selectable = style.selectable;
        self.add_feature::<MarkerBuilder>(markers, style, hit, selectable, mode)
    }

    /// Add stickers
    pub fn add_stickers(
        &self,
        stickers: Vec<Sticker>,
        style: StickerStyle,
        mode: ThreadMode,
    ) -> Result<ComponentObject, InteractionError> {
        let hit = Arc::new(StickerHitShape::new(&stickers));
        let selectable = style.selectable;
        self.add_feature::<StickerBuilder>(stickers, style, hit, selectable, mode)
    }

    /// Restyle the vectors and wide vectors of an object
    ///
    /// Changed drawables are rebuilt and swap with the old ones in a single
    /// drain. A new width also becomes the width selection tests against.
    /// `enable` shows or hides the object like [`Self::enable_objects`].
    /// Changes to an object still being built in the background must use
    /// [`ThreadMode::Any`] to take effect after the build.
    pub fn change_vectors(
        &self,
        object: ComponentObject,
        change: VectorChange,
        mode: ThreadMode,
    ) -> Result<(), InteractionError> {
        change.validate()?;
        self.run(mode, move |shared| shared.change_vectors(object, &change, mode))
    }

    /// Restyle the stickers of an object, or give them new images
    pub fn change_sticker(
        &self,
        object: ComponentObject,
        change: StickerChange,
        mode: ThreadMode,
    ) -> Result<(), InteractionError> {
        change.validate()?;
        self.run(mode, move |shared| shared.change_stickers(object, &change, mode))
    }

    /// Copy the vectors and wide vectors of `base` into a new object
    ///
    /// The copy shares no drawables with `base` and has `change` applied to
    /// its style. It joins the tiles `base` is in when the copy is made.
    pub fn instance_vectors(
        &self,
        base: ComponentObject,
        change: VectorChange,
        mode: ThreadMode,
    ) -> Result<ComponentObject, InteractionError> {
        change.validate()?;
        let selectable = self
            .shared
            .objects
            .is_selectable(base)
            .ok_or(InteractionError::UnknownObject(base.id()))?;

        let object = self.shared.objects.insert(None, selectable);
        let built = self.run(mode, move |shared| shared.instance_vectors(base, object, &change, mode));
        if let Err(err) = built {
            self.shared.objects.take(object.id());
            return Err(err);
        }
        Ok(object)
    }

    /// Remove objects; removed or unknown objects are skipped
    pub fn remove_objects(&self, objects: &[ComponentObject], mode: ThreadMode) -> Result<(), InteractionError> {
        let objects = objects.to_vec();
        self.run(mode, move |shared| {
            shared.remove_objects(&objects, mode);
            Ok(())
        })
    }

    /// Show objects
    pub fn enable_objects(&self, objects: &[ComponentObject], mode: ThreadMode) -> Result<(), InteractionError> {
        self.set_objects_enabled(objects, true, mode)
    }

    /// Hide objects; hidden objects are not selectable
    pub fn disable_objects(&self, objects: &[ComponentObject], mode: ThreadMode) -> Result<(), InteractionError> {
        self.set_objects_enabled(objects, false, mode)
    }

    fn set_objects_enabled(
        &self,
        objects: &[ComponentObject],
        enabled: bool,
        mode: ThreadMode,
    ) -> Result<(), InteractionError> {
        let objects = objects.to_vec();
        self.run(mode, move |shared| {
            shared.set_enabled(&objects, enabled, mode);
            Ok(())
        })
    }

    fn wait_for_upload(&self, upload: DrainTicket, mode: ThreadMode) {
        if mode == ThreadMode::CurrentWaitApplied {
            self.shared.wait_applied(upload);
        }
    }

    /// Acquire a cached texture for `image`
    ///
    /// Always runs on the calling thread since the identifier is returned;
    /// the upload itself is deferred to the render thread.
    pub fn add_texture(
        &self,
        image: &RgbaImage,
        format: TextureFormat,
        wrap: WrapFlags,
        mode: ThreadMode,
    ) -> Result<Identifier, InteractionError> {
        let acquired = self.shared.resources.acquire_image(image, format, wrap)?;
        self.wait_for_upload(acquired.upload, mode);
        Ok(acquired.texture)
    }

    /// Pack `image` into a shared atlas page
    pub fn add_texture_to_atlas(
        &self,
        image: &RgbaImage,
        format: TextureFormat,
        mode: ThreadMode,
    ) -> Result<SubTexture, InteractionError> {
        let sub = self.shared.resources.add_to_atlas(image, format)?;
        self.wait_for_upload(sub.upload, mode);
        Ok(sub)
    }

    /// Release cached textures and atlas sub-textures
    ///
    /// Every identifier is processed; the first failure is returned.
    pub fn remove_textures(&self, textures: &[Identifier], mode: ThreadMode) -> Result<(), InteractionError> {
        let textures = textures.to_vec();
        self.run(mode, move |shared| shared.remove_textures(&textures, mode))
    }

    /// Collect this thread's scene changes until [`Self::end_changes`]
    pub fn start_changes(&self) {
        lock(&self.shared.batches)
            .entry(thread::current().id())
            .or_default();
    }

    /// Queue this thread's collected changes as one contiguous batch
    ///
    /// Returns `None` when no batch was open.
    pub fn end_changes(&self, mode: ThreadMode) -> Option<DrainTicket> {
        let changes = lock(&self.shared.batches).remove(&thread::current().id())?;
        let ticket = self.shared.queue.enqueue_all(changes);
        if mode == ThreadMode::CurrentWaitApplied {
            self.shared.wait_applied(ticket);
        }
        Some(ticket)
    }

    /// Block until the drain cycle of `ticket` has been applied
    ///
    /// Returns `false` on timeout or when called on the render thread.
    pub fn wait_for_applied(&self, ticket: DrainTicket) -> bool {
        self.shared.wait_applied(ticket)
    }

    /// Block until every job handed to the worker so far has run
    pub fn wait_for_worker(&self) -> Result<(), InteractionError> {
        let (done, finished) = bounded(1);
        self.worker.execute(Box::new(move |_| {
            let _ = done.send(());
        }))?;
        finished.recv().map_err(|_| InteractionError::WorkerStopped)
    }

    /// Register a coordinate system whose tile pyramid covers `bounds`
    pub fn register_coord_system(&self, name: impl Into<String>, bounds: Mbr) -> CoordSystemId {
        self.shared.coord_systems.register(name, bounds)
    }

    /// Declare two coordinate systems identical and merge their tiles
    pub fn mark_coord_systems_equivalent(
        &self,
        a: CoordSystemId,
        b: CoordSystemId,
    ) -> Result<CoordSystemId, InteractionError> {
        Ok(self.shared.selection.mark_equivalent(a, b)?)
    }

    /// Make an object selectable through `tile`
    ///
    /// Returns `None` when the object has been removed.
    pub fn add_tile_object(
        &self,
        object: ComponentObject,
        tile: TileId,
        coord_sys: CoordSystemId,
    ) -> Result<Option<TileSortKey>, InteractionError> {
        let shared = &self.shared;
        let key = shared
            .objects
            .attach_tile(object.id(), || shared.selection.add_to_tile(object.id(), tile, coord_sys))?;
        Ok(key)
    }

    /// Stop selecting an object through a tile; `false` if it was not there
    pub fn remove_tile_object(&self, object: ComponentObject, key: TileSortKey) -> bool {
        let shared = &self.shared;
        let canonical = |key: &TileSortKey| {
            let coord_sys = shared.coord_systems.canonical(key.coord_sys).unwrap_or(key.coord_sys);
            TileSortKey::new(coord_sys, key.tile)
        };
        let target = canonical(&key);
        shared.objects.detach_tile(
            object.id(),
            |tile| canonical(tile) == target,
            || shared.selection.remove_from_tile(object.id(), key),
        )
    }

    /// Every selectable object within `max_screen_distance` pixels
    ///
    /// Results follow tile order; each object appears once.
    pub fn select_near(&self, screen_point: Point2, view: &ViewState, max_screen_distance: f64) -> Vec<SelectedObject> {
        let shared = &self.shared;
        shared
            .selection
            .query(screen_point, view, max_screen_distance, &shared.objects)
            .iter()
            .map(|found| shared.selected(found))
            .collect()
    }

    /// Objects at a screen point, using the configured search distance
    ///
    /// With `multi` unset only the closest object is returned; ties go to the
    /// object found first.
    pub fn find_vectors_in_point(&self, screen_point: Point2, view: &ViewState, multi: bool) -> Vec<SelectedObject> {
        let found = self.select_near(
            screen_point,
            view,
            self.shared.config.selection.default_screen_distance,
        );
        if multi {
            return found;
        }
        found
            .into_iter()
            .reduce(|best, next| if next.distance < best.distance { next } else { best })
            .into_iter()
            .collect()
    }

    /// Caller object registered under a selection ID
    pub fn selectable_object(&self, selection_id: Identifier) -> Option<SelectableObject> {
        self.shared.resources.lookup_selectable(selection_id)
    }

    /// Make the calling thread the render thread
    pub fn bind_render_thread(&self) {
        let current = thread::current();
        log::debug!("Render thread bound to {:?}", current.name().unwrap_or("<unnamed>"));
        *lock(&self.shared.render_thread) = Some(current.id());
    }

    /// True on the bound render thread
    pub fn is_render_thread(&self) -> bool {
        self.shared.is_render_thread()
    }

    /// Apply every queued change to `scene`. Render thread only.
    pub fn drain_and_apply(
        &self,
        scene: &mut RenderScene,
        builder: &mut dyn DrawListBuilder,
    ) -> Result<ApplyStats, InteractionError> {
        if !self.shared.is_render_thread() {
            return Err(InteractionError::NotRenderThread);
        }
        Ok(scene.drain(&self.shared.queue, builder))
    }

    /// Borrow a rendering context for a thread that has none
    pub fn borrow_transient_context(&self) -> Result<TransientContext, InteractionError> {
        Ok(self.shared.resources.borrow_transient_context()?)
    }

    /// Return a borrowed context
    pub fn return_transient_context(&self, context: TransientContext) -> Result<(), InteractionError> {
        Ok(self.shared.resources.return_transient_context(context)?)
    }
}
