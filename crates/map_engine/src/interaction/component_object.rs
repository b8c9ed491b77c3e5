//! Component objects and the store that owns them

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::changes::DrawableKind;
use crate::foundation::collections::{HandleMap, ObjectKey};
use crate::foundation::ids::{Identifier, IdentifierAllocator};
use crate::foundation::sync::{read, write};
use crate::spatial::{Hit, HitContext, HitTest, ObjectResolver, SpatialError, TileSortKey};

/// Handle for the result of one add call
///
/// The handle stays valid after the object is removed; operations on a
/// removed object are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentObject {
    id: Identifier,
}

impl ComponentObject {
    pub(crate) const fn from_id(id: Identifier) -> Self {
        Self { id }
    }

    /// Identifier of the object
    pub const fn id(self) -> Identifier {
        self.id
    }
}

/// What a live object owns
#[derive(Debug)]
pub(crate) struct ObjectRecord {
    pub(crate) id: Identifier,
    /// Scene reps by the manager that holds them
    pub(crate) reps: Vec<(DrawableKind, Identifier)>,
    pub(crate) hit_shape: Option<Arc<dyn HitTest>>,
    /// Tiles the object contributes to
    pub(crate) tiles: Vec<TileSortKey>,
    pub(crate) enabled: bool,
    pub(crate) selectable: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    records: HandleMap<ObjectRecord>,
    by_id: HashMap<Identifier, ObjectKey>,
}

impl StoreState {
    fn get(&self, id: Identifier) -> Option<&ObjectRecord> {
        self.by_id.get(&id).and_then(|key| self.records.get(*key))
    }

    fn get_mut(&mut self, id: Identifier) -> Option<&mut ObjectRecord> {
        let key = *self.by_id.get(&id)?;
        self.records.get_mut(key)
    }
}

/// Arena owning every live component object
///
/// Lock order: the store lock is taken before the selection index lock,
/// never the other way round.
#[derive(Debug)]
pub struct ComponentObjectStore {
    ids: Arc<IdentifierAllocator>,
    state: RwLock<StoreState>,
}

impl ComponentObjectStore {
    /// Create an empty store drawing identifiers from `ids`
    pub fn new(ids: Arc<IdentifierAllocator>) -> Self {
        Self {
            ids,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub(crate) fn insert(&self, hit_shape: Option<Arc<dyn HitTest>>, selectable: bool) -> ComponentObject {
        let id = self.ids.next();
        let mut state = write(&self.state);
        let key = state.records.insert(ObjectRecord {
            id,
            reps: Vec::new(),
            hit_shape,
            tiles: Vec::new(),
            enabled: true,
            selectable,
        });
        state.by_id.insert(id, key);
        ComponentObject::from_id(id)
    }

    /// Record a finished scene rep
    ///
    /// Returns the object's current visibility, or `None` if the object was
    /// removed while the rep was being built.
    pub(crate) fn attach_rep(&self, id: Identifier, kind: DrawableKind, rep: Identifier) -> Option<bool> {
        let mut state = write(&self.state);
        let record = state.get_mut(id)?;
        record.reps.push((kind, rep));
        Some(record.enabled)
    }

    /// Register a tile through `add`, unless the object is gone
    ///
    /// The store lock is held across `add` so a concurrent removal either
    /// sees the new tile or prevents it from being added.
    pub(crate) fn attach_tile(
        &self,
        id: Identifier,
        add: impl FnOnce() -> Result<TileSortKey, SpatialError>,
    ) -> Result<Option<TileSortKey>, SpatialError> {
        let mut state = write(&self.state);
        let Some(record) = state.get_mut(id) else {
            return Ok(None);
        };
        let key = add()?;
        if !record.tiles.contains(&key) {
            record.tiles.push(key);
        }
        Ok(Some(key))
    }

    /// Forget every tile `same_tile` accepts, then run `remove`
    ///
    /// `remove` only runs when a tile was forgotten, still under the store
    /// lock. Returns its result, or `false` when nothing matched.
    pub(crate) fn detach_tile(
        &self,
        id: Identifier,
        same_tile: impl Fn(&TileSortKey) -> bool,
        remove: impl FnOnce() -> bool,
    ) -> bool {
        let mut state = write(&self.state);
        let Some(record) = state.get_mut(id) else {
            return false;
        };
        let before = record.tiles.len();
        record.tiles.retain(|tile| !same_tile(tile));
        record.tiles.len() != before && remove()
    }

    /// Remove an object, handing back what it owned
    pub(crate) fn take(&self, id: Identifier) -> Option<ObjectRecord> {
        let mut state = write(&self.state);
        let key = state.by_id.remove(&id)?;
        state.records.remove(key)
    }

    /// Change visibility, returning the reps that must follow
    pub(crate) fn set_enabled(&self, id: Identifier, enabled: bool) -> Option<Vec<(DrawableKind, Identifier)>> {
        let mut state = write(&self.state);
        let record = state.get_mut(id)?;
        record.enabled = enabled;
        Some(record.reps.clone())
    }

    /// Replace the shape selection queries test against
    pub(crate) fn set_hit_shape(&self, id: Identifier, shape: Arc<dyn HitTest>) -> bool {
        let mut state = write(&self.state);
        let Some(record) = state.get_mut(id) else {
            return false;
        };
        record.hit_shape = Some(shape);
        true
    }

    /// Whether a live object answers selection queries
    pub fn is_selectable(&self, object: ComponentObject) -> Option<bool> {
        read(&self.state).get(object.id).map(|record| record.selectable)
    }

    /// True while the object has not been removed
    pub fn contains(&self, object: ComponentObject) -> bool {
        read(&self.state).get(object.id).is_some()
    }

    /// Scene reps of a live object
    pub fn reps_of(&self, object: ComponentObject) -> Option<Vec<(DrawableKind, Identifier)>> {
        read(&self.state).get(object.id).map(|record| record.reps.clone())
    }

    /// Tiles a live object contributes to
    pub fn tiles_of(&self, object: ComponentObject) -> Option<Vec<TileSortKey>> {
        read(&self.state).get(object.id).map(|record| record.tiles.clone())
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        read(&self.state).records.len()
    }

    /// True when no object is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectResolver for ComponentObjectStore {
    fn hit_test(&self, object: Identifier, ctx: &HitContext<'_>) -> Option<Hit> {
        let shape = {
            let state = read(&self.state);
            let record = state.get(object)?;
            if !(record.enabled && record.selectable) {
                return None;
            }
            Arc::clone(record.hit_shape.as_ref()?)
        };
        shape.hit(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Point2, Vec2};
    use crate::scene::VectorShape;
    use crate::spatial::{CoordSystemId, CoordSystemRegistry, LineWidth, TileId, VectorHitShape, ViewState};

    fn store() -> ComponentObjectStore {
        ComponentObjectStore::new(Arc::new(IdentifierAllocator::new()))
    }

    fn hit_shape() -> Option<Arc<dyn HitTest>> {
        let line = VectorShape::Linear(vec![Point2::new(-10.0, 0.0), Point2::new(10.0, 0.0)]);
        Some(Arc::new(VectorHitShape::new(vec![line], LineWidth::Screen(2.0))))
    }

    fn key(coord_sys: CoordSystemId) -> TileSortKey {
        TileSortKey::new(coord_sys, TileId::new(0, 0, 0))
    }

    #[test]
    fn test_attach_rep_after_take_reports_removal() {
        let store = store();
        let object = store.insert(None, false);
        assert_eq!(store.attach_rep(object.id(), DrawableKind::Vector, Identifier::from_raw(50)), Some(true));

        let record = store.take(object.id()).unwrap();
        assert_eq!(record.reps.len(), 1);
        assert!(!store.contains(object));
        assert_eq!(store.attach_rep(object.id(), DrawableKind::Vector, Identifier::from_raw(51)), None);
        assert!(store.take(object.id()).is_none());
    }

    #[test]
    fn test_attach_tile_skips_removed_objects() {
        let registry = CoordSystemRegistry::new();
        let cs = registry.register("test", crate::foundation::math::Mbr::empty());
        let store = store();
        let object = store.insert(None, true);

        assert_eq!(store.attach_tile(object.id(), || Ok(key(cs))).unwrap(), Some(key(cs)));
        assert_eq!(store.attach_tile(object.id(), || Ok(key(cs))).unwrap(), Some(key(cs)));
        assert_eq!(store.tiles_of(object).unwrap().len(), 1);

        assert!(store.detach_tile(object.id(), |tile| *tile == key(cs), || true));
        assert!(!store.detach_tile(object.id(), |tile| *tile == key(cs), || true));

        store.take(object.id());
        let mut called = false;
        let result = store.attach_tile(object.id(), || {
            called = true;
            Ok(key(cs))
        });
        assert_eq!(result.unwrap(), None);
        assert!(!called);
    }

    #[test]
    fn test_resolver_honors_visibility_and_selectability() {
        let store = store();
        let view = ViewState::looking_at(Point2::origin(), 1.0, Vec2::new(100.0, 100.0)).unwrap();
        let ctx = HitContext::new(&view, Point2::new(50.0, 50.0), 1.0);

        let selectable = store.insert(hit_shape(), true);
        let hidden_from_selection = store.insert(hit_shape(), false);
        assert!(store.hit_test(selectable.id(), &ctx).is_some());
        assert!(store.hit_test(hidden_from_selection.id(), &ctx).is_none());

        store.set_enabled(selectable.id(), false);
        assert!(store.hit_test(selectable.id(), &ctx).is_none());
        store.set_enabled(selectable.id(), true);
        assert!(store.hit_test(selectable.id(), &ctx).is_some());

        store.take(selectable.id());
        assert!(store.hit_test(selectable.id(), &ctx).is_none());
    }

    #[test]
    fn test_hit_shape_can_be_replaced_while_live() {
        let store = store();
        let view = ViewState::looking_at(Point2::origin(), 1.0, Vec2::new(100.0, 100.0)).unwrap();
        let ctx = HitContext::new(&view, Point2::new(50.0, 50.0), 1.0);

        let object = store.insert(None, true);
        assert!(store.hit_test(object.id(), &ctx).is_none());
        assert_eq!(store.is_selectable(object), Some(true));

        let shape = hit_shape().unwrap();
        assert!(store.set_hit_shape(object.id(), Arc::clone(&shape)));
        assert!(store.hit_test(object.id(), &ctx).is_some());

        store.take(object.id());
        assert!(!store.set_hit_shape(object.id(), shape));
        assert_eq!(store.is_selectable(object), None);
    }
}
