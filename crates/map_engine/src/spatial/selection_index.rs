//! Tile-keyed index of selectable objects
//!
//! Exactly one [`TileSortData`] exists per tile key that has at least one
//! contributor. Bundles are created by the first `add_to_tile` and erased by
//! the `remove_from_tile` that empties them.

use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::{Arc, RwLock};

use super::coord_system::{CoordSystemId, CoordSystemRegistry};
use super::hit_test::{Hit, HitContext, ObjectResolver};
use super::tile::{TileId, TileSortKey};
use super::view_state::ViewState;
use super::SpatialError;
use crate::foundation::ids::{Identifier, IdentifierSet};
use crate::foundation::math::{Mbr, Point2, Vec2};
use crate::foundation::sync::{read, write};

/// Selection data of one tile
#[derive(Debug, Clone, PartialEq)]
pub struct TileSortData {
    /// Key of the bundle
    pub key: TileSortKey,
    /// Tile rectangle in the local frame
    pub bounds: Mbr,
    /// Free-form tile attributes
    pub attributes: BTreeMap<String, String>,
    /// Objects with selectable geometry in this tile
    pub contributors: IdentifierSet,
}

#[derive(Debug, Default)]
struct IndexState {
    tiles: BTreeMap<TileSortKey, TileSortData>,
    /// Bundle count per (coordinate system, level)
    levels: BTreeMap<(CoordSystemId, u32), usize>,
}

impl IndexState {
    fn insert(&mut self, object: Identifier, key: TileSortKey, bounds: Mbr) {
        let levels = &mut self.levels;
        self.tiles
            .entry(key)
            .or_insert_with(|| {
                *levels.entry((key.coord_sys, key.tile.level)).or_insert(0) += 1;
                TileSortData {
                    key,
                    bounds,
                    attributes: BTreeMap::new(),
                    contributors: IdentifierSet::new(),
                }
            })
            .contributors
            .insert(object);
    }

    fn erase(&mut self, key: &TileSortKey) -> Option<TileSortData> {
        let data = self.tiles.remove(key)?;
        let level = (key.coord_sys, key.tile.level);
        if let Some(count) = self.levels.get_mut(&level) {
            *count -= 1;
            if *count == 0 {
                self.levels.remove(&level);
            }
        }
        Some(data)
    }
}

/// Ordered set of per-tile selection bundles
#[derive(Debug)]
pub struct SpatialSelectionIndex {
    coord_systems: Arc<CoordSystemRegistry>,
    state: RwLock<IndexState>,
}

impl SpatialSelectionIndex {
    /// Create an empty index over `coord_systems`
    pub fn new(coord_systems: Arc<CoordSystemRegistry>) -> Self {
        Self {
            coord_systems,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Coordinate systems this index keys by
    pub fn coord_systems(&self) -> &Arc<CoordSystemRegistry> {
        &self.coord_systems
    }

    fn canonical_key(&self, key: TileSortKey) -> TileSortKey {
        let coord_sys = self.coord_systems.canonical(key.coord_sys).unwrap_or(key.coord_sys);
        TileSortKey::new(coord_sys, key.tile)
    }

    /// Register `object` as a contributor of `tile`
    ///
    /// The canonical system is resolved under the index lock, so the key
    /// cannot go stale against a concurrent [`Self::mark_equivalent`].
    pub fn add_to_tile(&self, object: Identifier, tile: TileId, coord_sys: CoordSystemId) -> Result<TileSortKey, SpatialError> {
        tile.validate()?;
        let mut state = write(&self.state);
        let canonical = self.coord_systems.canonical(coord_sys)?;
        let extent = self.coord_systems.bounds(canonical)?;
        let key = TileSortKey::new(canonical, tile);

        state.insert(object, key, tile.bounds(&extent));
        Ok(key)
    }

    /// Drop `object` from a tile, erasing the bundle if it empties
    ///
    /// Returns `false` when the object was not a contributor.
    pub fn remove_from_tile(&self, object: Identifier, key: TileSortKey) -> bool {
        let mut state = write(&self.state);
        let key = self.canonical_key(key);

        let Some(data) = state.tiles.get_mut(&key) else {
            return false;
        };
        let removed = data.contributors.remove(&object);
        if data.contributors.is_empty() {
            state.erase(&key);
        }
        removed
    }

    /// Set a tile attribute; `false` if no bundle exists for `key`
    pub fn set_attribute(&self, key: TileSortKey, name: impl Into<String>, value: impl Into<String>) -> bool {
        let mut state = write(&self.state);
        let key = self.canonical_key(key);
        state
            .tiles
            .get_mut(&key)
            .map(|data| data.attributes.insert(name.into(), value.into()))
            .is_some()
    }

    /// Snapshot of one bundle
    pub fn tile(&self, key: TileSortKey) -> Option<TileSortData> {
        let state = read(&self.state);
        state.tiles.get(&self.canonical_key(key)).cloned()
    }

    /// Number of bundles
    pub fn len(&self) -> usize {
        read(&self.state).tiles.len()
    }

    /// True when no tile holds selectable geometry
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declare two coordinate systems identical and merge their bundles
    ///
    /// Marking and re-keying happen under one index lock; no bundle can be
    /// added under the folded system in between. Returns the canonical
    /// member of the merged class.
    pub fn mark_equivalent(&self, a: CoordSystemId, b: CoordSystemId) -> Result<CoordSystemId, SpatialError> {
        let mut state = write(&self.state);
        let canonical = self.coord_systems.mark_equivalent(a, b)?;
        self.rekey(&mut state);
        Ok(canonical)
    }

    /// Re-key bundles after systems were marked equivalent on the registry
    /// directly; bundles now sharing a representative are merged.
    pub fn merge_equivalent_systems(&self) {
        self.rekey(&mut write(&self.state));
    }

    fn rekey(&self, state: &mut IndexState) {
        let stale: Vec<TileSortKey> = state
            .tiles
            .keys()
            .filter(|key| self.canonical_key(**key) != **key)
            .copied()
            .collect();

        for old in stale {
            let Some(data) = state.erase(&old) else {
                continue;
            };
            let key = self.canonical_key(old);
            for object in &data.contributors {
                state.insert(*object, key, data.bounds);
            }
            if let Some(merged) = state.tiles.get_mut(&key) {
                merged.attributes.extend(data.attributes);
            }
            log::debug!("Merged tile bundle {old:?} into {key:?}");
        }
    }

    /// Find the objects near `screen_point`
    ///
    /// Candidate tiles are gathered now, under the read lock; hit tests run
    /// lazily as the returned query is iterated.
    pub fn query<'r, R: ObjectResolver + ?Sized>(
        &self,
        screen_point: Point2,
        view: &ViewState,
        max_screen_distance: f64,
        resolver: &'r R,
    ) -> SelectionQuery<'r, R> {
        let d = max_screen_distance.max(0.0);
        let pad = Vec2::new(d, d);
        let search = view.local_rect(&Mbr::new(screen_point - pad, screen_point + pad));

        let state = read(&self.state);
        let mut candidates = Vec::new();
        for (&(coord_sys, level), &count) in &state.levels {
            let Ok(extent) = self.coord_systems.bounds(coord_sys) else {
                continue;
            };
            let Some(((x0, x1), (y0, y1))) = TileId::covering(level, &extent, &search) else {
                continue;
            };
            let key = |x: u32, y: u32| TileSortKey::new(coord_sys, TileId::new(level, x, y));

            let mut visit = |range: RangeInclusive<TileSortKey>| {
                for data in state.tiles.range(range).map(|(_, data)| data) {
                    let (x, y) = (data.key.tile.x, data.key.tile.y);
                    if !(x0..=x1).contains(&x) || !(y0..=y1).contains(&y) {
                        continue;
                    }
                    if view.screen_rect(&data.bounds).expanded(d).contains(&screen_point) {
                        candidates.push((data.key, data.contributors.iter().copied().collect()));
                    }
                }
            };

            // Walk column by column while that touches fewer keys than the level holds.
            if u64::from(x1 - x0) + 1 <= count as u64 {
                for x in x0..=x1 {
                    visit(key(x, y0)..=key(x, y1));
                }
            } else {
                visit(key(0, 0)..=key(u32::MAX, u32::MAX));
            }
        }

        SelectionQuery {
            resolver,
            view: view.clone(),
            screen_point,
            max_screen_distance: d,
            candidates,
        }
    }
}

/// One selected object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionMatch {
    /// The object
    pub object: Identifier,
    /// Tile it was found through
    pub tile: TileSortKey,
    /// Hit details
    pub hit: Hit,
}

/// Result of [`SpatialSelectionIndex::query`]
///
/// A finite, restartable sequence: every call to [`SelectionQuery::iter`]
/// starts over from the first candidate tile. Objects are visited in tile key
/// order and reported at most once per pass.
pub struct SelectionQuery<'r, R: ?Sized> {
    resolver: &'r R,
    view: ViewState,
    screen_point: Point2,
    max_screen_distance: f64,
    candidates: Vec<(TileSortKey, Vec<Identifier>)>,
}

impl<'r, R: ObjectResolver + ?Sized> SelectionQuery<'r, R> {
    /// Start a pass over the matches
    pub fn iter(&self) -> SelectionIter<'_, 'r, R> {
        SelectionIter {
            ctx: HitContext::new(&self.view, self.screen_point, self.max_screen_distance),
            query: self,
            tile: 0,
            object: 0,
            seen: HashSet::new(),
        }
    }

    /// Number of tiles that passed the screen-distance filter
    pub fn candidate_tiles(&self) -> usize {
        self.candidates.len()
    }
}

impl<'q, 'r, R: ObjectResolver + ?Sized> IntoIterator for &'q SelectionQuery<'r, R> {
    type Item = SelectionMatch;
    type IntoIter = SelectionIter<'q, 'r, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over one pass of a [`SelectionQuery`]
pub struct SelectionIter<'q, 'r, R: ?Sized> {
    query: &'q SelectionQuery<'r, R>,
    ctx: HitContext<'q>,
    tile: usize,
    object: usize,
    seen: HashSet<Identifier>,
}

impl<R: ObjectResolver + ?Sized> Iterator for SelectionIter<'_, '_, R> {
    type Item = SelectionMatch;

    fn next(&mut self) -> Option<SelectionMatch> {
        while let Some((key, objects)) = self.query.candidates.get(self.tile) {
            while let Some(&object) = objects.get(self.object) {
                self.object += 1;
                if !self.seen.insert(object) {
                    continue;
                }
                if let Some(hit) = self.query.resolver.hit_test(object, &self.ctx) {
                    return Some(SelectionMatch {
                        object,
                        tile: *key,
                        hit,
                    });
                }
            }
            self.tile += 1;
            self.object = 0;
        }
        None
    }
}
