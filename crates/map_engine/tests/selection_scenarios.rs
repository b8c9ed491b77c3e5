//! Selection through the tile index, driven through the interaction layer

use std::collections::BTreeSet;
use std::thread;

use map_engine::prelude::*;

fn extent() -> Mbr {
    Mbr::new(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0))
}

/// 100 px per local unit, the whole extent in frame
fn view() -> ViewState {
    ViewState::looking_at(Point2::new(2.0, 2.0), 0.01, Vec2::new(400.0, 400.0)).unwrap()
}

fn layer() -> InteractionLayer {
    map_engine::foundation::logging::init();
    let layer = InteractionLayer::new(EngineConfig::default()).unwrap();
    layer.bind_render_thread();
    layer
}

#[test]
fn test_vector_spanning_two_tiles_is_found_through_the_second() {
    let layer = layer();
    let cs = layer.register_coord_system("local", extent());
    let mut scene = RenderScene::new();
    let mut builder = RecordingDrawList::new();

    // Runs north through tiles (2, 1, 1) and (2, 1, 2).
    let road = VectorShape::Linear(vec![Point2::new(1.5, 1.2), Point2::new(1.5, 2.8)]);
    let object = layer
        .add_wide_vectors(vec![road], WideVectorStyle::default(), ThreadMode::Current)
        .unwrap();
    for y in [1, 2] {
        layer.add_tile_object(object, TileId::new(2, 1, y), cs).unwrap();
    }
    layer.drain_and_apply(&mut scene, &mut builder).unwrap();
    assert_eq!(layer.selection().len(), 2);

    // Local (1.5, 2.6) lies in the second tile only, even with the search radius.
    let point = view().project(&Point2::new(1.5, 2.6));
    let found = layer.find_vectors_in_point(point, &view(), true);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].object, object);
    assert_eq!(found[0].tile.tile, TileId::new(2, 1, 2));

    layer.remove_objects(&[object], ThreadMode::Current).unwrap();
    layer.drain_and_apply(&mut scene, &mut builder).unwrap();
    assert!(layer.find_vectors_in_point(point, &view(), true).is_empty());
    assert!(layer.selection().is_empty());
    assert_eq!(scene.drawable_count(), 0);
}

#[test]
fn test_bundle_exists_exactly_while_it_has_contributors() {
    let layer = layer();
    let cs = layer.register_coord_system("local", extent());
    let tiles = [TileId::new(2, 0, 0), TileId::new(2, 1, 0), TileId::new(2, 1, 1)];
    let line = || vec![VectorShape::Linear(vec![Point2::new(0.1, 0.1), Point2::new(1.9, 1.9)])];

    let objects: Vec<_> = (0..4)
        .map(|_| layer.add_selection_vectors(line(), LineWidth::Screen(3.0)).unwrap())
        .collect();

    // Object i contributes to tiles[j] for every j <= i % 3.
    let mut keys = Vec::new();
    for (i, object) in objects.iter().enumerate() {
        for tile in &tiles[..=i % 3] {
            let key = layer.add_tile_object(*object, *tile, cs).unwrap().unwrap();
            keys.push((i, key));
        }
    }

    let check = |removed: &BTreeSet<usize>| {
        for tile in tiles {
            let key = TileSortKey::new(cs, tile);
            let expected: BTreeSet<Identifier> = keys
                .iter()
                .filter(|(i, k)| *k == key && !removed.contains(i))
                .map(|(i, _)| objects[*i].id())
                .collect();
            match layer.selection().tile(key) {
                Some(bundle) => {
                    assert!(!bundle.contributors.is_empty());
                    assert_eq!(bundle.contributors, expected);
                }
                None => assert!(expected.is_empty()),
            }
        }
    };

    let mut removed = BTreeSet::new();
    check(&removed);
    for i in [2, 0, 3, 1] {
        layer.remove_objects(&[objects[i]], ThreadMode::Current).unwrap();
        removed.insert(i);
        check(&removed);
    }
    assert!(layer.selection().is_empty());
}

#[test]
fn test_query_never_returns_removed_objects() {
    let layer = layer();
    let cs = layer.register_coord_system("local", extent());
    let point = view().project(&Point2::new(2.0, 2.0));

    thread::scope(|s| {
        for worker in 0..4 {
            let layer = &layer;
            s.spawn(move || {
                for i in 0..25 {
                    let offset = f64::from(worker * 25 + i) * 0.001;
                    let cross = VectorShape::Linear(vec![
                        Point2::new(1.0 + offset, 2.0),
                        Point2::new(3.0 - offset, 2.0),
                    ]);
                    let object = layer
                        .add_wide_vectors(vec![cross], WideVectorStyle::default(), ThreadMode::Current)
                        .unwrap();
                    layer.add_tile_object(object, TileId::new(1, 1, 1), cs).unwrap();
                    layer.add_tile_object(object, TileId::new(1, 0, 0), cs).unwrap();

                    layer.remove_objects(&[object], ThreadMode::Current).unwrap();
                    let found = layer.select_near(point, &view(), 5.0);
                    assert!(found.iter().all(|hit| hit.object != object));
                }
            });
        }

        for _ in 0..50 {
            for hit in layer.select_near(point, &view(), 5.0) {
                assert!(hit.distance <= 5.0);
            }
            thread::yield_now();
        }
    });

    assert!(layer.select_near(point, &view(), 5.0).is_empty());
    assert!(layer.selection().is_empty());
    assert!(layer.objects().is_empty());
}

#[test]
fn test_single_selection_prefers_the_closest_object() {
    let layer = layer();
    let cs = layer.register_coord_system("local", extent());
    let far = VectorShape::Linear(vec![Point2::new(1.0, 2.1), Point2::new(3.0, 2.1)]);
    let near = VectorShape::Linear(vec![Point2::new(1.0, 2.02), Point2::new(3.0, 2.02)]);

    let far = layer.add_selection_vectors(vec![far], LineWidth::Screen(1.0)).unwrap();
    let near = layer.add_selection_vectors(vec![near], LineWidth::Screen(1.0)).unwrap();
    for object in [far, near] {
        layer.add_tile_object(object, TileId::new(0, 0, 0), cs).unwrap();
    }

    let point = view().project(&Point2::new(2.0, 2.0));
    assert_eq!(layer.find_vectors_in_point(point, &view(), true).len(), 2);
    let single = layer.find_vectors_in_point(point, &view(), false);
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].object, near);
}
