//! End-to-end behavior of the change queue, render scene and texture cache

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use map_engine::changes::{Drawable, DrawableKind, Primitive, TextureUpload};
use map_engine::foundation::ids::IdentifierAllocator;
use map_engine::prelude::*;
use map_engine::resources::{ResourceRegistry, TextureKey};

fn line(y: f64) -> Vec<VectorShape> {
    vec![VectorShape::Linear(vec![Point2::new(0.5, y), Point2::new(3.5, y)])]
}

fn render_layer() -> InteractionLayer {
    let layer = InteractionLayer::new(EngineConfig::default()).unwrap();
    layer.bind_render_thread();
    layer
}

#[test]
fn test_create_then_remove_before_drain_never_reaches_builder() {
    let queue = ChangeQueue::new();
    let id = Identifier::from_raw(7);

    queue.enqueue(ChangeCommand::CreateDrawable(Box::new(Drawable::new(
        id,
        DrawableKind::WideVector,
        Primitive::Triangles,
    ))));
    queue.enqueue(ChangeCommand::RemoveDrawable { id });

    let mut scene = RenderScene::new();
    let mut builder = RecordingDrawList::new();
    let stats = scene.drain(&queue, &mut builder);

    assert!(!builder.ever_added(id));
    assert!(builder.events.is_empty());
    assert_eq!(stats.cancelled, 1);
    assert_eq!(scene.drawable_count(), 0);
}

#[test]
fn test_add_then_remove_leaves_no_drawables_of_the_object() {
    let layer = render_layer();
    let mut scene = RenderScene::new();
    let mut builder = RecordingDrawList::new();

    let keep = layer
        .add_vectors(line(1.0), VectorStyle::default(), ThreadMode::Current)
        .unwrap();
    let objects: Vec<_> = (0..5)
        .map(|i| {
            layer
                .add_wide_vectors(line(f64::from(i) * 0.5), WideVectorStyle::default(), ThreadMode::Current)
                .unwrap()
        })
        .collect();

    // Drain between some of the adds and their removal, not others.
    layer.drain_and_apply(&mut scene, &mut builder).unwrap();
    let late = layer
        .add_wide_vectors(line(3.0), WideVectorStyle::default(), ThreadMode::Current)
        .unwrap();
    layer.remove_objects(&objects, ThreadMode::Current).unwrap();
    layer.remove_objects(&[late], ThreadMode::Current).unwrap();
    layer.drain_and_apply(&mut scene, &mut builder).unwrap();

    let kept: Vec<_> = scene.drawables().map(|d| d.id).collect();
    assert_eq!(kept.len(), 1);
    assert_eq!(scene.drawables().next().map(|d| d.kind), Some(DrawableKind::Vector));
    assert!(layer.objects().contains(keep));
}

#[test]
fn test_remove_is_idempotent() {
    let run = |remove_twice: bool| {
        let layer = render_layer();
        let mut scene = RenderScene::new();
        let mut builder = RecordingDrawList::new();
        let image = Arc::new(image::RgbaImage::from_pixel(4, 4, image::Rgba([9, 9, 9, 255])));
        let marker = ScreenMarker::new(Point2::new(1.0, 1.0), [8.0, 8.0]).with_image(image);

        let object = layer
            .add_screen_markers(vec![marker], MarkerStyle::default(), ThreadMode::Current)
            .unwrap();
        layer.drain_and_apply(&mut scene, &mut builder).unwrap();

        layer.remove_objects(&[object], ThreadMode::Current).unwrap();
        if remove_twice {
            layer.remove_objects(&[object], ThreadMode::Current).unwrap();
        }
        layer.drain_and_apply(&mut scene, &mut builder).unwrap();

        (
            scene.drawable_count(),
            scene.texture_count(),
            layer.objects().len(),
            layer.resources().texture_count(),
            builder.events.len(),
        )
    };

    assert_eq!(run(false), run(true));
    assert_eq!(run(true).0, 0);
}

#[test]
fn test_concurrent_acquires_upload_once() {
    let queue = Arc::new(ChangeQueue::new());
    let registry = ResourceRegistry::new(
        &ResourceConfig::default(),
        IdentifierAllocator::global(),
        Arc::clone(&queue),
    );
    let factory_calls = AtomicUsize::new(0);
    let key = TextureKey::from_raw(0xfeed);

    let textures: Vec<Identifier> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    (0..25)
                        .map(|_| {
                            registry
                                .acquire_texture(key, |id| {
                                    factory_calls.fetch_add(1, Ordering::SeqCst);
                                    Ok(TextureUpload::blank(id, 16, 16, TextureFormat::Rgba8888))
                                })
                                .unwrap()
                                .texture
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
    assert!(textures.windows(2).all(|w| w[0] == w[1]));
    let texture = textures[0];
    assert_eq!(registry.texture_ref_count(texture), Some(200));

    let mut changes = ChangeSet::new();
    for _ in 0..150 {
        registry.release_texture(texture, &mut changes).unwrap();
    }
    assert_eq!(registry.texture_ref_count(texture), Some(50));
    assert!(changes.is_empty());

    let mut scene = RenderScene::new();
    let mut builder = RecordingDrawList::new();
    scene.drain(&queue, &mut builder);
    assert_eq!(builder.uploads(), 1);
}

#[test]
fn test_producers_and_render_thread_interleave() {
    let layer = render_layer();
    let mut scene = RenderScene::new();
    let mut builder = RecordingDrawList::new();

    thread::scope(|s| {
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let layer = &layer;
                s.spawn(move || {
                    for i in 0..20 {
                        let y = f64::from(p) * 0.5 + f64::from(i) * 0.01;
                        let object = layer
                            .add_wide_vectors(line(y), WideVectorStyle::default(), ThreadMode::Current)
                            .unwrap();
                        if i % 2 == 0 {
                            layer.remove_objects(&[object], ThreadMode::Current).unwrap();
                        }
                    }
                })
            })
            .collect();

        while !producers.iter().all(|p| p.is_finished()) {
            layer.drain_and_apply(&mut scene, &mut builder).unwrap();
            thread::yield_now();
        }
    });
    layer.drain_and_apply(&mut scene, &mut builder).unwrap();

    assert_eq!(layer.objects().len(), 40);
    assert_eq!(scene.drawable_count(), 40);
}

#[test]
fn test_layers_sharing_a_render_scene_never_collide() {
    let first = render_layer();
    let second = render_layer();
    let mut scene = RenderScene::new();
    let mut builder = RecordingDrawList::new();

    let a = first
        .add_vectors(line(1.0), VectorStyle::default(), ThreadMode::Current)
        .unwrap();
    let b = second
        .add_vectors(line(2.0), VectorStyle::default(), ThreadMode::Current)
        .unwrap();
    assert_ne!(a.id(), b.id());

    first.drain_and_apply(&mut scene, &mut builder).unwrap();
    second.drain_and_apply(&mut scene, &mut builder).unwrap();
    assert_eq!(scene.drawable_count(), 2);

    // Removing from one layer leaves the other layer's drawables alone.
    first.remove_objects(&[a], ThreadMode::Current).unwrap();
    let stats = first.drain_and_apply(&mut scene, &mut builder).unwrap();
    assert_eq!((stats.removed, stats.skipped), (1, 0));
    assert_eq!(scene.drawable_count(), 1);
    assert!(second.objects().contains(b));
}
