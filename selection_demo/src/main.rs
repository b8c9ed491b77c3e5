//! Selection demo
//!
//! Several producer threads add and remove wide vectors while the main
//! thread plays render thread, draining the change queue each "frame".
//! Afterwards a selection query is run against what survived.
//!
//! Usage: `selection_demo [config.toml|config.ron]`

use std::thread;
use std::time::Duration;

use map_engine::foundation::logging;
use map_engine::prelude::*;

const PRODUCERS: u32 = 3;
const LINES_PER_PRODUCER: u32 = 8;

fn load_config() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from_file(&path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Horizontal line through the middle of tile `(level 2, column, row)`
fn tile_line(column: u32, row: u32) -> VectorShape {
    let y = f64::from(row) + 0.5;
    let x = f64::from(column);
    VectorShape::Linear(vec![Point2::new(x + 0.1, y), Point2::new(x + 0.9, y)])
}

fn produce(layer: &InteractionLayer, coord_sys: CoordSystemId, producer: u32) -> Result<usize, InteractionError> {
    let mut kept = 0;
    for i in 0..LINES_PER_PRODUCER {
        let (column, row) = (i % 4, producer % 4);
        let style = WideVectorStyle {
            width: 4.0,
            color: [40, 90, 200, 255],
            ..WideVectorStyle::default()
        };
        let object = layer.add_wide_vectors(vec![tile_line(column, row)], style, ThreadMode::Current)?;
        layer.add_tile_object(object, TileId::new(2, column, row), coord_sys)?;

        if i % 3 == 2 {
            layer.remove_objects(&[object], ThreadMode::Current)?;
        } else {
            kept += 1;
        }
    }
    log::info!("Producer {producer} kept {kept} lines");
    Ok(kept)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init_with_level(&config.log_level);
    log::info!("Starting selection demo");

    let layer = InteractionLayer::new(config)?;
    layer.bind_render_thread();
    let coord_sys = layer.register_coord_system(
        "demo plane",
        Mbr::new(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0)),
    );

    let mut scene = RenderScene::new();
    let mut draw_list = RecordingDrawList::new();
    let mut frames = 0u32;

    let kept = thread::scope(|s| -> Result<usize, Box<dyn std::error::Error>> {
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let layer = &layer;
                s.spawn(move || produce(layer, coord_sys, p))
            })
            .collect();

        while !producers.iter().all(|p| p.is_finished()) {
            let stats = layer.drain_and_apply(&mut scene, &mut draw_list)?;
            log::debug!("Frame {frames}: {stats:?}");
            frames += 1;
            thread::sleep(Duration::from_millis(2));
        }

        let mut kept = 0;
        for producer in producers {
            kept += producer.join().map_err(|_| "producer thread panicked")??;
        }
        Ok(kept)
    })?;

    // A marker added from the background worker.
    let marker = ScreenMarker::new(Point2::new(2.5, 1.5), [12.0, 12.0])
        .with_user_object(std::sync::Arc::new(String::from("harbor")));
    let harbor = layer.add_screen_markers(vec![marker], MarkerStyle::default(), ThreadMode::Any)?;
    layer.wait_for_worker()?;
    layer.add_tile_object(harbor, TileId::new(2, 2, 1), coord_sys)?;

    let stats = layer.drain_and_apply(&mut scene, &mut draw_list)?;
    log::info!(
        "{frames} frames, {kept} lines kept, {} drawables live, last frame {stats:?}",
        scene.drawable_count()
    );

    let view = ViewState::looking_at(Point2::new(2.0, 2.0), 0.01, Vec2::new(400.0, 400.0))?;
    for local in [Point2::new(1.5, 1.5), Point2::new(2.5, 1.5), Point2::new(0.5, 3.9)] {
        let screen = view.project(&local);
        let hits = layer.find_vectors_in_point(screen, &view, true);
        println!("({:.1}, {:.1}): {} hit(s)", local.x, local.y, hits.len());
        for hit in hits {
            let label = hit
                .user_object
                .as_ref()
                .and_then(|o| o.downcast_ref::<String>())
                .map_or_else(|| "vector".to_string(), Clone::clone);
            println!(
                "  object {} via tile {:?} at {:.1} px ({label})",
                hit.object.id(),
                hit.tile.tile,
                hit.distance
            );
        }
    }

    Ok(())
}
