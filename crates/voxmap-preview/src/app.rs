//! Preview run.
//!
//! Renders two views of the same terrain: the cached tiles around the
//! center (`tiles.png`, with markers on top) and the directly sampled world
//! map (`worldmap.png`).

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use voxmap_common::{TileKey, TilePos, WorldPos};
use voxmap_render::{
    resolve_all, ChunkColorSource, EntityMarker, MapContext, MapMarker, MarkerContext, MarkerIcon, PlayerMarker, PngCodec,
    SampleTarget, SettingsHandle, WorldMap, WORLDMAP_QUEUE,
};

use crate::canvas::Canvas;
use crate::config::PreviewConfig;
use crate::terrain::{NoiseTerrain, TerrainConfig};

/// Runs the preview described by `config`.
pub fn run(config: &PreviewConfig) -> Result<()> {
    info!("Configuration loaded:");
    info!("  Seed: {}", config.seed);
    info!("  Slice: {}/{}", config.layer, config.level);
    info!("  Output: {}x{} at scale {}", config.width, config.height, config.scale);

    let settings = SettingsHandle::new(config.map.clone());
    let terrain = Arc::new(NoiseTerrain::new(TerrainConfig::with_seed(config.seed), settings.clone()));
    terrain.set_current_layer(config.layer, config.level);
    debug!(sea_level = terrain.config().sea_level, "Terrain ready");
    let center = config.center(terrain.surface_height(config.center_x, config.center_z));
    terrain.set_player(center.chunk());

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;

    let ctx = MapContext::new(Arc::clone(&terrain) as Arc<dyn ChunkColorSource>, settings, &config.cache_dir);
    let mut canvas = Canvas::new(config.width as u32, config.height as u32);

    refresh_tiles(&ctx, config, center.tile());

    let mut map = WorldMap::new(&ctx, config.width, config.height, center, SampleTarget::Current);
    map.change_scale(config.scale - map.scale());

    render_world_map(&ctx, &mut map, &mut canvas, config)?;
    render_tile_view(&ctx, &map, &mut canvas, config, center)?;

    map.close();
    let evicted = ctx.evict_outside(center.tile(), config.tile_radius);
    debug!(evicted, "Trimmed tile cache");
    ctx.shutdown();
    let freed = ctx.begin_frame(&mut canvas);
    debug!(freed, live = canvas.texture_count(), "Textures released");
    Ok(())
}

/// Creates the tiles around `center` and waits until their first refresh
/// has landed on disk.
fn refresh_tiles(ctx: &MapContext, config: &PreviewConfig, center: TilePos) {
    let r = config.tile_radius;
    for dz in -r..=r {
        for dx in -r..=r {
            let pos = TilePos::new(center.x + dx, center.z + dz);
            ctx.tile(TileKey::new(pos, config.layer, config.level));
        }
    }
    ctx.wait_idle();
    info!(tiles = ctx.len(), "Tiles refreshed");
}

fn render_world_map(ctx: &MapContext, map: &mut WorldMap, canvas: &mut Canvas, config: &PreviewConfig) -> Result<()> {
    // The first prepare allocates the raster and schedules the sample.
    map.prepare_texture(canvas);
    ctx.workers().wait_idle(WORLDMAP_QUEUE);
    canvas.clear();
    map.draw(canvas);

    let (w, h) = map.scaled_size();
    info!("World map sampled at {w}x{h} blocks");
    let path = config.output_dir.join("worldmap.png");
    canvas
        .target()
        .snapshot()
        .save_to(&path, &PngCodec)
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn render_tile_view(
    ctx: &MapContext,
    map: &WorldMap,
    canvas: &mut Canvas,
    config: &PreviewConfig,
    player: WorldPos,
) -> Result<()> {
    // The first pass creates any missing tiles; the second draws them
    // once their refresh has finished.
    map.draw_tiles(ctx, canvas);
    ctx.wait_idle();
    canvas.clear();
    map.draw_tiles(ctx, canvas);

    let settings = ctx.settings().snapshot();
    let markers = demo_markers(player);
    let marker_ctx = MarkerContext {
        settings: &settings,
        origin: (0.0, 0.0),
        size: (f64::from(config.width), f64::from(config.height)),
        rotation: 0.0,
    };
    let resolved = resolve_all(&markers, &map.mapping(), &marker_ctx);
    for marker in &resolved {
        if let Some(outline) = marker.outline {
            let t = outline.thickness;
            canvas.fill_square(marker.x - t, marker.y - t, marker.size + 2 * t as i32, outline.color);
        }
        match marker.icon {
            MarkerIcon::Dot { radius } => {
                let d = (2.0 * radius).max(1.0);
                let half = f64::from(marker.size) / 2.0;
                canvas.fill_square(marker.x + half - radius, marker.y + half - radius, d as i32, marker.color);
            },
            MarkerIcon::Head(_) => canvas.fill_square(marker.x, marker.y, marker.size, marker.color),
        }
        if let Some(label) = &marker.label {
            debug!(label, x = marker.x, y = marker.y, "Player marker");
        }
    }
    debug!(shown = resolved.len(), total = markers.len(), "Markers resolved");

    let cursor = map.cursor_block_pos(f64::from(config.width) / 2.0, f64::from(config.height) / 2.0);
    info!("Block under the view center: {}, {}, {}", cursor.x, cursor.y, cursor.z);

    let path = config.output_dir.join("tiles.png");
    canvas
        .target()
        .snapshot()
        .save_to(&path, &PngCodec)
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// A few markers scattered around the player.
fn demo_markers(player: WorldPos) -> Vec<MapMarker> {
    let (px, pz) = (f64::from(player.x), f64::from(player.z));
    let entity = |dx: f64, dz: f64, hostile: bool, tameable: bool, tamed: bool| {
        MapMarker::Entity(EntityMarker {
            x: px + dx,
            z: pz + dz,
            hostile,
            tameable,
            tamed,
            head: None,
        })
    };
    vec![
        entity(24.0, -10.0, true, false, false),
        entity(-30.0, 18.0, false, false, false),
        entity(12.0, 40.0, false, true, true),
        entity(-8.0, -44.0, false, true, false),
        MapMarker::Player(PlayerMarker {
            x: px,
            z: pz,
            name: "player".into(),
            head: None,
        }),
    ]
}
