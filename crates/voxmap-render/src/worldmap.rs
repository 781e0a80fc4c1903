//! Full-screen world map view.
//!
//! Keeps the view state (center, scale, output size) and the display raster
//! the display context uploads. Every resample on the `worldmap` queue fills
//! a raster of its own; only a finished one is handed over, and the next
//! frame publishes it with one [`PixelBuffer::copy_from`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};
use voxmap_common::{ChunkPos, Layer, TileKey, WorldPos, GROUP_SHIFT};

use crate::color::BLACK;
use crate::context::{MapContext, MapEnv};
use crate::display::{Display, Quad, TextureHandle};
use crate::pixel_buffer::PixelBuffer;
use crate::provider::NO_HEIGHT;
use crate::window::{
    compute_centering_shift, compute_scaled_size, compute_window, sample_into, tile_pieces,
    SampleTarget, SampleWindow, ScaledSize, ScreenMapping, MAX_SCALE, MIN_SCALE,
};
use crate::worker::WORLDMAP_QUEUE;

/// Blocks moved per step of [`WorldMap::move_map`].
pub const MOVE_STEP: i32 = 16;

/// Map panning direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards negative z
    North,
    /// Towards positive z
    South,
    /// Towards positive x
    East,
    /// Towards negative x
    West,
}

impl Direction {
    /// Block offset of one step.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -MOVE_STEP),
            Self::South => (0, MOVE_STEP),
            Self::East => (MOVE_STEP, 0),
            Self::West => (-MOVE_STEP, 0),
        }
    }
}

/// A completed resample waiting for the display context.
struct Finished {
    generation: u64,
    raster: PixelBuffer,
}

/// Hand-over point between the worldmap queue and the display context.
#[derive(Default)]
struct Handoff {
    /// Samples of this generation or older are discarded
    dropped: u64,
    frame: Option<Finished>,
}

/// World map view state.
pub struct WorldMap {
    env: Arc<MapEnv>,
    target: SampleTarget,
    width: i32,
    height: i32,
    scale: f64,
    scaled: ScaledSize,
    center: WorldPos,
    tracking: bool,
    update_interval: Duration,
    last_move: Option<Instant>,
    shown: Option<PixelBuffer>,
    generation: Arc<AtomicU64>,
    handoff: Arc<Mutex<Handoff>>,
}

impl std::fmt::Debug for WorldMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldMap")
            .field("size", &(self.width, self.height))
            .field("scale", &self.scale)
            .field("center", &self.center)
            .field("tracking", &self.tracking)
            .finish_non_exhaustive()
    }
}

impl WorldMap {
    /// Opens a `width x height` view centered on the player.
    #[must_use]
    pub fn new(ctx: &MapContext, width: i32, height: i32, player: WorldPos, target: SampleTarget) -> Self {
        let mut map = Self {
            env: Arc::clone(ctx.env()),
            target,
            width,
            height,
            scale: 1.0,
            scaled: compute_scaled_size(width, height, 1.0),
            center: player,
            tracking: true,
            update_interval: Duration::from_millis(10),
            last_move: None,
            shown: None,
            generation: Arc::new(AtomicU64::new(0)),
            handoff: Arc::new(Mutex::new(Handoff::default())),
        };
        map.update_scale();
        map
    }

    /// View center.
    #[must_use]
    pub const fn center(&self) -> WorldPos {
        self.center
    }

    /// Whether the center follows the player.
    #[must_use]
    pub const fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Blocks per output pixel.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Raster size in blocks.
    #[must_use]
    pub const fn scaled_size(&self) -> (i32, i32) {
        (self.scaled.width, self.scaled.height)
    }

    /// Minimum time between two pan steps.
    #[must_use]
    pub const fn update_interval(&self) -> Duration {
        self.update_interval
    }

    fn update_scale(&mut self) {
        self.scaled = compute_scaled_size(self.width, self.height, self.scale);
        self.scale = self.scaled.scale;
        let millis = if self.scale > 1.0 { 10.0 * self.scale } else { 10.0 };
        self.update_interval = Duration::from_millis(millis as u64);
    }

    /// Changes the output size.
    pub fn resize(&mut self, width: i32, height: i32) {
        self.width = width;
        self.height = height;
        self.update_scale();
    }

    /// Zooms by `delta` (positive zooms out), clamped to the scale range.
    pub fn change_scale(&mut self, delta: f64) {
        self.scale = (self.scale + delta).clamp(MIN_SCALE, MAX_SCALE);
        self.update_scale();
    }

    /// Follows the player while tracking.
    pub fn track_player(&mut self, player: WorldPos) {
        if self.tracking && self.center != player {
            self.center = player;
            self.schedule_update();
        }
    }

    /// Recenters on the player and resumes tracking.
    pub fn set_center_by_player(&mut self, player: WorldPos) {
        self.tracking = true;
        self.center = player;
        self.schedule_update();
    }

    /// Pins the view on `pos`.
    pub fn set_center(&mut self, pos: WorldPos) {
        self.tracking = false;
        self.center = pos;
        self.schedule_update();
    }

    fn debounced(&self, now: Instant) -> bool {
        self.last_move
            .is_some_and(|last| now.saturating_duration_since(last) < self.update_interval)
    }

    /// Pans one group towards `direction`. Ignored when called again within
    /// the update interval. Returns whether the view moved.
    pub fn move_map(&mut self, direction: Direction, now: Instant) -> bool {
        if self.debounced(now) {
            return false;
        }
        let (dx, dz) = direction.offset();
        self.center = self.center.offset(dx, 0, dz);
        self.tracking = false;
        self.last_move = Some(now);
        self.schedule_update();
        true
    }

    /// Pans by a mouse drag of `(dx, dy)` output pixels, debounced like
    /// [`move_map`](Self::move_map).
    pub fn drag(&mut self, dx: f64, dy: f64, now: Instant) -> bool {
        if self.debounced(now) {
            return false;
        }
        let step_x = (2.0 * dx * self.scale).round() as i32;
        let step_z = (2.0 * dy * self.scale).round() as i32;
        self.center = self.center.offset(-step_x, 0, -step_z);
        self.tracking = false;
        self.last_move = Some(now);
        self.schedule_update();
        true
    }

    /// Sample window of the current view.
    #[must_use]
    pub fn window(&self) -> SampleWindow {
        compute_window(self.center, self.scaled.width, self.scaled.height)
    }

    /// World/screen conversion of the current view.
    #[must_use]
    pub fn mapping(&self) -> ScreenMapping {
        ScreenMapping::new(self.center, (self.width, self.height), self.scaled)
    }

    /// Pixel correction for positions laid out on the center's group grid.
    #[must_use]
    pub fn shift(&self) -> (f64, f64) {
        compute_centering_shift(self.center, &self.window(), (self.width, self.height))
    }

    /// Resamples the view on the worldmap queue. Does nothing until the
    /// display raster exists; see [`prepare_texture`](Self::prepare_texture).
    ///
    /// A job still queued when a newer one is scheduled is skipped.
    pub fn schedule_update(&self) {
        let Some(shown) = &self.shown else {
            return;
        };
        let (width, height) = (shown.width(), shown.height());
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let latest = Arc::clone(&self.generation);
        let handoff = Arc::clone(&self.handoff);
        let window = self.window();
        let provider = Arc::clone(&self.env.provider);
        let target = self.target;
        self.env.workers.execute(WORLDMAP_QUEUE, move || {
            if latest.load(Ordering::Acquire) != generation {
                trace!(generation, "World map sample superseded");
                return;
            }
            let raster = PixelBuffer::filled(width, height, BLACK);
            sample_into(&raster, &window, provider.as_ref(), target);

            let mut handoff = handoff.lock();
            let newer = handoff.frame.as_ref().map_or(true, |f| f.generation < generation);
            if generation > handoff.dropped && newer {
                handoff.frame = Some(Finished { generation, raster });
            }
        });
    }

    /// Discards every sample scheduled so far, finished or not.
    fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut handoff = self.handoff.lock();
        handoff.dropped = generation;
        handoff.frame = None;
    }

    /// Makes the display raster match the view size, publishes the latest
    /// finished sample and uploads it. Call from the display context.
    pub fn prepare_texture(&mut self, display: &mut dyn Display) -> Option<TextureHandle> {
        let (w, h) = (self.scaled.width.max(1) as u32, self.scaled.height.max(1) as u32);
        let stale = self
            .shown
            .as_ref()
            .map_or(true, |r| r.width() != w || r.height() != h);
        if stale {
            if let Some(old) = self.shown.take() {
                old.release(&self.env.releases);
            }
            self.invalidate();
            debug!(width = w, height = h, "World map raster resized");
            self.shown = Some(PixelBuffer::filled(w, h, BLACK));
            self.schedule_update();
        }

        let shown = self.shown.as_ref()?;
        let finished = self.handoff.lock().frame.take();
        if let Some(frame) = finished {
            if frame.raster.width() == w && frame.raster.height() == h {
                shown.copy_from(&frame.raster);
            }
        }
        shown.upload_if_dirty(display)
    }

    /// Displayed raster, once prepared.
    #[must_use]
    pub const fn raster(&self) -> Option<&PixelBuffer> {
        self.shown.as_ref()
    }

    /// Draws the sampled raster over the whole output.
    pub fn draw(&mut self, display: &mut dyn Display) {
        if let Some(texture) = self.prepare_texture(display) {
            let quad = Quad::full(f64::from(self.width), f64::from(self.height));
            display.draw_quad(&quad, texture);
        }
    }

    /// Draws the view from cached tiles instead of the sampled raster,
    /// requesting a refresh of every visible tile.
    pub fn draw_tiles(&self, ctx: &MapContext, display: &mut dyn Display) {
        let mapping = self.mapping();
        let start_x = (mapping.center_x - mapping.scaled_width / 2.0).floor() as i32;
        let start_z = (mapping.center_z - mapping.scaled_height / 2.0).floor() as i32;
        let (layer, level) = match self.target {
            SampleTarget::Surface => (Layer::Surface, 0),
            SampleTarget::Current => self.env.provider.current_layer(),
        };

        for piece in tile_pieces(start_x, start_z, self.scaled.width + 1, self.scaled.height + 1) {
            let tile = match self.target {
                SampleTarget::Surface => ctx.surface_tile(piece.pos),
                SampleTarget::Current => ctx.tile(TileKey::new(piece.pos, layer, level)),
            };
            tile.request_refresh();
            let (x, y) = mapping.world_to_screen(f64::from(piece.world_x), f64::from(piece.world_z));
            tile.draw(display, x, y, piece.src, self.scale);
        }
    }

    /// Block under an output pixel. Unknown heights fall back to the
    /// center's height.
    #[must_use]
    pub fn cursor_block_pos(&self, px: f64, py: f64) -> WorldPos {
        let (wx, wz) = self.mapping().screen_to_world(px, py);
        let (x, z) = (wx.floor() as i32, wz.floor() as i32);

        let (layer, level) = match self.target {
            SampleTarget::Surface => (Layer::Surface, 0),
            SampleTarget::Current => self.env.provider.current_layer(),
        };
        let group = ChunkPos::new(x >> GROUP_SHIFT, z >> GROUP_SHIFT);
        let (origin_x, origin_z) = group.origin_block();
        let sample = self.env.provider.sample(layer, level, group);
        let y = sample.height(x - origin_x, z - origin_z);
        WorldPos::new(x, if y == NO_HEIGHT { self.center.y } else { y }, z)
    }

    /// Marker icon size for the current zoom.
    #[must_use]
    pub fn icon_size(&self) -> i32 {
        ((10.0 / self.scale) as i32).clamp(6, 10)
    }

    /// Stops sampling and frees the display raster. A sweep already running
    /// finishes on its own; its result is dropped.
    pub fn close(&mut self) {
        self.invalidate();
        if let Some(old) = self.shown.take() {
            old.release(&self.env.releases);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MapSettings;
    use crate::test_support::{context, pattern_color, wait_for_samples, FlatSource, RecordingDisplay};
    use crate::window::SCALE_STEP;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<FlatSource>, MapContext) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source = Arc::new(FlatSource::patterned());
        let ctx = context(&source, MapSettings::default(), temp_dir.path());
        (temp_dir, source, ctx)
    }

    #[test]
    fn test_scale_steps_and_interval() {
        let (_dir, _source, ctx) = setup();
        let mut map = WorldMap::new(&ctx, 400, 300, WorldPos::new(0, 64, 0), SampleTarget::Surface);
        assert_eq!(map.scaled_size(), (400, 300));
        assert_eq!(map.update_interval(), Duration::from_millis(10));

        map.change_scale(SCALE_STEP * 4.0);
        assert!((map.scale() - 2.0).abs() < 1e-9);
        assert_eq!(map.scaled_size(), (800, 600));
        assert_eq!(map.update_interval(), Duration::from_millis(20));

        map.change_scale(10.0);
        assert!((map.scale() - MAX_SCALE).abs() < 1e-9);
        map.change_scale(-10.0);
        assert!((map.scale() - MIN_SCALE).abs() < 1e-9);
        assert_eq!(map.scaled_size(), (200, 150));

        map.resize(1920, 1080);
        map.change_scale(10.0);
        assert_eq!(map.scaled_size().0, crate::window::MAX_SCALED_WIDTH);
    }

    #[test]
    fn test_move_map_is_debounced() {
        let (_dir, _source, ctx) = setup();
        let mut map = WorldMap::new(&ctx, 100, 100, WorldPos::new(0, 64, 0), SampleTarget::Surface);
        let now = Instant::now();

        assert!(map.move_map(Direction::East, now));
        assert_eq!(map.center(), WorldPos::new(16, 64, 0));
        assert!(!map.is_tracking());
        assert!(!map.move_map(Direction::North, now + Duration::from_millis(5)));
        assert!(map.move_map(Direction::North, now + Duration::from_millis(10)));
        assert_eq!(map.center(), WorldPos::new(16, 64, -16));

        map.set_center_by_player(WorldPos::new(1, 2, 3));
        assert!(map.is_tracking());
        map.track_player(WorldPos::new(4, 5, 6));
        assert_eq!(map.center(), WorldPos::new(4, 5, 6));
        map.set_center(WorldPos::new(0, 0, 0));
        map.track_player(WorldPos::new(4, 5, 6));
        assert_eq!(map.center(), WorldPos::new(0, 0, 0));
    }

    #[test]
    fn test_drag_moves_against_pointer() {
        let (_dir, _source, ctx) = setup();
        let mut map = WorldMap::new(&ctx, 100, 100, WorldPos::new(0, 64, 0), SampleTarget::Surface);
        map.change_scale(0.5);
        assert!(map.drag(3.0, -2.0, Instant::now()));
        assert_eq!(map.center(), WorldPos::new(-9, 64, 6));
    }

    #[test]
    fn test_prepare_texture_publishes_sample() {
        let (_dir, source, ctx) = setup();
        let center = WorldPos::new(40, 64, -24);
        let mut map = WorldMap::new(&ctx, 96, 64, center, SampleTarget::Surface);
        let mut display = RecordingDisplay::default();

        // First frame allocates the raster and schedules sampling.
        map.prepare_texture(&mut display);
        ctx.workers().wait_idle(WORLDMAP_QUEUE);
        let texture = map.prepare_texture(&mut display).expect("texture");

        assert_eq!(display.pixel(texture, 48, 32), Some(pattern_color(center.chunk())));
        assert!(source.samples.load(std::sync::atomic::Ordering::SeqCst) > 0);

        map.draw(&mut display);
        let (quad, drawn) = display.quads.last().copied().expect("quad");
        assert_eq!(drawn, texture);
        assert_eq!((quad.w, quad.h), (96.0, 64.0));

        // Resizing reallocates and defers the old textures' release.
        map.resize(50, 50);
        map.prepare_texture(&mut display);
        assert!(ctx.releases().pending() >= 1);
        map.close();
    }

    #[test]
    fn test_unfinished_sample_is_never_published() {
        let (_dir, source, ctx) = setup();
        let old_center = WorldPos::new(40, 64, -24);
        let new_center = old_center.offset(640, 0, 0);
        let mut map = WorldMap::new(&ctx, 96, 64, old_center, SampleTarget::Surface);
        let mut display = RecordingDisplay::default();

        let expected = PixelBuffer::filled(96, 64, BLACK);
        let groups = sample_into(&expected, &map.window(), source.as_ref(), SampleTarget::Surface);

        // The first sample finishes but is not published yet.
        map.prepare_texture(&mut display);
        ctx.workers().wait_idle(WORLDMAP_QUEUE);

        // The next one stalls halfway through its sweep.
        let stall_at = source.samples.load(Ordering::SeqCst) + groups / 2;
        source.stall_after.store(stall_at, Ordering::SeqCst);
        let gate = source.gate.lock();
        map.set_center(new_center);
        wait_for_samples(&source, stall_at + 1);

        let texture = map.prepare_texture(&mut display).expect("texture");
        for y in 0..64 {
            for x in 0..96 {
                assert_eq!(
                    display.pixel(texture, x, y),
                    Some(expected.get_color(x as i32, y as i32)),
                    "pixel ({x}, {y})"
                );
            }
        }

        drop(gate);
        ctx.workers().wait_idle(WORLDMAP_QUEUE);
        let texture = map.prepare_texture(&mut display).expect("texture");
        assert_eq!(display.pixel(texture, 48, 32), Some(pattern_color(new_center.chunk())));
        map.close();
    }

    #[test]
    fn test_queued_samples_are_skipped_when_superseded() {
        let (_dir, source, ctx) = setup();
        let mut map = WorldMap::new(&ctx, 64, 64, WorldPos::new(0, 64, 0), SampleTarget::Surface);
        let mut display = RecordingDisplay::default();
        map.prepare_texture(&mut display);
        ctx.workers().wait_idle(WORLDMAP_QUEUE);
        let per_sweep = source.samples.load(Ordering::SeqCst);

        let gate = source.gate.lock();
        map.set_center(WorldPos::new(96, 64, 0));
        wait_for_samples(&source, per_sweep + 1);
        map.set_center(WorldPos::new(208, 64, 0));
        map.set_center(WorldPos::new(304, 64, 0));
        drop(gate);
        ctx.workers().wait_idle(WORLDMAP_QUEUE);

        // The running sweep and the last one; the middle job did no work.
        let sampled = source.samples.load(Ordering::SeqCst) - per_sweep;
        assert_eq!(sampled, per_sweep * 2);
        let texture = map.prepare_texture(&mut display).expect("texture");
        assert_eq!(
            display.pixel(texture, 32, 32),
            Some(pattern_color(WorldPos::new(304, 64, 0).chunk()))
        );
    }

    #[test]
    fn test_close_does_not_wait_for_running_sample() {
        let (_dir, source, ctx) = setup();
        let mut map = WorldMap::new(&ctx, 64, 64, WorldPos::new(0, 64, 0), SampleTarget::Surface);
        let mut display = RecordingDisplay::default();

        let gate = source.gate.lock();
        map.prepare_texture(&mut display);
        wait_for_samples(&source, 1);
        map.close();
        assert!(map.raster().is_none());
        drop(gate);

        ctx.workers().wait_idle(WORLDMAP_QUEUE);
        assert!(map.handoff.lock().frame.is_none());
        assert!(ctx.workers().names().contains(&WORLDMAP_QUEUE.to_owned()));
    }

    #[test]
    fn test_cursor_block_pos() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source = Arc::new(FlatSource::new(BLACK, 70));
        let ctx = context(&source, MapSettings::default(), temp_dir.path());
        let map = WorldMap::new(&ctx, 200, 100, WorldPos::new(100, 64, 100), SampleTarget::Surface);

        assert_eq!(map.cursor_block_pos(100.0, 50.0), WorldPos::new(100, 70, 100));
        assert_eq!(map.cursor_block_pos(0.0, 0.0), WorldPos::new(0, 70, 50));

        let unknown = Arc::new(FlatSource::new(BLACK, NO_HEIGHT));
        let ctx = context(&unknown, MapSettings::default(), temp_dir.path());
        let map = WorldMap::new(&ctx, 200, 100, WorldPos::new(100, 64, 100), SampleTarget::Surface);
        assert_eq!(map.cursor_block_pos(100.0, 50.0).y, 64);
    }

    #[test]
    fn test_icon_size() {
        let (_dir, _source, ctx) = setup();
        let mut map = WorldMap::new(&ctx, 100, 100, WorldPos::new(0, 0, 0), SampleTarget::Surface);
        assert_eq!(map.icon_size(), 10);
        map.change_scale(0.5);
        assert_eq!(map.icon_size(), 6);
        map.change_scale(-1.0);
        assert_eq!(map.icon_size(), 10);
    }

    #[test]
    fn test_draw_tiles_covers_view() {
        let (_dir, _source, ctx) = setup();
        let map = WorldMap::new(&ctx, 100, 100, WorldPos::new(0, 64, 0), SampleTarget::Surface);
        let mut display = RecordingDisplay::default();

        map.draw_tiles(&ctx, &mut display);
        // The view straddles the four tiles around the origin.
        assert_eq!(ctx.len(), 4);
        ctx.wait_idle();
        map.draw_tiles(&ctx, &mut display);
        assert!(display.quads.len() >= 4);
        let (quad, _) = display.quads[display.quads.len() - 1];
        assert!(quad.x >= 49.0 && quad.x <= 51.0);
    }
}
