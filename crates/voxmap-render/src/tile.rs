//! Cached 512x512 map tiles.
//!
//! A [`MapTile`] owns three rasters. Refresh jobs write the `base` image and
//! the `overlay` on a worker thread; once a sweep is finished the result is
//! published into `composite`, which is the only buffer the display path
//! reads. Refresh work is gated by a [`TileState`] and driven by
//! [`RenderParams`], so a tile has at most one job in flight and only
//! resamples what a settings change invalidated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use voxmap_common::{ChunkPos, Layer, TileKey, TilePos, GROUP_SHIFT, GROUP_SIZE, TILE_SIZE};

use crate::codec::tile_image_path;
use crate::color::{BLACK, FEATURE_OVERLAY, GRID, LOADED_OVERLAY, TRANSPARENT};
use crate::context::MapEnv;
use crate::display::{Display, Quad};
use crate::pixel_buffer::{PixelBuffer, PixelRect};
use crate::provider::ColumnSample;
use crate::state::{RenderParams, TileState};
use crate::worker::{IO_QUEUE, REGION_QUEUE};

const TILE_PIXELS: u32 = TILE_SIZE as u32;

/// Overlay toggles of one sweep.
#[derive(Debug, Clone, Copy)]
struct OverlayFlags {
    grid: bool,
    loaded: bool,
    feature: bool,
}

/// One cached tile.
pub struct MapTile {
    pos: TilePos,
    surface_only: bool,
    slice: Mutex<(Layer, i32)>,
    base: PixelBuffer,
    overlay: PixelBuffer,
    composite: PixelBuffer,
    state: Mutex<TileState>,
    params: Mutex<RenderParams>,
    alive: AtomicBool,
    updated_at: Mutex<Option<Instant>>,
    env: Arc<MapEnv>,
}

impl std::fmt::Debug for MapTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapTile")
            .field("key", &self.key())
            .field("surface_only", &self.surface_only)
            .field("state", &self.state())
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl MapTile {
    /// Creates the tile and loads its cached image. A tile without a cached
    /// image resamples every group on its first refresh.
    ///
    /// No refresh is started; see [`request_refresh`](Self::request_refresh).
    #[must_use]
    pub fn new(key: TileKey, surface_only: bool, env: Arc<MapEnv>) -> Self {
        let settings = env.settings.snapshot();
        let tile = Self {
            pos: key.pos,
            surface_only,
            slice: Mutex::new((key.layer, key.level)),
            base: PixelBuffer::filled(TILE_PIXELS, TILE_PIXELS, BLACK),
            overlay: PixelBuffer::filled(TILE_PIXELS, TILE_PIXELS, TRANSPARENT),
            composite: PixelBuffer::filled(TILE_PIXELS, TILE_PIXELS, BLACK),
            state: Mutex::new(TileState::Clean),
            params: Mutex::new(RenderParams::new(&settings)),
            alive: AtomicBool::new(true),
            updated_at: Mutex::new(None),
            env,
        };
        if !tile.load_image(key) {
            tile.params.lock().needs_full_refresh = true;
        }
        tile
    }

    /// Current key.
    #[must_use]
    pub fn key(&self) -> TileKey {
        let (layer, level) = *self.slice.lock();
        TileKey::new(self.pos, layer, level)
    }

    /// Tile position.
    #[must_use]
    pub const fn pos(&self) -> TilePos {
        self.pos
    }

    /// Whether the tile always shows the surface.
    #[must_use]
    pub const fn surface_only(&self) -> bool {
        self.surface_only
    }

    /// Refresh state.
    #[must_use]
    pub fn state(&self) -> TileState {
        *self.state.lock()
    }

    /// Whether a refresh is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// False once released.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Refresh flags and applied settings.
    #[must_use]
    pub fn params(&self) -> RenderParams {
        self.params.lock().clone()
    }

    /// When the last refresh finished.
    #[must_use]
    pub fn updated_at(&self) -> Option<Instant> {
        *self.updated_at.lock()
    }

    /// Sampled image.
    #[must_use]
    pub const fn base(&self) -> &PixelBuffer {
        &self.base
    }

    /// Grid and highlight overlay.
    #[must_use]
    pub const fn overlay(&self) -> &PixelBuffer {
        &self.overlay
    }

    /// Base with the overlay applied, as displayed.
    #[must_use]
    pub const fn composite(&self) -> &PixelBuffer {
        &self.composite
    }

    /// Layer actually sampled for `key`.
    fn source_slice(&self, key: TileKey) -> (Layer, i32) {
        if self.surface_only {
            (Layer::Surface, 0)
        } else {
            (key.layer, key.level)
        }
    }

    /// Loads the cached base image for `key` and republishes the composite.
    /// Returns whether an image was found.
    fn load_image(&self, key: TileKey) -> bool {
        let path = tile_image_path(&self.env.cache_dir, &key, self.surface_only);
        let loaded = self.base.load_from_disk(&path, self.env.codec.as_ref());
        self.composite.compose(&self.base, &self.overlay);
        self.base.clear_dirty();
        self.overlay.clear_dirty();
        loaded
    }

    /// Schedules a refresh on the region queue.
    ///
    /// Dropped while a refresh is in flight: the running job reads the
    /// settings again when it starts. Returns whether a job was submitted.
    pub fn request_refresh(self: &Arc<Self>) -> bool {
        if !self.is_alive() {
            return false;
        }
        {
            let mut state = self.state.lock();
            let Some(next) = state.begin_refresh() else {
                return false;
            };
            *state = next;
        }
        self.params.lock().observe(&self.env.settings.snapshot());

        let tile = Arc::clone(self);
        if self.env.workers.execute(REGION_QUEUE, move || tile.refresh()) {
            true
        } else {
            *self.state.lock() = TileState::Clean;
            false
        }
    }

    fn refresh(self: &Arc<Self>) {
        let settings = self.env.settings.snapshot();
        let key = self.key();
        let (full, overlay_pass, overlay) = {
            let mut params = self.params.lock();
            params.observe(&settings);
            let overlay = OverlayFlags {
                grid: params.show_grid(),
                loaded: params.show_loaded_overlay(),
                feature: params.show_feature_overlay(),
            };
            (params.needs_full_refresh, params.overlay_pass(), overlay)
        };

        let provider = &self.env.provider;
        let (layer, level) = self.source_slice(key);
        let can_update = !self.surface_only || provider.current_layer().0 == Layer::Surface;
        let (origin_x, origin_z) = key.pos.origin_block();

        let mut base_changed = false;
        let mut overlay_changed = false;
        let mut superseded = false;
        'sweep: for x in (0..TILE_SIZE).step_by(GROUP_SIZE as usize) {
            let chunk_x = (origin_x + x) >> GROUP_SHIFT;
            for y in (0..TILE_SIZE).step_by(GROUP_SIZE as usize) {
                if !self.is_alive() || self.key() != key {
                    superseded = true;
                    break 'sweep;
                }
                let chunk = ChunkPos::new(chunk_x, (origin_z + y) >> GROUP_SHIFT);
                let changed = can_update && provider.update(layer, level, chunk, full);
                let sample = provider.sample(layer, level, chunk);
                if full || changed {
                    self.base.write_chunk_data(x, y, &sample.colors);
                    base_changed = true;
                }
                if overlay_pass {
                    self.paint_overlay_cell(x, y, &sample, overlay);
                    overlay_changed = true;
                }
            }
        }

        // Publishing holds the slice lock, so a layer swap lands either
        // before this check or after the tile is clean again.
        let slice = self.slice.lock();
        if superseded || !self.is_alive() || *slice != (key.layer, key.level) {
            drop(slice);
            self.restart(key);
            return;
        }

        let settled = {
            let mut state = self.state.lock();
            *state = state.settle(base_changed, overlay_changed);
            *state
        };
        if settled.persists_base() {
            self.persist(key);
        }
        if settled.needs_recomposite() {
            self.composite.compose(&self.base, &self.overlay);
            self.base.clear_dirty();
            self.overlay.clear_dirty();
        }
        self.params.lock().clear_flags();
        *self.updated_at.lock() = Some(Instant::now());
        trace!(tile = %key, full, base_changed, overlay_changed, "Tile refreshed");

        let mut state = self.state.lock();
        *state = state.recomposited();
        drop(state);
        drop(slice);
    }

    /// Ends a superseded refresh without publishing anything and requeues
    /// the tile unless it was released.
    fn restart(self: &Arc<Self>, key: TileKey) {
        *self.state.lock() = TileState::Clean;
        if self.is_alive() {
            debug!(tile = %key, "Layer swapped during refresh, restarting");
            self.request_refresh();
        } else {
            trace!(tile = %key, "Released during refresh");
        }
    }

    /// Paints one 16x16 overlay cell. Later layers cover earlier ones.
    fn paint_overlay_cell(&self, x: i32, y: i32, sample: &ColumnSample, flags: OverlayFlags) {
        let cell = PixelRect::new(x, y, GROUP_SIZE, GROUP_SIZE);
        self.overlay.fill(cell, TRANSPARENT);
        if flags.loaded && sample.loaded {
            self.overlay.fill(cell, LOADED_OVERLAY);
        }
        if flags.feature && sample.feature {
            self.overlay.fill(cell, FEATURE_OVERLAY);
        }
        if flags.grid {
            self.overlay.fill(PixelRect::new(x, y, GROUP_SIZE, 1), GRID);
            self.overlay.fill(PixelRect::new(x, y, 1, GROUP_SIZE), GRID);
        }
    }

    /// Writes a snapshot of the base image on the io queue.
    fn persist(&self, key: TileKey) {
        if !self.is_alive() {
            return;
        }
        let snapshot = self.base.snapshot();
        if snapshot.is_empty() {
            return;
        }
        let path = tile_image_path(&self.env.cache_dir, &key, self.surface_only);
        let codec = Arc::clone(&self.env.codec);
        self.env.workers.execute(IO_QUEUE, move || {
            if let Err(e) = snapshot.save_to(&path, codec.as_ref()) {
                warn!(tile = %key, path = %path.display(), "Can't save tile image: {e}");
            }
        });
    }

    /// Draws the `src` rectangle of the tile with its top-left corner at
    /// `(dest_x, dest_y)`, shrunk by `scale`.
    pub fn draw(&self, display: &mut dyn Display, dest_x: f64, dest_y: f64, src: PixelRect, scale: f64) {
        if src.width <= 0 || src.height <= 0 || scale <= 0.0 {
            return;
        }
        let Some(texture) = self.composite.upload_if_dirty(display) else {
            return;
        };

        let size = TILE_SIZE as f32;
        let quad = Quad {
            x: dest_x,
            y: dest_y,
            w: f64::from(src.width) / scale,
            h: f64::from(src.height) / scale,
            u1: src.x as f32 / size,
            v1: src.y as f32 / size,
            u2: (src.x + src.width) as f32 / size,
            v2: (src.y + src.height) as f32 / size,
            filter: self.env.settings.snapshot().texture_filter,
        };
        display.draw_quad(&quad, texture);
    }

    /// Switches the tile to another slice: the base image is reset and
    /// reloaded from that slice's cache, then fully resampled.
    ///
    /// A refresh still running for the old slice is discarded and restarted.
    pub fn swap_layer(self: &Arc<Self>, layer: Layer, level: i32) {
        let key = TileKey::new(self.pos, layer, level);
        {
            let mut slice = self.slice.lock();
            if *slice == (layer, level) {
                return;
            }
            *slice = (layer, level);
            self.base.fill_all(BLACK);
            self.load_image(key);
            self.params.lock().needs_full_refresh = true;
        }
        debug!(tile = %key, "Swapped layer");
        self.request_refresh();
    }

    /// Stops refresh work and frees all three rasters. Idempotent.
    pub fn release(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        self.base.release(&self.env.releases);
        self.overlay.release(&self.env.releases);
        self.composite.release(&self.env.releases);
        trace!(tile = %self.key(), "Tile released");
    }
}
