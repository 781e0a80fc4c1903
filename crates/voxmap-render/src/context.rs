//! Map session context.
//!
//! [`MapContext`] owns everything a map session shares: the tile registry,
//! the worker queues, the deferred texture release queue and the disk cache
//! location. It is constructed explicitly by the host and handed to whatever
//! needs it; dropping it stops the workers and releases every tile.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};
use voxmap_common::{Layer, TileKey, TilePos};

use crate::codec::{PngCodec, RasterCodec};
use crate::display::{Display, ReleaseQueue};
use crate::provider::ChunkColorSource;
use crate::settings::SettingsHandle;
use crate::tile::MapTile;
use crate::worker::{WorkerPool, IO_QUEUE, REGION_QUEUE};

/// Collaborators shared by every tile of a session.
pub struct MapEnv {
    /// Column group colors
    pub provider: Arc<dyn ChunkColorSource>,
    /// Live settings
    pub settings: SettingsHandle,
    /// Background queues
    pub workers: WorkerPool,
    /// Texture deletions waiting for the display context
    pub releases: ReleaseQueue,
    /// Tile image codec
    pub codec: Arc<dyn RasterCodec>,
    /// Root of the tile image cache
    pub cache_dir: PathBuf,
}

impl std::fmt::Debug for MapEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapEnv")
            .field("workers", &self.workers)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

/// Registry slot. Surface-only tiles get their own slot so they never
/// share a tile with the layered surface tile at the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Layered(TileKey),
    SurfaceOnly(TilePos),
}

impl Slot {
    const fn key(self) -> TileKey {
        match self {
            Self::Layered(key) => key,
            Self::SurfaceOnly(pos) => TileKey::new(pos, Layer::Surface, 0),
        }
    }

    const fn surface_only(self) -> bool {
        matches!(self, Self::SurfaceOnly(_))
    }
}

/// Tile registry of one map session.
#[derive(Debug)]
pub struct MapContext {
    env: Arc<MapEnv>,
    tiles: DashMap<Slot, Arc<MapTile>>,
}

impl MapContext {
    /// Creates a context caching PNG tile images under `cache_dir`.
    pub fn new(
        provider: Arc<dyn ChunkColorSource>,
        settings: SettingsHandle,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::with_codec(provider, settings, cache_dir, Arc::new(PngCodec))
    }

    /// Creates a context with a custom tile image codec.
    pub fn with_codec(
        provider: Arc<dyn ChunkColorSource>,
        settings: SettingsHandle,
        cache_dir: impl Into<PathBuf>,
        codec: Arc<dyn RasterCodec>,
    ) -> Self {
        let cache_dir = cache_dir.into();
        info!("Map cache at {}", cache_dir.display());
        Self {
            env: Arc::new(MapEnv {
                provider,
                settings,
                workers: WorkerPool::new(),
                releases: ReleaseQueue::new(),
                codec,
                cache_dir,
            }),
            tiles: DashMap::new(),
        }
    }

    /// Shared collaborators.
    #[must_use]
    pub const fn env(&self) -> &Arc<MapEnv> {
        &self.env
    }

    /// Live settings.
    #[must_use]
    pub fn settings(&self) -> &SettingsHandle {
        &self.env.settings
    }

    /// Background queues.
    #[must_use]
    pub fn workers(&self) -> &WorkerPool {
        &self.env.workers
    }

    /// Deferred texture releases.
    #[must_use]
    pub fn releases(&self) -> &ReleaseQueue {
        &self.env.releases
    }

    /// Tile for `key`, created and refreshed on first use.
    pub fn tile(&self, key: TileKey) -> Arc<MapTile> {
        self.get_or_create(Slot::Layered(key))
    }

    /// Surface-only tile at `pos`. It keeps showing the surface whatever
    /// layer the host is on.
    pub fn surface_tile(&self, pos: TilePos) -> Arc<MapTile> {
        self.get_or_create(Slot::SurfaceOnly(pos))
    }

    fn get_or_create(&self, slot: Slot) -> Arc<MapTile> {
        if let Some(tile) = self.tiles.get(&slot) {
            return Arc::clone(tile.value());
        }

        // Loading the cached image happens outside the registry lock.
        let key = slot.key();
        let fresh = Arc::new(MapTile::new(key, slot.surface_only(), Arc::clone(&self.env)));
        let tile = match self.tiles.entry(slot) {
            Entry::Occupied(entry) => {
                fresh.release();
                return Arc::clone(entry.get());
            },
            Entry::Vacant(entry) => Arc::clone(entry.insert(fresh).value()),
        };
        debug!(tile = %key, surface_only = slot.surface_only(), "Tile created");
        tile.request_refresh();
        tile
    }

    /// Tile for `key` if it is cached.
    #[must_use]
    pub fn get(&self, key: &TileKey) -> Option<Arc<MapTile>> {
        self.tiles.get(&Slot::Layered(*key)).map(|t| Arc::clone(t.value()))
    }

    /// Surface-only tile at `pos` if it is cached.
    #[must_use]
    pub fn get_surface(&self, pos: TilePos) -> Option<Arc<MapTile>> {
        self.tiles.get(&Slot::SurfaceOnly(pos)).map(|t| Arc::clone(t.value()))
    }

    /// Removes and releases the tile for `key`. Returns whether it existed.
    pub fn evict(&self, key: &TileKey) -> bool {
        self.evict_slot(&Slot::Layered(*key))
    }

    fn evict_slot(&self, slot: &Slot) -> bool {
        match self.tiles.remove(slot) {
            Some((_, tile)) => {
                tile.release();
                true
            },
            None => false,
        }
    }

    /// Evicts every tile farther than `radius` tiles from `center`.
    /// Returns how many were evicted.
    pub fn evict_outside(&self, center: TilePos, radius: i32) -> usize {
        let far: Vec<Slot> = self
            .tiles
            .iter()
            .filter(|e| e.key().key().pos.distance(center) > radius)
            .map(|e| *e.key())
            .collect();
        let evicted = far.iter().filter(|slot| self.evict_slot(slot)).count();
        if evicted > 0 {
            debug!(evicted, "Evicted distant tiles");
        }
        evicted
    }

    /// Moves the tile at `key` to another slice and re-keys it. When a tile
    /// for the target slice already exists, that one is kept and the old one
    /// released.
    pub fn swap_layer(&self, key: &TileKey, layer: Layer, level: i32) -> Option<Arc<MapTile>> {
        let target = key.with_layer(layer, level);
        if target == *key {
            return self.get(key);
        }
        let (_, tile) = self.tiles.remove(&Slot::Layered(*key))?;
        let kept = match self.tiles.entry(Slot::Layered(target)) {
            Entry::Occupied(entry) => {
                tile.release();
                return Some(Arc::clone(entry.get()));
            },
            Entry::Vacant(entry) => Arc::clone(entry.insert(tile).value()),
        };
        kept.swap_layer(layer, level);
        Some(kept)
    }

    /// Number of cached tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether no tile is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Keys of the cached tiles. A surface-only tile reports the surface
    /// key of its position.
    #[must_use]
    pub fn keys(&self) -> Vec<TileKey> {
        self.tiles.iter().map(|e| e.key().key()).collect()
    }

    /// Frees texture deletions queued since the last frame. Call once per
    /// frame from the display context.
    pub fn begin_frame(&self, display: &mut dyn Display) -> usize {
        self.env.releases.drain(display)
    }

    /// Blocks until every refresh and disk write submitted so far is done.
    pub fn wait_idle(&self) {
        self.env.workers.wait_idle(REGION_QUEUE);
        self.env.workers.wait_idle(IO_QUEUE);
    }

    /// Releases every tile and stops the workers. Idempotent.
    pub fn shutdown(&self) {
        let slots: Vec<Slot> = self.tiles.iter().map(|e| *e.key()).collect();
        for slot in &slots {
            self.evict_slot(slot);
        }
        self.env.workers.shutdown();
        if !slots.is_empty() {
            debug!(tiles = slots.len(), "Map context shut down");
        }
    }
}

impl Drop for MapContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
