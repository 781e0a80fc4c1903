//! Collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use voxmap_common::{ChunkPos, Layer};

use crate::color::argb;
use crate::context::MapContext;
use crate::display::{Display, Quad, TextureHandle};
use crate::provider::{ChunkColorSource, ColumnSample};
use crate::settings::{MapSettings, SettingsHandle};

/// Display that keeps every uploaded raster in memory.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub textures: HashMap<TextureHandle, (u32, u32, Vec<u8>)>,
    pub uploads: usize,
    pub quads: Vec<(Quad, TextureHandle)>,
    pub released: Vec<TextureHandle>,
    next: u32,
}

impl RecordingDisplay {
    /// ARGB color of one pixel of an uploaded raster.
    pub fn pixel(&self, texture: TextureHandle, x: u32, y: u32) -> Option<i32> {
        let (w, h, bytes) = self.textures.get(&texture)?;
        if x >= *w || y >= *h {
            return None;
        }
        let i = ((y * w + x) * 4) as usize;
        let px = bytes.get(i..i + 4)?;
        Some(argb(px[0], px[3], px[2], px[1]))
    }
}

impl Display for RecordingDisplay {
    fn upload_raster(
        &mut self,
        existing: Option<TextureHandle>,
        width: u32,
        height: u32,
        abgr: &[u8],
    ) -> TextureHandle {
        let handle = existing.unwrap_or_else(|| {
            self.next += 1;
            TextureHandle(self.next)
        });
        self.textures.insert(handle, (width, height, abgr.to_vec()));
        self.uploads += 1;
        handle
    }

    fn draw_quad(&mut self, quad: &Quad, texture: TextureHandle) {
        self.quads.push((*quad, texture));
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.released.push(texture);
    }
}

/// Color used by [`FlatSource`] in pattern mode.
pub fn pattern_color(pos: ChunkPos) -> i32 {
    argb(0xFF, pos.x as u8, pos.z as u8, 0x80)
}

/// Chunk source reporting the same data for every group.
#[derive(Debug)]
pub struct FlatSource {
    pub color: i32,
    pub height: i32,
    /// Color each group with [`pattern_color`] instead of `color`
    pub pattern: bool,
    pub loaded: AtomicBool,
    pub feature: AtomicBool,
    /// Returned by `update`
    pub changed: AtomicBool,
    pub current: Mutex<(Layer, i32)>,
    pub samples: AtomicUsize,
    pub updates: AtomicUsize,
    pub forced: AtomicUsize,
    pub sampled: Mutex<HashSet<(Layer, i32)>>,
    /// Held by a test to stall `sample` calls
    pub gate: Mutex<()>,
    /// Calls to `sample` before this many have been made skip the gate
    pub stall_after: AtomicUsize,
}

impl FlatSource {
    pub fn new(color: i32, height: i32) -> Self {
        Self {
            color,
            height,
            pattern: false,
            loaded: AtomicBool::new(false),
            feature: AtomicBool::new(false),
            changed: AtomicBool::new(false),
            current: Mutex::new((Layer::Surface, 0)),
            samples: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            forced: AtomicUsize::new(0),
            sampled: Mutex::new(HashSet::new()),
            gate: Mutex::new(()),
            stall_after: AtomicUsize::new(0),
        }
    }

    pub fn patterned() -> Self {
        Self {
            pattern: true,
            ..Self::new(0, 64)
        }
    }
}

impl ChunkColorSource for FlatSource {
    fn sample(&self, layer: Layer, level: i32, pos: ChunkPos) -> ColumnSample {
        let call = self.samples.fetch_add(1, Ordering::SeqCst);
        if call >= self.stall_after.load(Ordering::SeqCst) {
            drop(self.gate.lock());
        }
        self.sampled.lock().insert((layer, level));
        let color = if self.pattern { pattern_color(pos) } else { self.color };
        let mut sample = ColumnSample::uniform(pos, color, self.height);
        sample.loaded = self.loaded.load(Ordering::SeqCst);
        sample.feature = self.feature.load(Ordering::SeqCst);
        sample
    }

    fn update(&self, _layer: Layer, _level: i32, _pos: ChunkPos, force_full: bool) -> bool {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if force_full {
            self.forced.fetch_add(1, Ordering::SeqCst);
        }
        self.changed.load(Ordering::SeqCst)
    }

    fn current_layer(&self) -> (Layer, i32) {
        *self.current.lock()
    }
}

/// Spins until `source` has seen at least `count` `sample` calls.
pub fn wait_for_samples(source: &FlatSource, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while source.samples.load(Ordering::SeqCst) < count {
        assert!(Instant::now() < deadline, "source stuck below {count} samples");
        std::thread::yield_now();
    }
}

/// Map context over `source` caching into `dir`.
pub fn context(source: &Arc<FlatSource>, settings: MapSettings, dir: &Path) -> MapContext {
    let provider: Arc<dyn ChunkColorSource> = Arc::clone(source) as Arc<dyn ChunkColorSource>;
    MapContext::new(provider, SettingsHandle::new(settings), dir)
}
