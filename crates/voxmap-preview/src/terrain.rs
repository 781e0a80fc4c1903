//! Procedural terrain for the preview.
//!
//! A heightmap from two Perlin octaves, a flat sea and noise-carved caves.
//! [`NoiseTerrain`] is both the block view the height sampler scans and the
//! color source the map samples.

use dashmap::DashSet;
use noise::{NoiseFn, Perlin};
use parking_lot::Mutex;
use voxmap_common::{ChunkPos, Layer};
use voxmap_render::color::{argb, shade, UNKNOWN};
use voxmap_render::{
    apply_relief, BlockKind, BlockView, ChunkColorSource, ColumnSample, HeightSampler, MapSettings,
    SettingsHandle, NO_HEIGHT,
};

/// Groups around the player that count as loaded.
pub const LOADED_RADIUS: i32 = 8;

/// Terrain generator configuration.
#[derive(Debug, Clone)]
pub struct TerrainConfig {
    /// Noise seed
    pub seed: u32,
    /// Terrain scale (larger = smoother)
    pub terrain_scale: f64,
    /// Height scale
    pub height_scale: f64,
    /// Mean surface height
    pub base_height: i32,
    /// Water fills every column up to this height
    pub sea_level: i32,
    /// Cave noise above this is carved out
    pub cave_threshold: f64,
    /// Blocks from the bottom of the world to the top
    pub world_height: i32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            terrain_scale: 200.0,
            height_scale: 40.0,
            base_height: 64,
            sea_level: 62,
            cave_threshold: 0.55,
            world_height: 256,
        }
    }
}

impl TerrainConfig {
    /// Default terrain with another seed.
    #[must_use]
    pub fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }
}

struct Palette {
    water: i32,
    sand: i32,
    grass: i32,
    stone: i32,
    snow: i32,
    plant: i32,
    kelp: i32,
}

const STANDARD: Palette = Palette {
    water: argb(0xFF, 0x40, 0x40, 0xFF),
    sand: argb(0xFF, 0xF7, 0xE9, 0xA3),
    grass: argb(0xFF, 0x7F, 0xB2, 0x38),
    stone: argb(0xFF, 0x70, 0x70, 0x70),
    snow: argb(0xFF, 0xFF, 0xFF, 0xFF),
    plant: argb(0xFF, 0x00, 0x7C, 0x00),
    kelp: argb(0xFF, 0x2A, 0x6E, 0x5A),
};

const VIVID: Palette = Palette {
    water: argb(0xFF, 0x3F, 0x76, 0xE4),
    sand: argb(0xFF, 0xDB, 0xD3, 0xA0),
    grass: argb(0xFF, 0x59, 0xAE, 0x30),
    stone: argb(0xFF, 0x7D, 0x7D, 0x7D),
    snow: argb(0xFF, 0xF0, 0xFB, 0xFB),
    plant: argb(0xFF, 0x3C, 0x8A, 0x1E),
    kelp: argb(0xFF, 0x1F, 0x7A, 0x68),
};

/// Noise-generated world.
pub struct NoiseTerrain {
    config: TerrainConfig,
    terrain_noise: Perlin,
    detail_noise: Perlin,
    cave_noise: Perlin,
    settings: SettingsHandle,
    current: Mutex<(Layer, i32)>,
    player: Mutex<ChunkPos>,
    seen: DashSet<(Layer, i32, ChunkPos)>,
}

impl NoiseTerrain {
    /// Creates a terrain reading its color toggles from `settings`.
    #[must_use]
    pub fn new(config: TerrainConfig, settings: SettingsHandle) -> Self {
        let terrain_noise = Perlin::new(config.seed);
        let detail_noise = Perlin::new(config.seed.wrapping_add(1));
        let cave_noise = Perlin::new(config.seed.wrapping_add(2));

        Self {
            config,
            terrain_noise,
            detail_noise,
            cave_noise,
            settings,
            current: Mutex::new((Layer::Surface, 0)),
            player: Mutex::new(ChunkPos::default()),
            seen: DashSet::new(),
        }
    }

    /// Returns the generator configuration.
    #[must_use]
    pub const fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Slice reported as the one the host is showing.
    pub fn set_current_layer(&self, layer: Layer, level: i32) {
        *self.current.lock() = (layer, level);
    }

    /// Group the player stands in; groups near it count as loaded.
    pub fn set_player(&self, pos: ChunkPos) {
        *self.player.lock() = pos;
    }

    /// Height of the topmost solid block of a column.
    #[must_use]
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let wx = f64::from(x) / self.config.terrain_scale;
        let wz = f64::from(z) / self.config.terrain_scale;

        let height = self.terrain_noise.get([wx, wz]);
        let detail = self.detail_noise.get([wx * 4.0, wz * 4.0]) * 0.15;
        let h = f64::from(self.config.base_height) + (height + detail) * self.config.height_scale;
        (h.round() as i32).clamp(1, self.config.world_height - 2)
    }

    fn plant_noise(&self, x: i32, z: i32) -> f64 {
        self.detail_noise
            .get([f64::from(x) * 0.37 + 1000.5, f64::from(z) * 0.37 - 400.5])
    }

    fn is_cave(&self, x: i32, y: i32, z: i32, surface: i32) -> bool {
        // Keep a roof and a floor.
        if y <= 0 || y >= surface - 4 {
            return false;
        }
        let p = [f64::from(x) / 24.0, f64::from(y) / 16.0, f64::from(z) / 24.0];
        self.cave_noise.get(p) > self.config.cave_threshold
    }

    fn has_feature(&self, pos: ChunkPos) -> bool {
        let mut h = (i64::from(pos.x).wrapping_mul(0x4F9F_ECB5) ^ i64::from(pos.z).wrapping_mul(0x1EF1_565B))
            as u64
            ^ u64::from(self.config.seed);
        h ^= h >> 33;
        h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
        h ^= h >> 33;
        h % 10 == 0
    }

    fn is_loaded(&self, pos: ChunkPos) -> bool {
        let player = *self.player.lock();
        (pos.x - player.x).abs() <= LOADED_RADIUS && (pos.z - player.z).abs() <= LOADED_RADIUS
    }

    /// Color of the block at a resolved surface height.
    fn color_at(&self, x: i32, y: i32, z: i32, settings: &MapSettings) -> i32 {
        let palette = if settings.alternate_color_mode {
            &VIVID
        } else {
            &STANDARD
        };
        match self.block(x, y, z) {
            BlockKind::Liquid => {
                if settings.effective_water_tint() {
                    let depth = y - self.surface_height(x, z);
                    shade(palette.water, -(depth / 3).min(8))
                } else {
                    palette.water
                }
            },
            BlockKind::SubmergedPlant => palette.kelp,
            BlockKind::Plant => palette.plant,
            BlockKind::Air => UNKNOWN,
            BlockKind::Solid => {
                let sea = self.config.sea_level;
                if y < self.surface_height(x, z) - 3 {
                    palette.stone
                } else if y <= sea + 1 {
                    palette.sand
                } else if y > sea + 60 {
                    palette.snow
                } else if y > sea + 35 {
                    palette.stone
                } else {
                    palette.grass
                }
            },
        }
    }

    /// Colors and heights of a group before relief shading.
    fn raw_sample(&self, layer: Layer, level: i32, pos: ChunkPos, settings: &MapSettings) -> ColumnSample {
        let sampler = HeightSampler::new(self, layer, level);
        let start_y = if layer.is_sliced() {
            (level + 1) * layer.slice_height() - 1
        } else {
            self.config.world_height - 1
        };
        let allow_liquids = !settings.hide_water;
        let allow_plants = !settings.ignore_plants;

        let mut sample = ColumnSample::unknown(pos);
        let (ox, oz) = pos.origin_block();
        for lz in 0..16 {
            for lx in 0..16 {
                let (x, z) = (ox + lx, oz + lz);
                let y = sampler.resolve_surface_height(x, start_y, z, allow_liquids, allow_plants);
                if y == NO_HEIGHT {
                    continue;
                }
                let i = ChunkPos::local_index(lx, lz);
                sample.heights[i] = y;
                sample.colors[i] = self.color_at(x, y, z, settings);
            }
        }
        sample.loaded = self.is_loaded(pos);
        sample.feature = self.has_feature(pos);
        sample
    }
}

impl BlockView for NoiseTerrain {
    fn block(&self, x: i32, y: i32, z: i32) -> BlockKind {
        if y < 0 || y >= self.config.world_height {
            return BlockKind::Air;
        }
        let surface = self.surface_height(x, z);
        let sea = self.config.sea_level;

        if y <= surface {
            return if self.is_cave(x, y, z, surface) {
                BlockKind::Air
            } else {
                BlockKind::Solid
            };
        }
        if y == surface + 1 {
            let plant = self.plant_noise(x, z);
            if surface < sea && plant < -0.4 {
                return BlockKind::SubmergedPlant;
            }
            if surface >= sea && plant > 0.35 {
                return BlockKind::Plant;
            }
        }
        if y <= sea {
            BlockKind::Liquid
        } else {
            BlockKind::Air
        }
    }
}

impl ChunkColorSource for NoiseTerrain {
    fn sample(&self, layer: Layer, level: i32, pos: ChunkPos) -> ColumnSample {
        let settings = self.settings.snapshot();
        let mut sample = self.raw_sample(layer, level, pos, &settings);
        if settings.terrain_shade_strength > 0 {
            let east = self.raw_sample(layer, level, ChunkPos::new(pos.x + 1, pos.z), &settings);
            let south = self.raw_sample(layer, level, ChunkPos::new(pos.x, pos.z - 1), &settings);
            let sampler = HeightSampler::new(self, layer, level);
            apply_relief(&sampler, &mut sample, &east, &south, &settings);
        }
        sample
    }

    fn update(&self, layer: Layer, level: i32, pos: ChunkPos, force_full: bool) -> bool {
        let fresh = self.seen.insert((layer, level, pos));
        fresh || force_full
    }

    fn current_layer(&self) -> (Layer, i32) {
        *self.current.lock()
    }
}
