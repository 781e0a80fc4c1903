//! Preview configuration.
//!
//! Everything the preview needs to know about what to render and where to
//! put it. Loaded from a TOML file; the `[map]` table holds the
//! [`MapSettings`] handed to the renderer.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use voxmap_common::{Layer, WorldPos};
use voxmap_render::window::{MAX_SCALE, MIN_SCALE};
use voxmap_render::MapSettings;

/// Configuration file name.
pub const CONFIG_FILE: &str = "voxmap.toml";

/// Preview configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    // === World Settings ===
    /// Terrain noise seed
    pub seed: u32,
    /// Block the views are centered on
    pub center_x: i32,
    /// Block the views are centered on
    pub center_z: i32,
    /// Slice to render
    pub layer: Layer,
    /// Level within the layer
    pub level: i32,

    // === Output Settings ===
    /// Output width in pixels
    pub width: i32,
    /// Output height in pixels
    pub height: i32,
    /// Blocks per output pixel
    pub scale: f64,
    /// Tiles rendered around the center tile in each direction
    pub tile_radius: i32,
    /// Tile image cache
    pub cache_dir: PathBuf,
    /// Where the PNG previews are written
    pub output_dir: PathBuf,

    // === Map Settings ===
    /// Renderer settings
    pub map: MapSettings,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            // World
            seed: 42,
            center_x: 0,
            center_z: 0,
            layer: Layer::Surface,
            level: 0,

            // Output
            width: 640,
            height: 480,
            scale: 1.0,
            tile_radius: 1,
            cache_dir: PathBuf::from("voxmap-cache"),
            output_dir: PathBuf::from("voxmap-out"),

            map: MapSettings::default(),
        }
    }
}

impl PreviewConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str::<Self>(&contents) {
            Ok(mut config) => {
                config.validate();
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp values to valid ranges.
    pub fn validate(&mut self) {
        self.width = self.width.clamp(16, 4096);
        self.height = self.height.clamp(16, 4096);
        self.scale = self.scale.clamp(MIN_SCALE, MAX_SCALE);
        self.tile_radius = self.tile_radius.clamp(0, 8);
        if !self.layer.is_sliced() {
            self.level = 0;
        }
        self.map.validate();
    }

    /// Block the views are centered on, at height `y`.
    #[must_use]
    pub const fn center(&self, y: i32) -> WorldPos {
        WorldPos::new(self.center_x, y, self.center_z)
    }
}
