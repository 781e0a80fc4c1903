//! Map configuration.
//!
//! [`MapSettings`] is the set of toggles the map consults while refreshing
//! and drawing. The map never mutates it; the host owns a
//! [`SettingsHandle`] and the map takes a [`snapshot`](SettingsHandle::snapshot)
//! whenever it needs a consistent view.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use voxmap_common::{MapError, MapResult};

/// Largest accepted relief shading strength.
pub const MAX_SHADE_STRENGTH: i32 = 16;

/// Map rendering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    // === Refresh ===
    /// Resample every column group on each refresh
    pub force_update: bool,
    /// Render the floor under water instead of the water surface
    pub hide_water: bool,
    /// Tint water by depth (only with the alternate color mode)
    pub water_tint: bool,
    /// Use the alternate block color palette
    pub alternate_color_mode: bool,
    /// Look through plants when resolving the surface
    pub ignore_plants: bool,
    /// Maximum relief shading step (0 disables shading)
    pub terrain_shade_strength: i32,

    // === Overlays ===
    /// Draw column group borders
    pub show_grid: bool,
    /// Highlight column groups the host has loaded
    pub show_loaded_overlay: bool,
    /// Highlight column groups with a special feature
    pub show_feature_overlay: bool,

    // === Drawing ===
    /// Linear texture filtering for tiles
    pub texture_filter: bool,
    /// Rotate the map with the player
    pub rotate_map: bool,

    // === Markers ===
    /// Show creature markers
    pub creature_radar: bool,
    /// Show hostile markers
    pub hostile_radar: bool,
    /// Draw entity heads instead of dots
    pub show_entity_heads: bool,
    /// Entity icon size in pixels
    pub entity_icon_size: i32,
    /// Outline player icons
    pub show_icons_outline: bool,
    /// Outline thickness in pixels
    pub entity_outline_size: f64,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            // Refresh
            force_update: false,
            hide_water: false,
            water_tint: true,
            alternate_color_mode: true,
            ignore_plants: true,
            terrain_shade_strength: 2,

            // Overlays
            show_grid: false,
            show_loaded_overlay: false,
            show_feature_overlay: false,

            // Drawing
            texture_filter: false,
            rotate_map: false,

            // Markers
            creature_radar: true,
            hostile_radar: true,
            show_entity_heads: true,
            entity_icon_size: 8,
            show_icons_outline: false,
            entity_outline_size: 1.0,
        }
    }
}

impl MapSettings {
    /// Load settings from a TOML file.
    /// Returns defaults if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Map settings not found, using defaults");
            return Self::default();
        }

        match Self::try_load(path) {
            Ok(settings) => {
                info!("Loaded map settings from {}", path.display());
                settings
            },
            Err(e) => {
                warn!("Failed to load map settings: {e}");
                Self::default()
            },
        }
    }

    fn try_load(path: &Path) -> MapResult<Self> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Self =
            toml::from_str(&contents).map_err(|e| MapError::Config(e.to_string()))?;
        settings.validate();
        Ok(settings)
    }

    /// Save settings to a TOML file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved map settings to {}", path.display());
        Ok(())
    }

    /// Clamp values to valid ranges.
    pub fn validate(&mut self) {
        self.terrain_shade_strength = self.terrain_shade_strength.clamp(0, MAX_SHADE_STRENGTH);
        self.entity_icon_size = self.entity_icon_size.clamp(2, 32);
        self.entity_outline_size = self.entity_outline_size.clamp(0.0, 4.0);
    }

    /// Water tint as it affects rendering: only meaningful with the
    /// alternate color mode.
    #[must_use]
    pub const fn effective_water_tint(&self) -> bool {
        self.alternate_color_mode && self.water_tint
    }
}

/// Live, shared settings.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<MapSettings>>,
}

impl SettingsHandle {
    /// Wraps settings in a shareable handle.
    #[must_use]
    pub fn new(settings: MapSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Owned copy of the current settings.
    #[must_use]
    pub fn snapshot(&self) -> MapSettings {
        self.inner.read().clone()
    }

    /// Replaces the settings.
    pub fn set(&self, mut settings: MapSettings) {
        settings.validate();
        *self.inner.write() = settings;
    }

    /// Edits the settings in place.
    pub fn update(&self, edit: impl FnOnce(&mut MapSettings)) {
        let mut guard = self.inner.write();
        edit(&mut guard);
        guard.validate();
    }
}
