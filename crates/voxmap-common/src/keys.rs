//! Identifiers for cached map tiles.

use serde::{Deserialize, Serialize};

use crate::coords::{TilePos, WorldPos};

/// Vertical slice of the world a tile samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Topmost visible surface
    #[default]
    Surface,
    /// Underground levels, eight blocks each
    Caves,
    /// Nether-like levels, sixteen blocks each
    Nether,
}

impl Layer {
    /// Name used for cache directories and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Surface => "surface",
            Self::Caves => "caves",
            Self::Nether => "nether",
        }
    }

    /// Height of one level of this layer in blocks.
    #[must_use]
    pub const fn slice_height(self) -> i32 {
        match self {
            Self::Surface => 256,
            Self::Caves => 8,
            Self::Nether => 16,
        }
    }

    /// Whether height resolution scans whole slices from the top down.
    #[must_use]
    pub const fn is_sliced(self) -> bool {
        matches!(self, Self::Caves | Self::Nether)
    }

    /// Level of this layer that contains the given block height.
    #[must_use]
    pub const fn level_at(self, y: i32) -> i32 {
        match self {
            Self::Surface => 0,
            _ => y.div_euclid(self.slice_height()),
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies one cached tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileKey {
    /// Tile position
    pub pos: TilePos,
    /// Sampled layer
    pub layer: Layer,
    /// Level within the layer
    pub level: i32,
}

impl TileKey {
    /// Creates a new tile key.
    #[must_use]
    pub const fn new(pos: TilePos, layer: Layer, level: i32) -> Self {
        Self { pos, layer, level }
    }

    /// Surface tile at the given tile position.
    #[must_use]
    pub const fn surface(x: i32, z: i32) -> Self {
        Self::new(TilePos::new(x, z), Layer::Surface, 0)
    }

    /// Key of the tile containing a block position.
    #[must_use]
    pub const fn containing(pos: WorldPos, layer: Layer, level: i32) -> Self {
        Self::new(pos.tile(), layer, level)
    }

    /// Same tile position on another slice.
    #[must_use]
    pub const fn with_layer(self, layer: Layer, level: i32) -> Self {
        Self::new(self.pos, layer, level)
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} r{}.{}",
            self.layer, self.level, self.pos.x, self.pos.z
        )
    }
}
