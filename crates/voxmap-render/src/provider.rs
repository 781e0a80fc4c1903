//! Seams to the host world.
//!
//! The map does not know how blocks are stored or colored. The host supplies
//! a [`ChunkColorSource`] that hands out one [`ColumnSample`] per 16x16
//! column group, and a [`BlockView`] for the height sampler's block lookups.
//! Both are called from background workers.

use voxmap_common::{ChunkPos, Layer};

use crate::color::UNKNOWN;

/// Columns in one group.
pub const GROUP_COLUMNS: usize = 256;

/// Height reported for columns with no visible surface.
pub const NO_HEIGHT: i32 = -1;

/// Colors and heights of one 16x16 column group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSample {
    /// Group position
    pub pos: ChunkPos,
    /// ARGB color per column, indexed `x + (z << 4)`
    pub colors: [i32; GROUP_COLUMNS],
    /// Surface height per column, [`NO_HEIGHT`] when unknown
    pub heights: [i32; GROUP_COLUMNS],
    /// The host currently has this group loaded
    pub loaded: bool,
    /// The group contains a special feature
    pub feature: bool,
}

impl ColumnSample {
    /// Sample for a group nothing is known about yet.
    #[must_use]
    pub const fn unknown(pos: ChunkPos) -> Self {
        Self {
            pos,
            colors: [UNKNOWN; GROUP_COLUMNS],
            heights: [NO_HEIGHT; GROUP_COLUMNS],
            loaded: false,
            feature: false,
        }
    }

    /// Sample with one color and height everywhere.
    #[must_use]
    pub const fn uniform(pos: ChunkPos, color: i32, height: i32) -> Self {
        Self {
            pos,
            colors: [color; GROUP_COLUMNS],
            heights: [height; GROUP_COLUMNS],
            loaded: false,
            feature: false,
        }
    }

    /// Surface height of a local column.
    #[must_use]
    pub fn height(&self, lx: i32, lz: i32) -> i32 {
        self.heights[ChunkPos::local_index(lx, lz)]
    }

    /// Color of a local column.
    #[must_use]
    pub fn color(&self, lx: i32, lz: i32) -> i32 {
        self.colors[ChunkPos::local_index(lx, lz)]
    }
}

/// Source of per-group colors.
pub trait ChunkColorSource: Send + Sync {
    /// Colors and heights of the group at `pos` on the given slice.
    fn sample(&self, layer: Layer, level: i32, pos: ChunkPos) -> ColumnSample;

    /// Brings the group up to date. Returns whether its colors changed.
    /// `force_full` asks the source to recompute even unchanged groups.
    fn update(&self, layer: Layer, level: i32, pos: ChunkPos, force_full: bool) -> bool;

    /// Slice the host is currently showing.
    fn current_layer(&self) -> (Layer, i32) {
        (Layer::Surface, 0)
    }
}

/// What occupies a block, as far as surface resolution cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Nothing
    Air,
    /// Water, lava and other fluids
    Liquid,
    /// Plant growing under water
    SubmergedPlant,
    /// Grass, flowers, crops
    Plant,
    /// Everything else
    Solid,
}

impl BlockKind {
    /// Empty block.
    #[must_use]
    pub const fn is_air(self) -> bool {
        matches!(self, Self::Air)
    }

    /// Fluid block.
    #[must_use]
    pub const fn is_liquid(self) -> bool {
        matches!(self, Self::Liquid)
    }

    /// Block that is part of a body of water.
    #[must_use]
    pub const fn is_underwater(self) -> bool {
        matches!(self, Self::Liquid | Self::SubmergedPlant)
    }

    /// Vegetation.
    #[must_use]
    pub const fn is_plant(self) -> bool {
        matches!(self, Self::Plant | Self::SubmergedPlant)
    }

    /// Whether the downward surface scan passes through this block.
    #[must_use]
    pub const fn is_passable(self, allow_liquids: bool, allow_plants: bool) -> bool {
        self.is_air()
            || (!allow_liquids && self.is_underwater())
            || (!allow_plants && self.is_plant())
    }
}

/// Block lookups in world coordinates.
pub trait BlockView: Send + Sync {
    /// Block at the given position. Positions outside the world are air.
    fn block(&self, x: i32, y: i32, z: i32) -> BlockKind;

    /// Lowest block height of the world.
    fn min_height(&self) -> i32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passability() {
        assert!(BlockKind::Air.is_passable(true, true));
        assert!(!BlockKind::Solid.is_passable(false, false));

        assert!(!BlockKind::Liquid.is_passable(true, true));
        assert!(BlockKind::Liquid.is_passable(false, true));

        assert!(!BlockKind::Plant.is_passable(true, true));
        assert!(BlockKind::Plant.is_passable(true, false));

        assert!(BlockKind::SubmergedPlant.is_passable(false, true));
        assert!(BlockKind::SubmergedPlant.is_passable(true, false));
        assert!(!BlockKind::SubmergedPlant.is_passable(true, true));
    }

    #[test]
    fn test_unknown_sample() {
        let sample = ColumnSample::unknown(ChunkPos::new(1, 2));
        assert_eq!(sample.height(3, 4), NO_HEIGHT);
        assert_eq!(sample.color(15, 15), UNKNOWN);
        assert!(!sample.loaded);
    }
}
