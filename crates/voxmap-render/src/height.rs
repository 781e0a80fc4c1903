//! Surface resolution and relief shading.

use voxmap_common::{ChunkPos, Layer};

use crate::color::shade;
use crate::provider::{BlockView, ColumnSample, GROUP_COLUMNS, NO_HEIGHT};
use crate::settings::MapSettings;

/// Clamps a raw height difference to `[-max_strength, max_strength]`.
/// Zero is returned as is.
#[must_use]
pub fn shade_step(diff: i32, max_strength: i32) -> i32 {
    if diff == 0 {
        return 0;
    }
    let max = max_strength.max(0);
    diff.clamp(-max, max)
}

/// Height queries against one vertical slice of the world.
#[derive(Debug, Clone, Copy)]
pub struct HeightSampler<'a, V: BlockView + ?Sized> {
    view: &'a V,
    layer: Layer,
    level: i32,
}

impl<'a, V: BlockView + ?Sized> HeightSampler<'a, V> {
    /// Creates a sampler for `level` of `layer`.
    #[must_use]
    pub fn new(view: &'a V, layer: Layer, level: i32) -> Self {
        Self { view, layer, level }
    }

    /// Slice this sampler resolves heights in.
    #[must_use]
    pub const fn layer(&self) -> (Layer, i32) {
        (self.layer, self.level)
    }

    fn passable(&self, x: i32, y: i32, z: i32, liquids: bool, plants: bool) -> bool {
        self.view.block(x, y, z).is_passable(liquids, plants)
    }

    /// First non-passable block at or below `from`, not going under `floor`.
    fn scan_down(&self, x: i32, from: i32, z: i32, floor: i32, liquids: bool, plants: bool) -> Option<i32> {
        let mut y = from;
        loop {
            if !self.passable(x, y, z, liquids, plants) {
                return Some(y);
            }
            if y <= floor {
                return None;
            }
            y -= 1;
        }
    }

    /// Height of the topmost visible block of column `(x, z)`, or
    /// [`NO_HEIGHT`].
    ///
    /// The scan walks down from `start_y` through air, through water unless
    /// `allow_liquids`, and through plants unless `allow_plants`. On sliced
    /// layers (caves, nether) with liquids allowed, every height of the slice
    /// is tried from the top, and a hit only counts when the block above it is
    /// passable, so a ceiling is never reported as the floor.
    ///
    /// Sliced scans never continue below the slice floor, so a tile only
    /// shows blocks of its own slice rather than whatever lies under it.
    #[must_use]
    pub fn resolve_surface_height(
        &self,
        x: i32,
        start_y: i32,
        z: i32,
        allow_liquids: bool,
        allow_plants: bool,
    ) -> i32 {
        if self.layer.is_sliced() && allow_liquids {
            let height = self.layer.slice_height();
            let floor = self.level * height;
            for top in (floor..floor + height).rev() {
                if let Some(y) = self.scan_down(x, top, z, floor, allow_liquids, allow_plants) {
                    if self.passable(x, y + 1, z, allow_liquids, allow_plants) {
                        return y;
                    }
                }
            }
            return NO_HEIGHT;
        }

        let floor = self.view.min_height();
        match self.scan_down(x, start_y, z, floor, allow_liquids, allow_plants) {
            Some(y) if self.passable(x, y + 1, z, allow_liquids, allow_plants) => y,
            _ => NO_HEIGHT,
        }
    }

    /// Height of local column `(lx, lz)` of `group` with liquid surfaces
    /// replaced by the floor beneath them. Unknown heights count as 0.
    fn liquid_floor(&self, group: &ColumnSample, lx: i32, lz: i32, height: i32, allow_plants: bool) -> i32 {
        if height == NO_HEIGHT {
            return 0;
        }
        let (ox, oz) = group.pos.origin_block();
        let (x, z) = (ox + lx, oz + lz);
        if self.view.block(x, height, z).is_liquid() {
            self.resolve_surface_height(x, height, z, false, allow_plants)
        } else {
            height
        }
    }

    /// Directional shading delta of local column `(x, z)` at height `y`.
    ///
    /// Compares against the column to the east (`x + 1`, read from `east`
    /// past the group edge) and the column at `z - 1` (read from `south`
    /// past the group edge). Neighbors below `y` contribute nothing.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn height_difference(
        &self,
        current: &ColumnSample,
        east: &ColumnSample,
        south: &ColumnSample,
        x: i32,
        y: i32,
        z: i32,
        allow_plants: bool,
        max_strength: i32,
    ) -> i32 {
        let ex = x + 1;
        let east_height = if ex > 15 {
            let ex = ex - 16;
            self.liquid_floor(east, ex, z, east.height(ex, z), allow_plants)
        } else {
            self.liquid_floor(current, ex, z, current.height(ex, z), allow_plants)
        };

        let sz = z - 1;
        let south_height = if sz < 0 {
            let sz = sz + 16;
            self.liquid_floor(south, x, sz, south.height(x, sz), allow_plants)
        } else {
            self.liquid_floor(current, x, sz, current.height(x, sz), allow_plants)
        };

        let y = self.liquid_floor(current, x, z, y, allow_plants);

        let east = (east_height - y).max(0);
        let south = (south_height - y).max(0);
        shade_step(east - south, max_strength)
    }
}

/// Shades every known column of `sample` by its height difference to the
/// neighboring groups.
pub fn apply_relief<V: BlockView + ?Sized>(
    sampler: &HeightSampler<'_, V>,
    sample: &mut ColumnSample,
    east: &ColumnSample,
    south: &ColumnSample,
    settings: &MapSettings,
) {
    let strength = settings.terrain_shade_strength;
    if strength == 0 {
        return;
    }
    let allow_plants = !settings.ignore_plants;

    let mut diffs = [0i32; GROUP_COLUMNS];
    for z in 0..16 {
        for x in 0..16 {
            let y = sample.height(x, z);
            if y == NO_HEIGHT {
                continue;
            }
            diffs[ChunkPos::local_index(x, z)] =
                sampler.height_difference(sample, east, south, x, y, z, allow_plants, strength);
        }
    }
    for (color, diff) in sample.colors.iter_mut().zip(diffs) {
        *color = shade(*color, diff);
    }
}
