//! Viewport windowing.
//!
//! Maps a view (world center, scale, output size) onto the column groups
//! that have to be sampled and the pixels they land on. The sample window is
//! quantized to whole groups, but the raster it produces is laid out so the
//! view center sits on the raster's middle pixel; markers use the same
//! [`ScreenMapping`] so they line up with the sampled image.

use voxmap_common::{ChunkPos, Layer, TilePos, WorldPos, GROUP_SHIFT, GROUP_SIZE, TILE_SHIFT, TILE_SIZE};

use crate::pixel_buffer::{PixelBuffer, PixelRect};
use crate::provider::ChunkColorSource;

/// Largest scaled raster width.
pub const MAX_SCALED_WIDTH: i32 = 2580;
/// Most zoomed-in scale.
pub const MIN_SCALE: f64 = 0.5;
/// Most zoomed-out scale.
pub const MAX_SCALE: f64 = 3.0;
/// Zoom step.
pub const SCALE_STEP: f64 = 0.25;

/// Raster size covering an output at some scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledSize {
    /// Raster width in blocks
    pub width: i32,
    /// Raster height in blocks
    pub height: i32,
    /// Effective scale (lowered when the width hit the cap)
    pub scale: f64,
}

fn scaled(output: i32, scale: f64) -> i32 {
    (f64::from(output) * scale).ceil() as i32
}

/// Size of the world raster shown in a `width x height` output, one output
/// pixel covering `scale` blocks. When the width would exceed
/// [`MAX_SCALED_WIDTH`] the scale is lowered to fit exactly.
#[must_use]
pub fn compute_scaled_size(width: i32, height: i32, scale: f64) -> ScaledSize {
    let scaled_width = scaled(width, scale);
    if scaled_width > MAX_SCALED_WIDTH && width > 0 {
        let scale = f64::from(MAX_SCALED_WIDTH) / f64::from(width);
        return ScaledSize {
            width: scaled(width, scale).min(MAX_SCALED_WIDTH),
            height: scaled(height, scale),
            scale,
        };
    }
    ScaledSize {
        width: scaled_width,
        height: scaled(height, scale),
        scale,
    }
}

/// Column groups to sample for one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindow {
    /// Group containing the view center
    pub center: ChunkPos,
    /// View center relative to the center group's origin, `0..16`
    pub block_offset: (i32, i32),
    /// First sampled group (inclusive)
    pub start: ChunkPos,
    /// Last sampled group (exclusive)
    pub stop: ChunkPos,
    /// Raster pixel of the window's north-west corner, negated
    pub pixel_offset: (i32, i32),
    /// Raster width
    pub scaled_width: i32,
    /// Raster height
    pub scaled_height: i32,
}

impl SampleWindow {
    /// Number of groups sampled along x and z.
    #[must_use]
    pub const fn group_count(&self) -> (i32, i32) {
        (self.stop.x - self.start.x, self.stop.z - self.start.z)
    }

    /// Raster pixel the north-west corner of group `pos` lands on.
    #[must_use]
    pub const fn dest_of(&self, pos: ChunkPos) -> (i32, i32) {
        (
            ((pos.x - self.start.x) << GROUP_SHIFT) - self.pixel_offset.0,
            ((pos.z - self.start.z) << GROUP_SHIFT) - self.pixel_offset.1,
        )
    }
}

/// Groups needed on each side of the center to cover `scaled` blocks
/// around a center `offset` blocks into its group.
const fn half_range(scaled: i32, offset: i32) -> i32 {
    (scaled + offset * 2 + 31) / 32
}

/// Quantizes `center` to its group and derives the group range and pixel
/// offsets of a `scaled_width x scaled_height` raster centered on it.
#[must_use]
pub fn compute_window(center: WorldPos, scaled_width: i32, scaled_height: i32) -> SampleWindow {
    let group = center.chunk();
    let (origin_x, origin_z) = group.origin_block();
    let offset_x = center.x - origin_x;
    let offset_z = center.z - origin_z;

    let range_x = half_range(scaled_width, offset_x);
    let range_z = half_range(scaled_height, offset_z);
    let start = ChunkPos::new(group.x - range_x, group.z - range_z);
    let stop = ChunkPos::new(group.x + range_x, group.z + range_z);

    let span_x = (stop.x - start.x) * GROUP_SIZE;
    let span_z = (stop.z - start.z) * GROUP_SIZE;

    SampleWindow {
        center: group,
        block_offset: (offset_x, offset_z),
        start,
        stop,
        pixel_offset: (
            (span_x / 2 + offset_x) - scaled_width / 2,
            (span_z / 2 + offset_z) - scaled_height / 2,
        ),
        scaled_width,
        scaled_height,
    }
}

/// Which slice [`sample_into`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleTarget {
    /// Always the surface
    #[default]
    Surface,
    /// Whatever slice the provider currently shows
    Current,
}

/// Samples every group of `window` into `dest`. Groups lying more than one
/// group before the raster's leading edge are skipped without sampling.
/// Returns how many groups were written.
pub fn sample_into(
    dest: &PixelBuffer,
    window: &SampleWindow,
    provider: &dyn ChunkColorSource,
    target: SampleTarget,
) -> usize {
    let (layer, level) = match target {
        SampleTarget::Surface => (Layer::Surface, 0),
        SampleTarget::Current => provider.current_layer(),
    };
    let (off_x, off_y) = window.pixel_offset;

    let mut written = 0;
    let mut pic_x = 0;
    for gx in window.start.x..window.stop.x {
        if pic_x < off_x - GROUP_SIZE {
            pic_x += GROUP_SIZE;
            continue;
        }
        let mut pic_y = 0;
        for gz in window.start.z..window.stop.z {
            if pic_y < off_y - GROUP_SIZE {
                pic_y += GROUP_SIZE;
                continue;
            }
            let sample = provider.sample(layer, level, ChunkPos::new(gx, gz));
            dest.write_chunk_data(pic_x - off_x, pic_y - off_y, &sample.colors);
            written += 1;
            pic_y += GROUP_SIZE;
        }
        pic_x += GROUP_SIZE;
    }
    written
}

/// Screen position of world coordinate `v` on an axis of `output` pixels
/// showing `scaled` blocks centered on `center`.
#[must_use]
pub fn world_to_screen(v: f64, center: f64, output: f64, scaled: f64) -> f64 {
    (v - center) * output / scaled + output / 2.0
}

/// Inverse of [`world_to_screen`].
#[must_use]
pub fn screen_to_world(p: f64, center: f64, output: f64, scaled: f64) -> f64 {
    center + (p - output / 2.0) * scaled / output
}

/// Pixel correction between a view laid out on the center's group origin
/// and the true center.
///
/// Positions computed against the quantized group grid have to subtract this
/// to line up with a raster from [`sample_into`].
#[must_use]
pub fn compute_centering_shift(center: WorldPos, window: &SampleWindow, output: (i32, i32)) -> (f64, f64) {
    let (origin_x, origin_z) = window.center.origin_block();
    let (out_w, out_h) = (f64::from(output.0), f64::from(output.1));
    let (sw, sh) = (f64::from(window.scaled_width), f64::from(window.scaled_height));
    (
        world_to_screen(f64::from(center.x), f64::from(origin_x), out_w, sw) - out_w / 2.0,
        world_to_screen(f64::from(center.z), f64::from(origin_z), out_h, sh) - out_h / 2.0,
    )
}

/// World/screen conversion for one view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapping {
    /// World x at the screen center
    pub center_x: f64,
    /// World z at the screen center
    pub center_z: f64,
    /// Output width in pixels
    pub width: f64,
    /// Output height in pixels
    pub height: f64,
    /// Blocks shown across the width
    pub scaled_width: f64,
    /// Blocks shown across the height
    pub scaled_height: f64,
}

impl ScreenMapping {
    /// Mapping of a view centered on `center`.
    #[must_use]
    pub fn new(center: WorldPos, output: (i32, i32), scaled: ScaledSize) -> Self {
        Self {
            center_x: f64::from(center.x),
            center_z: f64::from(center.z),
            width: f64::from(output.0),
            height: f64::from(output.1),
            scaled_width: f64::from(scaled.width),
            scaled_height: f64::from(scaled.height),
        }
    }

    /// Screen position of a world point.
    #[must_use]
    pub fn world_to_screen(&self, x: f64, z: f64) -> (f64, f64) {
        (
            world_to_screen(x, self.center_x, self.width, self.scaled_width),
            world_to_screen(z, self.center_z, self.height, self.scaled_height),
        )
    }

    /// World point under a screen position.
    #[must_use]
    pub fn screen_to_world(&self, px: f64, py: f64) -> (f64, f64) {
        (
            screen_to_world(px, self.center_x, self.width, self.scaled_width),
            screen_to_world(py, self.center_z, self.height, self.scaled_height),
        )
    }

    /// Output pixels per block.
    #[must_use]
    pub fn pixels_per_block(&self) -> f64 {
        self.width / self.scaled_width
    }
}

/// Part of one tile inside a world rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePiece {
    /// Tile
    pub pos: TilePos,
    /// Covered pixels of the tile
    pub src: PixelRect,
    /// World x of the piece's west edge
    pub world_x: i32,
    /// World z of the piece's north edge
    pub world_z: i32,
}

/// Splits the world rectangle at `(start_x, start_z)` of `width x height`
/// blocks into per-tile pieces, row by row.
#[must_use]
pub fn tile_pieces(start_x: i32, start_z: i32, width: i32, height: i32) -> Vec<TilePiece> {
    let mut pieces = Vec::new();
    if width <= 0 || height <= 0 {
        return pieces;
    }
    let (end_x, end_z) = (start_x + width, start_z + height);

    let mut z = start_z;
    while z < end_z {
        let tile_z = z >> TILE_SHIFT;
        let src_y = z - (tile_z << TILE_SHIFT);
        let rows = (TILE_SIZE - src_y).min(end_z - z);

        let mut x = start_x;
        while x < end_x {
            let tile_x = x >> TILE_SHIFT;
            let src_x = x - (tile_x << TILE_SHIFT);
            let cols = (TILE_SIZE - src_x).min(end_x - x);
            pieces.push(TilePiece {
                pos: TilePos::new(tile_x, tile_z),
                src: PixelRect::new(src_x, src_y, cols, rows),
                world_x: x,
                world_z: z,
            });
            x += cols;
        }
        z += rows;
    }
    pieces
}
