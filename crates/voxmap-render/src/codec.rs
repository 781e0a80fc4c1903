//! Raster codec and on-disk tile layout.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use voxmap_common::{Layer, MapError, MapResult, TileKey};

/// Encodes and decodes fixed-size `(A, B, G, R)` rasters.
pub trait RasterCodec: Send + Sync {
    /// Encodes a raster into file bytes.
    fn encode(&self, width: u32, height: u32, abgr: &[u8]) -> MapResult<Vec<u8>>;

    /// Decodes file bytes into a raster of exactly `width x height`.
    fn decode(&self, bytes: &[u8], width: u32, height: u32) -> MapResult<Vec<u8>>;
}

/// PNG codec backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

/// Swaps between `(A, B, G, R)` and `(R, G, B, A)` in place. The permutation
/// is its own inverse.
fn swizzle(bytes: &mut [u8]) {
    for px in bytes.chunks_exact_mut(4) {
        px.swap(0, 3);
        px.swap(1, 2);
    }
}

impl RasterCodec for PngCodec {
    fn encode(&self, width: u32, height: u32, abgr: &[u8]) -> MapResult<Vec<u8>> {
        let mut rgba = abgr.to_vec();
        swizzle(&mut rgba);
        let image = RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| MapError::Codec(format!("raster is not {width}x{height}")))?;

        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| MapError::Codec(e.to_string()))?;
        Ok(out.into_inner())
    }

    fn decode(&self, bytes: &[u8], width: u32, height: u32) -> MapResult<Vec<u8>> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| MapError::Codec(e.to_string()))?
            .to_rgba8();

        let (actual_width, actual_height) = image.dimensions();
        if actual_width != width || actual_height != height {
            return Err(MapError::DimensionMismatch {
                expected_width: width,
                expected_height: height,
                actual_width,
                actual_height,
            });
        }

        let mut abgr = image.into_raw();
        swizzle(&mut abgr);
        Ok(abgr)
    }
}

/// Cache file of a tile image.
///
/// Surface tiles (and surface-only tiles) share `surface/`; other slices get
/// `{layer}/{level}/`.
#[must_use]
pub fn tile_image_path(cache_dir: &Path, key: &TileKey, surface_only: bool) -> PathBuf {
    let dir = if surface_only || key.layer == Layer::Surface {
        cache_dir.join(Layer::Surface.name())
    } else {
        cache_dir
            .join(key.layer.name())
            .join(key.level.to_string())
    };
    dir.join(format!("r{}.{}.png", key.pos.x, key.pos.z))
}
