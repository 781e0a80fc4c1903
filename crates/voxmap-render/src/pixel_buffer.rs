//! Thread-safe RGBA raster.
//!
//! A [`PixelBuffer`] is written by background sampling jobs and read by the
//! display path at the same time. Every read and write of a pixel, rectangle
//! or whole raster happens under one per-buffer mutex, so no reader ever
//! observes a torn pixel. The lock is never held across disk I/O: saving
//! works on an owned [`RasterSnapshot`].
//!
//! Pixels are stored as 4 bytes in `(A, B, G, R)` order. Colors go in and
//! come out as packed ARGB `i32`, see [`crate::color`].

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};
use voxmap_common::{MapError, MapResult};

use crate::codec::RasterCodec;
use crate::color::argb;
use crate::display::{Display, ReleaseQueue, TextureHandle};

/// Returned by [`PixelBuffer::get_color`] for coordinates outside the raster.
pub const NO_COLOR: i32 = -1;

/// Bytes per pixel.
const PIXEL_BYTES: usize = 4;

/// Rectangle in pixel space. May extend past the buffer; operations clip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl PixelRect {
    /// Creates a new rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersection with `[0, width) x [0, height)` as `(x0, y0, x1, y1)`
    /// half-open bounds, or `None` when empty.
    #[must_use]
    pub fn clip(&self, width: u32, height: u32) -> Option<(usize, usize, usize, usize)> {
        let x0 = i64::from(self.x).max(0);
        let y0 = i64::from(self.y).max(0);
        let x1 = (i64::from(self.x) + i64::from(self.width)).min(i64::from(width));
        let y1 = (i64::from(self.y) + i64::from(self.height)).min(i64::from(height));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as usize, y0 as usize, x1 as usize, y1 as usize))
    }
}

#[inline]
fn encode_pixel(px: &mut [u8], color: i32) {
    px[0] = (color >> 24) as u8;
    px[1] = color as u8;
    px[2] = (color >> 8) as u8;
    px[3] = (color >> 16) as u8;
}

#[inline]
fn decode_pixel(px: &[u8]) -> i32 {
    argb(px[0], px[3], px[2], px[1])
}

/// Copies the overlapping top-left rectangle of `src` into `dst`.
fn blit(dst: &mut [u8], dst_width: u32, dst_height: u32, src: &[u8], src_width: u32, src_height: u32) {
    let cols = dst_width.min(src_width) as usize * PIXEL_BYTES;
    let rows = dst_height.min(src_height) as usize;
    let dst_stride = dst_width as usize * PIXEL_BYTES;
    let src_stride = src_width as usize * PIXEL_BYTES;
    for row in 0..rows {
        let d = row * dst_stride;
        let s = row * src_stride;
        dst[d..d + cols].copy_from_slice(&src[s..s + cols]);
    }
}

/// Paints every non-transparent overlay pixel over `dst`.
fn overlay_onto(dst: &mut [u8], dst_width: u32, dst_height: u32, overlay: &RasterSnapshot) {
    let cols = dst_width.min(overlay.width) as usize;
    let rows = dst_height.min(overlay.height) as usize;
    for y in 0..rows {
        for x in 0..cols {
            let s = (y * overlay.width as usize + x) * PIXEL_BYTES;
            let src = &overlay.bytes[s..s + PIXEL_BYTES];
            if src[0] == 0 {
                continue;
            }
            let d = (y * dst_width as usize + x) * PIXEL_BYTES;
            dst[d..d + PIXEL_BYTES].copy_from_slice(src);
        }
    }
}

/// Owned copy of a buffer's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterSnapshot {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

impl RasterSnapshot {
    /// Raster width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Raster height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw `(A, B, G, R)` bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the snapshot was taken from a released buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Color at `(x, y)`, or [`NO_COLOR`] outside the raster.
    #[must_use]
    pub fn color(&self, x: i32, y: i32) -> i32 {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return NO_COLOR;
        }
        let i = (y as usize * self.width as usize + x as usize) * PIXEL_BYTES;
        self.bytes
            .get(i..i + PIXEL_BYTES)
            .map_or(NO_COLOR, decode_pixel)
    }

    /// Encodes the snapshot and writes it to `path`, creating parent
    /// directories.
    pub fn save_to(&self, path: &Path, codec: &dyn RasterCodec) -> MapResult<()> {
        if self.is_empty() {
            return Err(MapError::Codec("buffer was released".into()));
        }
        let encoded = codec.encode(self.width, self.height, &self.bytes)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, encoded)?;
        Ok(())
    }
}

/// Thread-safe RGBA raster with a dirty flag and an optional uploaded
/// texture.
#[derive(Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    /// `(A, B, G, R)` bytes; emptied on release
    bytes: Mutex<Vec<u8>>,
    /// Set by every write, cleared by the consumer that uploads or persists
    dirty: AtomicBool,
    released: AtomicBool,
    texture: Mutex<Option<TextureHandle>>,
}

impl PixelBuffer {
    /// Creates a zero-filled (transparent) buffer.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bytes: Mutex::new(vec![0; width as usize * height as usize * PIXEL_BYTES]),
            dirty: AtomicBool::new(false),
            released: AtomicBool::new(false),
            texture: Mutex::new(None),
        }
    }

    /// Creates a buffer filled with `color`.
    #[must_use]
    pub fn filled(width: u32, height: u32, color: i32) -> Self {
        let buffer = Self::new(width, height);
        buffer.fill_all(color);
        buffer
    }

    /// Buffer width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * PIXEL_BYTES)
    }

    fn touch(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Sets one pixel. Out-of-bounds coordinates are ignored.
    pub fn set_color(&self, x: i32, y: i32, color: i32) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        let mut bytes = self.bytes.lock();
        if let Some(px) = bytes.get_mut(i..i + PIXEL_BYTES) {
            encode_pixel(px, color);
            drop(bytes);
            self.touch();
        }
    }

    /// Reads one pixel, or [`NO_COLOR`] outside the buffer.
    #[must_use]
    pub fn get_color(&self, x: i32, y: i32) -> i32 {
        self.try_color(x, y).unwrap_or(NO_COLOR)
    }

    /// Reads one pixel, or `None` outside the buffer or after release.
    #[must_use]
    pub fn try_color(&self, x: i32, y: i32) -> Option<i32> {
        let i = self.index(x, y)?;
        let bytes = self.bytes.lock();
        bytes.get(i..i + PIXEL_BYTES).map(decode_pixel)
    }

    /// Multiplies one pixel by `tint`.
    pub fn apply_tint(&self, x: i32, y: i32, tint: i32) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        let mut bytes = self.bytes.lock();
        if let Some(px) = bytes.get_mut(i..i + PIXEL_BYTES) {
            let tinted = crate::color::apply_tint(decode_pixel(px), tint);
            encode_pixel(px, tinted);
            drop(bytes);
            self.touch();
        }
    }

    /// Fills the part of `rect` inside the buffer. Empty intersections are a
    /// no-op.
    pub fn fill(&self, rect: PixelRect, color: i32) {
        let Some((x0, y0, x1, y1)) = rect.clip(self.width, self.height) else {
            return;
        };
        let mut pixel = [0u8; PIXEL_BYTES];
        encode_pixel(&mut pixel, color);

        let stride = self.width as usize * PIXEL_BYTES;
        let mut bytes = self.bytes.lock();
        if bytes.is_empty() {
            return;
        }
        for y in y0..y1 {
            let row = &mut bytes[y * stride + x0 * PIXEL_BYTES..y * stride + x1 * PIXEL_BYTES];
            for px in row.chunks_exact_mut(PIXEL_BYTES) {
                px.copy_from_slice(&pixel);
            }
        }
        drop(bytes);
        self.touch();
    }

    /// Fills the whole buffer.
    pub fn fill_all(&self, color: i32) {
        self.fill(
            PixelRect::new(0, 0, self.width as i32, self.height as i32),
            color,
        );
    }

    /// Scatters a 16x16 column group with its north-west corner at
    /// `(dest_x, dest_y)`. Columns falling outside the buffer are clipped.
    ///
    /// `colors` is indexed `x + (y << 4)`.
    pub fn write_chunk_data(&self, dest_x: i32, dest_y: i32, colors: &[i32; 256]) {
        let Some((x0, y0, x1, y1)) =
            PixelRect::new(dest_x, dest_y, 16, 16).clip(self.width, self.height)
        else {
            return;
        };
        let stride = self.width as usize * PIXEL_BYTES;
        let mut bytes = self.bytes.lock();
        if bytes.is_empty() {
            return;
        }
        for py in y0..y1 {
            let j = (py as i64 - i64::from(dest_y)) as usize;
            for px in x0..x1 {
                let i = (px as i64 - i64::from(dest_x)) as usize;
                let at = py * stride + px * PIXEL_BYTES;
                encode_pixel(&mut bytes[at..at + PIXEL_BYTES], colors[i + (j << 4)]);
            }
        }
        drop(bytes);
        self.touch();
    }

    /// Owned copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> RasterSnapshot {
        RasterSnapshot {
            width: self.width,
            height: self.height,
            bytes: self.bytes.lock().clone(),
        }
    }

    /// Replaces this buffer's contents with `other`'s in one step. When the
    /// sizes differ only the overlapping top-left rectangle is copied.
    pub fn copy_from(&self, other: &PixelBuffer) {
        if std::ptr::eq(self, other) {
            return;
        }
        let src = other.snapshot();
        if src.is_empty() {
            return;
        }
        let mut bytes = self.bytes.lock();
        if bytes.is_empty() {
            return;
        }
        if src.width == self.width && src.height == self.height {
            *bytes = src.bytes;
        } else {
            blit(&mut bytes, self.width, self.height, &src.bytes, src.width, src.height);
        }
        drop(bytes);
        self.touch();
    }

    /// Paints `overlay` onto this buffer. Overlay pixels with zero alpha are
    /// skipped; any other alpha replaces the destination pixel outright.
    pub fn apply_overlay(&self, overlay: &PixelBuffer) {
        if std::ptr::eq(self, overlay) {
            return;
        }
        let src = overlay.snapshot();
        if src.is_empty() {
            return;
        }
        let mut bytes = self.bytes.lock();
        if bytes.is_empty() {
            return;
        }
        overlay_onto(&mut bytes, self.width, self.height, &src);
        drop(bytes);
        self.touch();
    }

    /// Publishes `base` with `overlay` applied as this buffer's new contents.
    ///
    /// Equivalent to [`copy_from`](Self::copy_from) followed by
    /// [`apply_overlay`](Self::apply_overlay), except that readers see either
    /// the old frame or the finished one, never the step in between.
    pub fn compose(&self, base: &PixelBuffer, overlay: &PixelBuffer) {
        let base = base.snapshot();
        let overlay = overlay.snapshot();
        if base.is_empty() {
            return;
        }

        let mut frame = if base.width == self.width && base.height == self.height {
            base.bytes
        } else {
            let mut frame = self.bytes.lock().clone();
            if frame.is_empty() {
                return;
            }
            blit(&mut frame, self.width, self.height, &base.bytes, base.width, base.height);
            frame
        };
        if !overlay.is_empty() {
            overlay_onto(&mut frame, self.width, self.height, &overlay);
        }

        let mut bytes = self.bytes.lock();
        if bytes.is_empty() {
            return;
        }
        *bytes = frame;
        drop(bytes);
        self.touch();
    }

    /// Writes the buffer to `path`. Failures are logged and leave nothing
    /// half-written in memory; returns whether the file was written.
    pub fn save_to_disk(&self, path: &Path, codec: &dyn RasterCodec) -> bool {
        match self.snapshot().save_to(path, codec) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), "Can't save image: {e}");
                false
            },
        }
    }

    /// Loads the buffer from `path`. On any failure the buffer keeps its
    /// current contents; returns whether an image was loaded.
    pub fn load_from_disk(&self, path: &Path, codec: &dyn RasterCodec) -> bool {
        match self.try_load(path, codec) {
            Ok(()) => true,
            Err(MapError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cached image");
                false
            },
            Err(e) => {
                warn!(path = %path.display(), "Can't load image: {e}");
                false
            },
        }
    }

    fn try_load(&self, path: &Path, codec: &dyn RasterCodec) -> MapResult<()> {
        let encoded = fs::read(path)?;
        let decoded = codec.decode(&encoded, self.width, self.height)?;
        let mut bytes = self.bytes.lock();
        if bytes.is_empty() {
            return Ok(());
        }
        if decoded.len() != bytes.len() {
            return Err(MapError::Codec(format!(
                "decoded {} bytes, expected {}",
                decoded.len(),
                bytes.len()
            )));
        }
        *bytes = decoded;
        drop(bytes);
        self.touch();
        Ok(())
    }

    /// Whether the buffer changed since the flag was last cleared.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clears the dirty flag.
    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Forces the next [`upload_if_dirty`](Self::upload_if_dirty) to upload.
    pub fn mark_for_upload(&self) {
        self.touch();
    }

    /// Uploads the buffer if it changed (or was never uploaded) and returns
    /// the texture to draw with. Call only from the display context.
    pub fn upload_if_dirty(&self, display: &mut dyn Display) -> Option<TextureHandle> {
        if self.is_released() {
            return None;
        }
        let mut texture = self.texture.lock();
        if !self.dirty.swap(false, Ordering::AcqRel) && texture.is_some() {
            return *texture;
        }
        let bytes = self.bytes.lock();
        if bytes.is_empty() {
            return None;
        }
        let handle = display.upload_raster(*texture, self.width, self.height, &bytes);
        *texture = Some(handle);
        Some(handle)
    }

    /// Texture of the last upload, if any.
    #[must_use]
    pub fn texture(&self) -> Option<TextureHandle> {
        *self.texture.lock()
    }

    /// Frees the pixel store and queues the texture for deletion on the
    /// display context. Safe to call any number of times from any thread.
    pub fn release(&self, releases: &ReleaseQueue) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.bytes.lock() = Vec::new();
        if let Some(texture) = self.texture.lock().take() {
            releases.request(texture);
        }
    }

    /// Whether [`release`](Self::release) was called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PngCodec;
    use crate::color::{self, BLACK, TRANSPARENT};
    use crate::test_support::RecordingDisplay;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn pattern(x: i32, y: i32) -> i32 {
        argb((x * 7 + y) as u8, (x * 13) as u8, (y * 29) as u8, (x ^ y) as u8)
    }

    #[test]
    fn test_set_get_round_trip() {
        let buffer = PixelBuffer::new(8, 4);
        let c = argb(0x80, 1, 2, 3);
        buffer.set_color(7, 3, c);
        assert_eq!(buffer.get_color(7, 3), c);
        assert!(buffer.is_dirty());
    }

    #[test]
    fn test_byte_order_is_abgr() {
        let buffer = PixelBuffer::new(1, 1);
        buffer.set_color(0, 0, argb(0xAA, 0x11, 0x22, 0x33));
        assert_eq!(buffer.snapshot().bytes(), &[0xAA, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn test_out_of_bounds_access() {
        let buffer = PixelBuffer::filled(4, 4, BLACK);
        buffer.clear_dirty();
        let before = buffer.snapshot();

        for (x, y) in [(-1, 0), (0, -1), (4, 0), (0, 4), (i32::MIN, i32::MAX)] {
            buffer.set_color(x, y, color::WHITE);
            assert_eq!(buffer.get_color(x, y), NO_COLOR);
            assert_eq!(buffer.try_color(x, y), None);
        }
        assert_eq!(buffer.snapshot(), before);
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn test_fill_clips_to_bounds() {
        let buffer = PixelBuffer::filled(8, 8, BLACK);
        buffer.fill(PixelRect::new(-4, 6, 6, 10), color::WHITE);

        assert_eq!(buffer.get_color(0, 6), color::WHITE);
        assert_eq!(buffer.get_color(1, 7), color::WHITE);
        assert_eq!(buffer.get_color(2, 7), BLACK);
        assert_eq!(buffer.get_color(0, 5), BLACK);
    }

    #[test]
    fn test_fill_empty_intersection_is_noop() {
        let buffer = PixelBuffer::filled(8, 8, BLACK);
        buffer.clear_dirty();
        buffer.fill(PixelRect::new(8, 0, 4, 4), color::WHITE);
        buffer.fill(PixelRect::new(0, 0, 0, 4), color::WHITE);
        buffer.fill(PixelRect::new(-5, -5, 5, 5), color::WHITE);
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn test_write_chunk_data_clips() {
        let buffer = PixelBuffer::filled(20, 20, BLACK);
        let mut colors = [0i32; 256];
        for (i, c) in colors.iter_mut().enumerate() {
            *c = argb(0xFF, i as u8, 0, 0);
        }
        buffer.write_chunk_data(-8, 10, &colors);

        // Column x = 8 of the group lands on buffer x = 0; row y = 0 on y = 10.
        assert_eq!(buffer.get_color(0, 10), colors[8]);
        assert_eq!(buffer.get_color(7, 19), colors[15 + (9 << 4)]);
        assert_eq!(buffer.get_color(8, 10), BLACK);
    }

    #[test]
    fn test_copy_from_same_size() {
        let a = PixelBuffer::new(4, 4);
        let b = PixelBuffer::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                b.set_color(x, y, pattern(x, y));
            }
        }
        a.copy_from(&b);
        assert_eq!(a.snapshot(), b.snapshot());
        a.copy_from(&a);
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn test_copy_from_different_size() {
        let small = PixelBuffer::filled(2, 2, color::WHITE);
        let big = PixelBuffer::filled(4, 3, BLACK);
        big.copy_from(&small);
        assert_eq!(big.get_color(1, 1), color::WHITE);
        assert_eq!(big.get_color(2, 0), BLACK);
        assert_eq!(big.get_color(0, 2), BLACK);

        small.copy_from(&big);
        assert_eq!(small.get_color(1, 1), color::WHITE);
    }

    #[test]
    fn test_transparent_overlay_is_noop() {
        let base = PixelBuffer::new(6, 6);
        for y in 0..6 {
            for x in 0..6 {
                base.set_color(x, y, pattern(x, y));
            }
        }
        let before = base.snapshot();
        let overlay = PixelBuffer::filled(6, 6, TRANSPARENT);
        base.apply_overlay(&overlay);
        assert_eq!(base.snapshot(), before);
    }

    #[test]
    fn test_opaque_overlay_replaces() {
        let base = PixelBuffer::filled(6, 6, BLACK);
        let tint = argb(0x10, 0x20, 0x30, 0x40);
        let overlay = PixelBuffer::filled(6, 6, tint);
        base.apply_overlay(&overlay);
        for y in 0..6 {
            for x in 0..6 {
                assert_eq!(base.get_color(x, y), tint);
            }
        }
    }

    #[test]
    fn test_compose_matches_copy_then_overlay() {
        let base = PixelBuffer::new(5, 5);
        let overlay = PixelBuffer::new(5, 5);
        for y in 0..5 {
            for x in 0..5 {
                base.set_color(x, y, pattern(x, y));
            }
        }
        overlay.set_color(2, 2, color::GRID);
        overlay.set_color(4, 0, color::LOADED_OVERLAY);

        let stepwise = PixelBuffer::new(5, 5);
        stepwise.copy_from(&base);
        stepwise.apply_overlay(&overlay);

        let composed = PixelBuffer::new(5, 5);
        composed.compose(&base, &overlay);
        assert_eq!(composed.snapshot(), stepwise.snapshot());
        assert!(composed.is_dirty());
    }

    #[test]
    fn test_disk_round_trip() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("tile.png");

        let buffer = PixelBuffer::new(16, 9);
        for y in 0..9 {
            for x in 0..16 {
                buffer.set_color(x, y, pattern(x, y));
            }
        }
        assert!(buffer.save_to_disk(&path, &PngCodec));

        let loaded = PixelBuffer::new(16, 9);
        assert!(loaded.load_from_disk(&path, &PngCodec));
        assert_eq!(loaded.snapshot(), buffer.snapshot());
        assert!(loaded.is_dirty());
    }

    #[test]
    fn test_load_failures_leave_buffer_unchanged() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let buffer = PixelBuffer::filled(4, 4, color::WHITE);
        buffer.clear_dirty();

        assert!(!buffer.load_from_disk(&dir.path().join("missing.png"), &PngCodec));

        let garbage = dir.path().join("garbage.png");
        fs::write(&garbage, b"definitely not a png").expect("write");
        assert!(!buffer.load_from_disk(&garbage, &PngCodec));

        let wrong_size = dir.path().join("small.png");
        assert!(PixelBuffer::filled(2, 2, BLACK).save_to_disk(&wrong_size, &PngCodec));
        assert!(!buffer.load_from_disk(&wrong_size, &PngCodec));

        assert_eq!(buffer.get_color(3, 3), color::WHITE);
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn test_upload_only_when_dirty() {
        let buffer = PixelBuffer::filled(4, 4, BLACK);
        let mut display = RecordingDisplay::default();

        let first = buffer.upload_if_dirty(&mut display).expect("texture");
        let second = buffer.upload_if_dirty(&mut display).expect("texture");
        assert_eq!(first, second);
        assert_eq!(display.uploads, 1);

        buffer.set_color(0, 0, color::WHITE);
        assert_eq!(buffer.upload_if_dirty(&mut display), Some(first));
        assert_eq!(display.uploads, 2);
        assert_eq!(display.pixel(first, 0, 0), Some(color::WHITE));

        buffer.mark_for_upload();
        buffer.upload_if_dirty(&mut display);
        assert_eq!(display.uploads, 3);
    }

    #[test]
    fn test_release_is_idempotent() {
        let releases = ReleaseQueue::new();
        let mut display = RecordingDisplay::default();
        let buffer = PixelBuffer::filled(4, 4, BLACK);
        let texture = buffer.upload_if_dirty(&mut display).expect("texture");

        buffer.release(&releases);
        buffer.release(&releases);
        assert!(buffer.is_released());
        assert_eq!(releases.pending(), 1);
        releases.drain(&mut display);
        assert_eq!(display.released, vec![texture]);

        // Writes after release are silently dropped.
        buffer.set_color(0, 0, color::WHITE);
        buffer.fill_all(color::WHITE);
        assert_eq!(buffer.get_color(0, 0), NO_COLOR);
        assert_eq!(buffer.upload_if_dirty(&mut display), None);
    }

    #[test]
    fn test_concurrent_writers_and_reader() {
        let buffer = std::sync::Arc::new(PixelBuffer::filled(64, 64, BLACK));
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let buffer = std::sync::Arc::clone(&buffer);
                std::thread::spawn(move || {
                    let c = argb(0xFF, t as u8, t as u8, t as u8);
                    for _ in 0..50 {
                        buffer.fill(PixelRect::new(t * 16, 0, 16, 64), c);
                    }
                })
            })
            .collect();
        for _ in 0..50 {
            let c = buffer.get_color(20, 20);
            // A pixel is either the initial black or a fully written color.
            assert!(c == BLACK || c == argb(0xFF, 1, 1, 1));
        }
        for writer in writers {
            writer.join().expect("writer panicked");
        }
        assert_eq!(buffer.get_color(63, 63), argb(0xFF, 3, 3, 3));
    }

    proptest! {
        #[test]
        fn prop_set_get_exact(x in 0i32..32, y in 0i32..32, c in any::<i32>()) {
            let buffer = PixelBuffer::new(32, 32);
            buffer.set_color(x, y, c);
            prop_assert_eq!(buffer.get_color(x, y), c);
        }

        #[test]
        fn prop_outside_is_sentinel(x in -100i32..100, y in -100i32..100) {
            prop_assume!(!(0..8).contains(&x) || !(0..8).contains(&y));
            let buffer = PixelBuffer::filled(8, 8, BLACK);
            buffer.clear_dirty();
            buffer.set_color(x, y, color::WHITE);
            prop_assert_eq!(buffer.get_color(x, y), NO_COLOR);
            prop_assert!(!buffer.is_dirty());
        }
    }
}
