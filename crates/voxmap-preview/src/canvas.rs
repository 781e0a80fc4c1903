//! Headless display.
//!
//! Keeps uploaded rasters in memory and draws quads into a [`PixelBuffer`]
//! with nearest-neighbor sampling, so a rendered frame can be written out
//! as an image.

use std::collections::HashMap;

use tracing::warn;
use voxmap_render::color::{alpha, argb, BLACK};
use voxmap_render::{Display, PixelBuffer, PixelRect, Quad, TextureHandle};

struct Texture {
    width: u32,
    height: u32,
    abgr: Vec<u8>,
}

impl Texture {
    fn color(&self, x: u32, y: u32) -> i32 {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.abgr
            .get(i..i + 4)
            .map_or(BLACK, |px| argb(px[0], px[3], px[2], px[1]))
    }
}

/// In-memory render target.
pub struct Canvas {
    target: PixelBuffer,
    textures: HashMap<TextureHandle, Texture>,
    next: u32,
}

impl Canvas {
    /// Creates a black `width x height` canvas.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            target: PixelBuffer::filled(width, height, BLACK),
            textures: HashMap::new(),
            next: 0,
        }
    }

    /// Rendered pixels.
    #[must_use]
    pub const fn target(&self) -> &PixelBuffer {
        &self.target
    }

    /// Paints the whole canvas black.
    pub fn clear(&self) {
        self.target.fill_all(BLACK);
    }

    /// Number of live textures.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Fills a square of `size` pixels with its top-left corner at `(x, y)`.
    pub fn fill_square(&self, x: f64, y: f64, size: i32, color: i32) {
        let rect = PixelRect::new(x.round() as i32, y.round() as i32, size, size);
        self.target.fill(rect, color);
    }
}

impl Display for Canvas {
    fn upload_raster(
        &mut self,
        existing: Option<TextureHandle>,
        width: u32,
        height: u32,
        abgr: &[u8],
    ) -> TextureHandle {
        let handle = existing
            .filter(|h| self.textures.contains_key(h))
            .unwrap_or_else(|| {
                self.next += 1;
                TextureHandle(self.next)
            });
        self.textures.insert(
            handle,
            Texture {
                width,
                height,
                abgr: abgr.to_vec(),
            },
        );
        handle
    }

    fn draw_quad(&mut self, quad: &Quad, texture: TextureHandle) {
        let Some(tex) = self.textures.get(&texture) else {
            warn!(?texture, "Draw with unknown texture");
            return;
        };
        if quad.w <= 0.0 || quad.h <= 0.0 || tex.width == 0 || tex.height == 0 {
            return;
        }

        let x0 = quad.x.floor().max(0.0) as i32;
        let y0 = quad.y.floor().max(0.0) as i32;
        let x1 = (quad.x + quad.w).ceil().min(f64::from(self.target.width())) as i32;
        let y1 = (quad.y + quad.h).ceil().min(f64::from(self.target.height())) as i32;
        let (u1, u2) = (f64::from(quad.u1), f64::from(quad.u2));
        let (v1, v2) = (f64::from(quad.v1), f64::from(quad.v2));
        let (tw, th) = (f64::from(tex.width), f64::from(tex.height));

        for py in y0..y1 {
            let fy = (f64::from(py) + 0.5 - quad.y) / quad.h;
            if !(0.0..1.0).contains(&fy) {
                continue;
            }
            let ty = ((v1 + fy * (v2 - v1)) * th).floor().clamp(0.0, th - 1.0) as u32;
            for px in x0..x1 {
                let fx = (f64::from(px) + 0.5 - quad.x) / quad.w;
                if !(0.0..1.0).contains(&fx) {
                    continue;
                }
                let tx = ((u1 + fx * (u2 - u1)) * tw).floor().clamp(0.0, tw - 1.0) as u32;
                let color = tex.color(tx, ty);
                if alpha(color) != 0 {
                    self.target.set_color(px, py, color);
                }
            }
        }
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxmap_render::color::WHITE;

    fn checker(width: u32, height: u32) -> Vec<u8> {
        let raster = PixelBuffer::filled(width, height, BLACK);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                if (x + y) % 2 == 0 {
                    raster.set_color(x, y, WHITE);
                }
            }
        }
        raster.snapshot().bytes().to_vec()
    }

    #[test]
    fn test_full_quad_copies_texture() {
        let mut canvas = Canvas::new(4, 4);
        let texture = canvas.upload_raster(None, 4, 4, &checker(4, 4));
        canvas.draw_quad(&Quad::full(4.0, 4.0), texture);

        assert_eq!(canvas.target().get_color(0, 0), WHITE);
        assert_eq!(canvas.target().get_color(1, 0), BLACK);
        assert_eq!(canvas.target().get_color(3, 3), WHITE);
    }

    #[test]
    fn test_quad_scales_and_clips() {
        let mut canvas = Canvas::new(8, 8);
        let texture = canvas.upload_raster(None, 2, 2, &checker(2, 2));
        let quad = Quad {
            x: 4.0,
            y: 4.0,
            ..Quad::full(8.0, 8.0)
        };
        canvas.draw_quad(&quad, texture);

        assert_eq!(canvas.target().get_color(3, 3), BLACK);
        assert_eq!(canvas.target().get_color(4, 4), WHITE);
        assert_eq!(canvas.target().get_color(7, 7), WHITE);
    }

    #[test]
    fn test_sub_rectangle_uv() {
        let mut canvas = Canvas::new(2, 2);
        let texture = canvas.upload_raster(None, 2, 2, &checker(2, 2));
        let quad = Quad {
            u2: 0.5,
            v2: 0.5,
            ..Quad::full(2.0, 2.0)
        };
        canvas.draw_quad(&quad, texture);
        // Texel (0, 0) is white and fills the whole canvas.
        assert_eq!(canvas.target().get_color(0, 0), WHITE);
        assert_eq!(canvas.target().get_color(1, 0), WHITE);
        assert_eq!(canvas.target().get_color(1, 1), WHITE);
    }

    #[test]
    fn test_upload_reuse_and_release() {
        let mut canvas = Canvas::new(2, 2);
        let first = canvas.upload_raster(None, 2, 2, &checker(2, 2));
        let again = canvas.upload_raster(Some(first), 2, 2, &checker(2, 2));
        assert_eq!(first, again);
        assert_eq!(canvas.texture_count(), 1);

        canvas.release_texture(first);
        assert_eq!(canvas.texture_count(), 0);
        let fresh = canvas.upload_raster(Some(first), 2, 2, &checker(2, 2));
        assert_ne!(fresh, first);

        canvas.draw_quad(&Quad::full(2.0, 2.0), TextureHandle(99));
    }

    #[test]
    fn test_fill_square() {
        let canvas = Canvas::new(8, 8);
        canvas.fill_square(2.0, 2.0, 3, WHITE);
        assert_eq!(canvas.target().get_color(2, 2), WHITE);
        assert_eq!(canvas.target().get_color(4, 4), WHITE);
        assert_eq!(canvas.target().get_color(5, 5), BLACK);
        canvas.clear();
        assert_eq!(canvas.target().get_color(2, 2), BLACK);
    }
}
