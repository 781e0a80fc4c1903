//! Display collaborator seam.
//!
//! The map never touches a graphics API directly. Whatever owns the window
//! implements [`Display`]; the map uploads rasters and asks for textured
//! quads through it, and only ever from the display execution context.
//! Texture deletion requested from any other thread goes through a
//! [`ReleaseQueue`] drained once per frame.

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

/// Opaque handle to an uploaded raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// One textured quad in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub w: f64,
    /// Height
    pub h: f64,
    /// Left texture coordinate
    pub u1: f32,
    /// Top texture coordinate
    pub v1: f32,
    /// Right texture coordinate
    pub u2: f32,
    /// Bottom texture coordinate
    pub v2: f32,
    /// Use linear filtering instead of nearest
    pub filter: bool,
}

impl Quad {
    /// Quad covering `w x h` at the origin with the whole texture.
    #[must_use]
    pub fn full(w: f64, h: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w,
            h,
            u1: 0.0,
            v1: 0.0,
            u2: 1.0,
            v2: 1.0,
            filter: false,
        }
    }
}

/// Graphics backend as seen by the map.
pub trait Display {
    /// Uploads an `(A, B, G, R)` raster, reusing `existing` when given.
    fn upload_raster(
        &mut self,
        existing: Option<TextureHandle>,
        width: u32,
        height: u32,
        abgr: &[u8],
    ) -> TextureHandle;

    /// Draws one textured quad.
    fn draw_quad(&mut self, quad: &Quad, texture: TextureHandle);

    /// Frees an uploaded raster.
    fn release_texture(&mut self, texture: TextureHandle);
}

/// Deferred texture deletion.
///
/// Producers on any thread call [`request`](Self::request); the display
/// context calls [`drain`](Self::drain) once per frame.
#[derive(Debug, Clone)]
pub struct ReleaseQueue {
    sender: Sender<TextureHandle>,
    receiver: Receiver<TextureHandle>,
}

impl Default for ReleaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Queues a texture for deletion on the display context.
    pub fn request(&self, texture: TextureHandle) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.sender.send(texture);
    }

    /// Releases every queued texture. Returns how many were freed.
    pub fn drain(&self, display: &mut dyn Display) -> usize {
        let mut freed = 0;
        while let Ok(texture) = self.receiver.try_recv() {
            display.release_texture(texture);
            freed += 1;
        }
        if freed > 0 {
            debug!(freed, "Released deferred textures");
        }
        freed
    }

    /// Number of textures waiting for the next drain.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}
