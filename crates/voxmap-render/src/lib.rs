//! # Voxmap Render
//!
//! Top-down map rendering for voxel worlds.
//!
//! This crate handles:
//! - Thread-safe rasters with disk caching
//! - 512x512 map tiles refreshed on background workers
//! - Surface height resolution and relief shading
//! - Viewport windowing for the full-screen world map
//! - Entity and player markers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod codec;
pub mod color;
pub mod context;
pub mod display;
pub mod height;
pub mod markers;
pub mod pixel_buffer;
pub mod provider;
pub mod settings;
pub mod state;
pub mod tile;
pub mod window;
pub mod worker;
pub mod worldmap;

#[cfg(test)]
mod test_support;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::codec::*;
    pub use crate::context::*;
    pub use crate::display::*;
    pub use crate::height::*;
    pub use crate::markers::*;
    pub use crate::pixel_buffer::*;
    pub use crate::provider::*;
    pub use crate::settings::*;
    pub use crate::state::*;
    pub use crate::tile::*;
    pub use crate::window::*;
    pub use crate::worker::*;
    pub use crate::worldmap::*;
}

pub use prelude::*;
