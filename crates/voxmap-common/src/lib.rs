//! # Voxmap Common
//!
//! Shared types for the voxmap crates:
//! - Coordinate types (block, column group, tile)
//! - Tile keys and vertical layers
//! - Common error type

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod keys;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::keys::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_world_to_group_and_tile() {
        let pos = WorldPos::new(100, 64, -200);
        assert_eq!(pos.chunk(), ChunkPos::new(6, -13));
        assert_eq!(pos.tile(), TilePos::new(0, -1));
        assert_eq!(pos.chunk().tile(), pos.tile());
    }

    #[test]
    fn test_tile_origin() {
        assert_eq!(TilePos::new(-1, 2).origin_block(), (-512, 1024));
        assert_eq!(ChunkPos::new(-1, 3).origin_block(), (-16, 48));
    }

    #[test]
    fn test_local_index_wraps_negative() {
        assert_eq!(ChunkPos::local_index(0, 0), 0);
        assert_eq!(ChunkPos::local_index(15, 15), 255);
        assert_eq!(ChunkPos::local_index(-1, 0), 15);
        assert_eq!(ChunkPos::local_index(3, 1), 19);
    }

    #[test]
    fn test_layer_levels() {
        assert_eq!(Layer::Caves.level_at(17), 2);
        assert_eq!(Layer::Nether.level_at(-1), -1);
        assert_eq!(Layer::Surface.level_at(200), 0);
        assert!(Layer::Nether.is_sliced());
        assert!(!Layer::Surface.is_sliced());
    }

    #[test]
    fn test_tile_key_display() {
        let key = TileKey::new(TilePos::new(3, -4), Layer::Caves, 2);
        assert_eq!(key.to_string(), "caves/2 r3.-4");
    }

    proptest! {
        #[test]
        fn prop_group_inside_its_tile(x in -1_000_000i32..1_000_000, z in -1_000_000i32..1_000_000) {
            let pos = WorldPos::new(x, 0, z);
            let (ox, oz) = pos.tile().origin_block();
            prop_assert!(x >= ox && x < ox + TILE_SIZE);
            prop_assert!(z >= oz && z < oz + TILE_SIZE);
            prop_assert_eq!(pos.chunk().tile(), pos.tile());
        }
    }
}
