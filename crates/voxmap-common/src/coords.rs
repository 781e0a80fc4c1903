//! Coordinate types for blocks, column groups and map tiles.

use serde::{Deserialize, Serialize};

/// Side length of a column group ("chunk") in blocks.
pub const GROUP_SIZE: i32 = 16;

/// Bit shift from block coordinates to column group coordinates.
pub const GROUP_SHIFT: u32 = 4;

/// Side length of a map tile in blocks (and pixels).
pub const TILE_SIZE: i32 = 512;

/// Bit shift from block coordinates to tile coordinates.
pub const TILE_SHIFT: u32 = 9;

/// Column groups along one side of a tile.
pub const GROUPS_PER_TILE: i32 = TILE_SIZE / GROUP_SIZE;

/// Block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WorldPos {
    /// East-west coordinate
    pub x: i32,
    /// Vertical coordinate
    pub y: i32,
    /// North-south coordinate
    pub z: i32,
}

impl WorldPos {
    /// Creates a new world position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Column group containing this position.
    #[must_use]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos {
            x: self.x >> GROUP_SHIFT,
            z: self.z >> GROUP_SHIFT,
        }
    }

    /// Tile containing this position.
    #[must_use]
    pub const fn tile(self) -> TilePos {
        TilePos::from_block(self.x, self.z)
    }

    /// Returns the position moved by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl std::fmt::Display for WorldPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

/// Column group coordinate (a 16x16 block footprint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChunkPos {
    /// X coordinate in group space
    pub x: i32,
    /// Z coordinate in group space
    pub z: i32,
}

impl ChunkPos {
    /// Creates a new column group coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Block coordinates of the north-west corner.
    #[must_use]
    pub const fn origin_block(self) -> (i32, i32) {
        (self.x << GROUP_SHIFT, self.z << GROUP_SHIFT)
    }

    /// Tile containing this group.
    #[must_use]
    pub const fn tile(self) -> TilePos {
        TilePos {
            x: self.x >> (TILE_SHIFT - GROUP_SHIFT),
            z: self.z >> (TILE_SHIFT - GROUP_SHIFT),
        }
    }

    /// Index into a 256-entry group array for local coordinates.
    ///
    /// Columns are stored x-fastest: `lx + (lz << 4)`.
    #[must_use]
    pub const fn local_index(lx: i32, lz: i32) -> usize {
        ((lx & 15) + ((lz & 15) << 4)) as usize
    }
}

/// Tile coordinate (world coordinates shifted right by 9 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePos {
    /// X coordinate in tile space
    pub x: i32,
    /// Z coordinate in tile space
    pub z: i32,
}

impl TilePos {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Tile containing the given block column.
    #[must_use]
    pub const fn from_block(x: i32, z: i32) -> Self {
        Self {
            x: x >> TILE_SHIFT,
            z: z >> TILE_SHIFT,
        }
    }

    /// Block coordinates of the north-west corner.
    #[must_use]
    pub const fn origin_block(self) -> (i32, i32) {
        (self.x << TILE_SHIFT, self.z << TILE_SHIFT)
    }

    /// Chebyshev distance to another tile, in tiles.
    #[must_use]
    pub fn distance(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}
