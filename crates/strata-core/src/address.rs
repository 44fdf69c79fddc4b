//! Block and region addressing.
//!
//! The world is a grid of cubic regions, each [`REGION_EDGE`] blocks on a
//! side. A [`BlockAddress`] is an absolute block position; it splits into
//! the [`RegionId`] that contains it and a [`BlockOffset`] within that
//! region. Splitting uses Euclidean division so negative coordinates land
//! in the region below zero rather than being folded onto region 0.

use std::fmt;

/// Number of blocks along each edge of a region.
pub const REGION_EDGE: usize = 32;

/// Number of blocks in one region.
pub const REGION_VOLUME: usize = REGION_EDGE * REGION_EDGE * REGION_EDGE;

const EDGE: i32 = REGION_EDGE as i32;

/// Spatial address of a region, in region units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId {
    /// Region x coordinate.
    pub x: i32,
    /// Region y coordinate.
    pub y: i32,
    /// Region z coordinate.
    pub z: i32,
}

impl RegionId {
    /// Construct a region address.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The absolute address of the block at `offset` in this region.
    pub fn block(self, offset: BlockOffset) -> BlockAddress {
        BlockAddress {
            x: self.x * EDGE + i32::from(offset.x),
            y: self.y * EDGE + i32::from(offset.y),
            z: self.z * EDGE + i32::from(offset.z),
        }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Absolute position of a single block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockAddress {
    /// Block x coordinate.
    pub x: i32,
    /// Block y coordinate.
    pub y: i32,
    /// Block z coordinate.
    pub z: i32,
}

impl BlockAddress {
    /// Construct a block address.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The region containing this block.
    pub fn region(self) -> RegionId {
        RegionId {
            x: self.x.div_euclid(EDGE),
            y: self.y.div_euclid(EDGE),
            z: self.z.div_euclid(EDGE),
        }
    }

    /// This block's position within its region.
    pub fn offset(self) -> BlockOffset {
        // rem_euclid with a positive divisor is always in [0, EDGE).
        BlockOffset {
            x: self.x.rem_euclid(EDGE) as u8,
            y: self.y.rem_euclid(EDGE) as u8,
            z: self.z.rem_euclid(EDGE) as u8,
        }
    }

    /// The block displaced by `(dx, dy, dz)`.
    pub fn relative(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// Position of a block inside its region. Each component is `< REGION_EDGE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockOffset {
    /// Offset along x.
    pub x: u8,
    /// Offset along y.
    pub y: u8,
    /// Offset along z.
    pub z: u8,
}

impl BlockOffset {
    /// Construct an offset.
    ///
    /// # Panics
    ///
    /// Panics if any component is not below [`REGION_EDGE`].
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        assert!(
            usize::from(x) < REGION_EDGE && usize::from(y) < REGION_EDGE && usize::from(z) < REGION_EDGE,
            "block offset ({x}, {y}, {z}) outside region"
        );
        Self { x, y, z }
    }

    /// Linear index into a region's block array (x-major, then y, then z).
    pub fn index(self) -> usize {
        (usize::from(self.x) * REGION_EDGE + usize::from(self.y)) * REGION_EDGE
            + usize::from(self.z)
    }
}
