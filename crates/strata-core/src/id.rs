//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a mobile entity within the world.
///
/// Entity ids are assigned by the authority and never reused while the
/// entity is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Monotonically increasing tick counter.
///
/// `TickId(0)` is the state before the first tick has run; each completed
/// tick publishes a snapshot tagged with the next value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl TickId {
    /// The tick that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Client-local sequence number of a speculatively applied action.
///
/// Commit numbers start at 1 and increase strictly. The server reports
/// the highest commit number it has incorporated, which lets the client
/// discard the matching undo entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitNumber(pub u64);

impl CommitNumber {
    /// The commit number that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CommitNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CommitNumber {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// A voxel type. `BlockId::AIR` is the empty block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The empty block every fresh region is filled with.
    pub const AIR: BlockId = BlockId(0);

    /// Whether this is the empty block.
    pub fn is_air(self) -> bool {
        self == Self::AIR
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for BlockId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// An item type held in an [`Inventory`](crate::inventory::Inventory).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u16);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ItemId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_and_commit_advance() {
        assert_eq!(TickId(0).next(), TickId(1));
        assert_eq!(CommitNumber(41).next(), CommitNumber(42));
        assert!(CommitNumber(2) > CommitNumber(1));
    }

    #[test]
    fn air_is_default_block() {
        assert!(BlockId::default().is_air());
        assert!(!BlockId(3).is_air());
        assert_eq!(BlockId::from(7u16), BlockId(7));
    }
}
