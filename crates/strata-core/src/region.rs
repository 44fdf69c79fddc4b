//! Region payloads and the copy-on-write handle operations mutate through.
//!
//! A [`Region`] is always shared as `Arc<Region>`: a published snapshot, a
//! worker's working copy and a client's loaded map can all point at the
//! same instance. [`MutableRegion`] clones the region the first time it is
//! written and never again, so readers of the prior instance are never
//! disturbed and an untouched region keeps its identity.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::address::{BlockOffset, RegionId, REGION_VOLUME};
use crate::id::BlockId;
use crate::inventory::Inventory;

/// The voxel state of one region.
///
/// `Clone` copies the whole block array; it is only invoked through
/// [`MutableRegion`] on the first write of a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    address: RegionId,
    blocks: Box<[BlockId]>,
    inventories: BTreeMap<BlockOffset, Inventory>,
}

impl Region {
    /// A region where every block is `fill`.
    pub fn filled(address: RegionId, fill: BlockId) -> Self {
        Self {
            address,
            blocks: vec![fill; REGION_VOLUME].into_boxed_slice(),
            inventories: BTreeMap::new(),
        }
    }

    /// An all-air region.
    pub fn empty(address: RegionId) -> Self {
        Self::filled(address, BlockId::AIR)
    }

    /// This region's address.
    pub fn address(&self) -> RegionId {
        self.address
    }

    /// The block at `offset`.
    pub fn block(&self, offset: BlockOffset) -> BlockId {
        self.blocks[offset.index()]
    }

    /// Overwrite the block at `offset`.
    pub fn set_block(&mut self, offset: BlockOffset, block: BlockId) {
        self.blocks[offset.index()] = block;
    }

    /// The container inventory stored at `offset`, if any.
    pub fn inventory(&self, offset: BlockOffset) -> Option<&Inventory> {
        self.inventories.get(&offset)
    }

    /// Replace (or with `None`, remove) the inventory at `offset`.
    /// Empty inventories are not stored.
    pub fn set_inventory(&mut self, offset: BlockOffset, inventory: Option<Inventory>) {
        match inventory {
            Some(inv) if !inv.is_empty() => {
                self.inventories.insert(offset, inv);
            }
            _ => {
                self.inventories.remove(&offset);
            }
        }
    }

    /// Number of blocks that are not air.
    pub fn solid_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_air()).count()
    }
}

/// Copy-on-write write handle over a shared region.
///
/// Reads go to the current instance. The first write clones the region
/// (via `Arc::make_mut`, since the original is still referenced) and all
/// later writes land in that private copy. Writes that would not change
/// anything are skipped so they never trigger the clone.
#[derive(Debug)]
pub struct MutableRegion {
    original: Arc<Region>,
    current: Arc<Region>,
}

impl MutableRegion {
    /// Start a working copy of `region`.
    pub fn new(region: Arc<Region>) -> Self {
        Self {
            current: Arc::clone(&region),
            original: region,
        }
    }

    /// Address of the region being mutated.
    pub fn address(&self) -> RegionId {
        self.current.address()
    }

    /// Read-only view of the current state.
    pub fn region(&self) -> &Region {
        &self.current
    }

    /// The block at `offset`.
    pub fn block(&self, offset: BlockOffset) -> BlockId {
        self.current.block(offset)
    }

    /// Overwrite the block at `offset`.
    pub fn set_block(&mut self, offset: BlockOffset, block: BlockId) {
        if self.current.block(offset) != block {
            Arc::make_mut(&mut self.current).set_block(offset, block);
        }
    }

    /// The container inventory at `offset`, if any.
    pub fn inventory(&self, offset: BlockOffset) -> Option<&Inventory> {
        self.current.inventory(offset)
    }

    /// Replace the container inventory at `offset`.
    pub fn set_inventory(&mut self, offset: BlockOffset, inventory: Option<Inventory>) {
        let unchanged = match (&inventory, self.current.inventory(offset)) {
            (Some(new), Some(old)) => new == old,
            (Some(new), None) => new.is_empty(),
            (None, old) => old.is_none(),
        };
        if !unchanged {
            Arc::make_mut(&mut self.current).set_inventory(offset, inventory);
        }
    }

    /// Whether any write has landed.
    pub fn is_modified(&self) -> bool {
        !Arc::ptr_eq(&self.original, &self.current)
    }

    /// Finish mutation. Returns the original instance if the content
    /// ended up equal to it, including when later writes undid earlier
    /// ones.
    pub fn freeze(self) -> Arc<Region> {
        if self.is_modified() && *self.current == *self.original {
            self.original
        } else {
            self.current
        }
    }
}
