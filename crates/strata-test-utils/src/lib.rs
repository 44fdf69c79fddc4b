//! Test utilities and operation fixtures for Strata development.
//!
//! Provides a [`TestWorldBuilder`] for assembling snapshots, a
//! [`MockWorldReader`] for driving operations outside the engine, and the
//! operation catalogue in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashMap;
use std::sync::Arc;

use strata_core::{
    BlockAddress, BlockId, Entity, EntityId, Inventory, Location, Region, RegionId, TickId,
    WorldReader, WorldSnapshot,
};

/// Builder for constructing test worlds with preconfigured state.
///
/// Regions and entities keep the order they were added in, which becomes
/// the enumeration order of the resulting snapshot.
#[derive(Default)]
pub struct TestWorldBuilder {
    tick: TickId,
    regions: Vec<Region>,
    entities: Vec<Entity>,
}

impl TestWorldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(mut self, tick: TickId) -> Self {
        self.tick = tick;
        self
    }

    /// Add an all-air region.
    pub fn region(mut self, id: RegionId) -> Self {
        self.regions.push(Region::empty(id));
        self
    }

    /// Add a block of `nx * ny * nz` all-air regions starting at the
    /// origin, x fastest.
    pub fn region_grid(mut self, nx: i32, ny: i32, nz: i32) -> Self {
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    self.regions.push(Region::empty(RegionId::new(x, y, z)));
                }
            }
        }
        self
    }

    /// Set a block, adding its region if it is not there yet.
    pub fn block(mut self, at: BlockAddress, block: BlockId) -> Self {
        self.region_mut(at.region()).set_block(at.offset(), block);
        self
    }

    /// Put a container inventory at a block, adding its region if needed.
    pub fn container(mut self, at: BlockAddress, inventory: Inventory) -> Self {
        self.region_mut(at.region())
            .set_inventory(at.offset(), Some(inventory));
        self
    }

    /// Add a full-health entity.
    pub fn entity(mut self, id: EntityId, location: Location) -> Self {
        self.entities.push(Entity::new(id, location));
        self
    }

    /// Add a prepared entity.
    pub fn entity_with(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn build(self) -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(self.tick);
        for region in self.regions {
            snap = snap.with_region(region);
        }
        for entity in self.entities {
            snap = snap.with_entity(entity);
        }
        snap
    }

    fn region_mut(&mut self, id: RegionId) -> &mut Region {
        let index = match self.regions.iter().position(|r| r.address() == id) {
            Some(i) => i,
            None => {
                self.regions.push(Region::empty(id));
                self.regions.len() - 1
            }
        };
        &mut self.regions[index]
    }
}

/// Mock implementation of [`WorldReader`].
///
/// Backed by two `HashMap`s. Counts lookups so tests can assert that an
/// operation did (or did not) consult other units.
#[derive(Default)]
pub struct MockWorldReader {
    regions: HashMap<RegionId, Arc<Region>>,
    entities: HashMap<EntityId, Arc<Entity>>,
    lookups: std::sync::atomic::AtomicUsize,
}

impl MockWorldReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_region(&mut self, region: Region) -> Arc<Region> {
        let region = Arc::new(region);
        self.regions.insert(region.address(), Arc::clone(&region));
        region
    }

    pub fn insert_entity(&mut self, entity: Entity) -> Arc<Entity> {
        let entity = Arc::new(entity);
        self.entities.insert(entity.id, Arc::clone(&entity));
        entity
    }

    /// Number of `region`/`entity` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl WorldReader for MockWorldReader {
    fn region(&self, id: RegionId) -> Option<Arc<Region>> {
        self.lookups
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.regions.get(&id).cloned()
    }

    fn entity(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.lookups
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.entities.get(&id).cloned()
    }
}

/// Shorthand for a block address.
pub fn at(x: i32, y: i32, z: i32) -> BlockAddress {
    BlockAddress::new(x, y, z)
}

/// Stone, for fixtures that need some non-air block.
pub const STONE: BlockId = BlockId(1);

/// Dirt, a second solid block.
pub const DIRT: BlockId = BlockId(2);
