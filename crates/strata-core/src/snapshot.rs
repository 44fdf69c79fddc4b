//! Immutable per-tick world state.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::address::RegionId;
use crate::entity::Entity;
use crate::id::{EntityId, TickId};
use crate::region::Region;
use crate::traits::WorldReader;

/// Every loaded region and entity as of the end of a tick.
///
/// Never mutated once published. The tick engine builds a fresh snapshot
/// each tick; regions and entities that did not change are carried over
/// as the same `Arc` instances, so consumers can diff two snapshots by
/// pointer identity.
///
/// Iteration order is insertion order and is identical for every reader
/// of the same snapshot, which is what lets worker threads enumerate work
/// units in one agreed sequence.
#[derive(Clone, Debug, Default)]
pub struct WorldSnapshot {
    tick: TickId,
    regions: IndexMap<RegionId, Arc<Region>>,
    entities: IndexMap<EntityId, Arc<Entity>>,
}

// Compile-time assertion: snapshots are shared across worker threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<WorldSnapshot>();
};

impl WorldSnapshot {
    /// An empty world at `tick`.
    pub fn new(tick: TickId) -> Self {
        Self {
            tick,
            regions: IndexMap::new(),
            entities: IndexMap::new(),
        }
    }

    /// Assemble a snapshot from prepared maps.
    pub fn from_parts(
        tick: TickId,
        regions: IndexMap<RegionId, Arc<Region>>,
        entities: IndexMap<EntityId, Arc<Entity>>,
    ) -> Self {
        Self {
            tick,
            regions,
            entities,
        }
    }

    /// Builder-style region insertion, keyed by the region's own address.
    pub fn with_region(mut self, region: Region) -> Self {
        self.regions.insert(region.address(), Arc::new(region));
        self
    }

    /// Builder-style entity insertion, keyed by the entity's own id.
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.insert(entity.id, Arc::new(entity));
        self
    }

    /// The tick that produced this snapshot.
    pub fn tick(&self) -> TickId {
        self.tick
    }

    /// Look up a region.
    pub fn region(&self, id: RegionId) -> Option<&Arc<Region>> {
        self.regions.get(&id)
    }

    /// Look up an entity.
    pub fn entity(&self, id: EntityId) -> Option<&Arc<Entity>> {
        self.entities.get(&id)
    }

    /// All regions in enumeration order.
    pub fn regions(&self) -> &IndexMap<RegionId, Arc<Region>> {
        &self.regions
    }

    /// All entities in enumeration order.
    pub fn entities(&self) -> &IndexMap<EntityId, Arc<Entity>> {
        &self.entities
    }

    /// Number of loaded regions.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Number of loaded entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Decompose into the tick and maps, for building the next snapshot.
    pub fn into_parts(
        self,
    ) -> (
        TickId,
        IndexMap<RegionId, Arc<Region>>,
        IndexMap<EntityId, Arc<Entity>>,
    ) {
        (self.tick, self.regions, self.entities)
    }
}

impl WorldReader for WorldSnapshot {
    fn region(&self, id: RegionId) -> Option<Arc<Region>> {
        self.regions.get(&id).cloned()
    }

    fn entity(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.entities.get(&id).cloned()
    }
}
