//! Mobile entity state and its batching working copy.

use std::sync::Arc;

use crate::address::BlockAddress;
use crate::id::EntityId;
use crate::inventory::Inventory;

/// Continuous position of an entity, in block units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Location {
    /// X position.
    pub x: f32,
    /// Y position.
    pub y: f32,
    /// Z position.
    pub z: f32,
}

impl Location {
    /// Construct a location.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// This location shifted by `(dx, dy, dz)`.
    pub fn offset(self, dx: f32, dy: f32, dz: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The block this location falls in.
    pub fn block(self) -> BlockAddress {
        BlockAddress::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

/// Velocity of an entity, in blocks per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Velocity {
    /// Construct a velocity.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Immutable per-tick state of one entity. Shared as `Arc<Entity>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// Stable identifier.
    pub id: EntityId,
    /// Current position.
    pub location: Location,
    /// Current velocity.
    pub velocity: Velocity,
    /// Remaining health; 0 means dead.
    pub health: u8,
    /// Carried items.
    pub inventory: Inventory,
}

impl Entity {
    /// A full-health, stationary entity with an empty inventory.
    pub fn new(id: EntityId, location: Location) -> Self {
        Self {
            id,
            location,
            velocity: Velocity::default(),
            health: 100,
            inventory: Inventory::new(),
        }
    }
}

/// Working copy that batches mutator calls against one entity.
///
/// [`freeze`](MutableEntity::freeze) hands back the *original* `Arc` when
/// the batch left every field as it was, so downstream diffing can detect
/// a no-op by pointer identity alone.
#[derive(Debug)]
pub struct MutableEntity {
    original: Arc<Entity>,
    working: Entity,
}

impl MutableEntity {
    /// Start a working copy of `entity`.
    pub fn new(entity: Arc<Entity>) -> Self {
        Self {
            working: Entity::clone(&entity),
            original: entity,
        }
    }

    /// The entity's id.
    pub fn id(&self) -> EntityId {
        self.working.id
    }

    /// Read-only view of the working state.
    pub fn state(&self) -> &Entity {
        &self.working
    }

    /// Current location.
    pub fn location(&self) -> Location {
        self.working.location
    }

    /// Set the location.
    pub fn set_location(&mut self, location: Location) {
        self.working.location = location;
    }

    /// Current velocity.
    pub fn velocity(&self) -> Velocity {
        self.working.velocity
    }

    /// Set the velocity.
    pub fn set_velocity(&mut self, velocity: Velocity) {
        self.working.velocity = velocity;
    }

    /// Current health.
    pub fn health(&self) -> u8 {
        self.working.health
    }

    /// Set the health.
    pub fn set_health(&mut self, health: u8) {
        self.working.health = health;
    }

    /// Read-only inventory.
    pub fn inventory(&self) -> &Inventory {
        &self.working.inventory
    }

    /// Mutable inventory.
    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.working.inventory
    }

    /// Finish the batch.
    pub fn freeze(self) -> Arc<Entity> {
        if self.working == *self.original {
            self.original
        } else {
            Arc::new(self.working)
        }
    }
}
