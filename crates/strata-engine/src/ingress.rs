//! External requests and next-tick preparation.
//!
//! Everything that reaches the engine from outside a tick (operations,
//! region and entity loads, unloads) travels as an [`Ingress`] message
//! over an unbounded channel. Between ticks the merging thread drains the
//! channel and calls [`prepare_tick`], which applies membership changes
//! first and then queues operations: secondary operations carried over
//! from the previous tick before newly enqueued ones.

use std::sync::Arc;

use smallvec::SmallVec;
use strata_core::{
    Action, Entity, EntityId, Exports, Mutation, Region, RegionId, TickId, WorldSnapshot,
};

use crate::applicator::TickInput;

/// Per-region FIFO of pending mutations.
pub type MutationQueue = SmallVec<[Box<dyn Mutation>; 4]>;

/// Per-entity FIFO of pending actions.
pub type ActionQueue = SmallVec<[Box<dyn Action>; 4]>;

/// A request submitted to the coordinator from outside a tick.
#[derive(Debug)]
pub enum Ingress {
    /// Apply a mutation to its target region.
    Mutation(Box<dyn Mutation>),
    /// Apply an action to the given entity.
    Action(EntityId, Box<dyn Action>),
    /// Add a region, replacing any loaded region at the same address.
    LoadRegion(Arc<Region>),
    /// Remove a region.
    UnloadRegion(RegionId),
    /// Add an entity, replacing any loaded entity with the same id.
    LoadEntity(Arc<Entity>),
    /// Remove an entity.
    UnloadEntity(EntityId),
}

/// An operation whose target was not loaded when its tick was prepared.
#[derive(Debug)]
pub enum Orphan {
    /// A mutation for a missing region.
    Mutation(Box<dyn Mutation>),
    /// An action for a missing entity.
    Action(EntityId, Box<dyn Action>),
}

/// A tick ready to publish, plus everything that could not be queued.
#[derive(Debug)]
pub struct PreparedTick {
    /// Work for the workers.
    pub input: TickInput,
    /// Operations dropped for lack of a target, in submission order.
    pub orphans: Vec<Orphan>,
}

/// Build the input for `tick` from the previous snapshot, last tick's
/// secondary operations and the drained ingress queue.
pub fn prepare_tick(
    tick: TickId,
    prior: &Arc<WorldSnapshot>,
    carried: Exports,
    ingress: Vec<Ingress>,
) -> PreparedTick {
    let mut membership = Vec::new();
    let mut operations = Vec::new();
    for item in ingress {
        match item {
            Ingress::Mutation(_) | Ingress::Action(..) => operations.push(item),
            _ => membership.push(item),
        }
    }

    let world = if membership.is_empty() {
        Arc::clone(prior)
    } else {
        Arc::new(apply_membership(prior, membership))
    };

    let mut input = TickInput::new(tick, world);
    let mut orphans = Vec::new();

    for mutation in carried.mutations {
        if let Err(mutation) = input.push_mutation(mutation) {
            orphans.push(Orphan::Mutation(mutation));
        }
    }
    for action in carried.actions {
        let entity = action.target();
        if let Err(action) = input.push_action(entity, action) {
            orphans.push(Orphan::Action(entity, action));
        }
    }
    for item in operations {
        match item {
            Ingress::Mutation(mutation) => {
                if let Err(mutation) = input.push_mutation(mutation) {
                    orphans.push(Orphan::Mutation(mutation));
                }
            }
            Ingress::Action(entity, action) => {
                if let Err(action) = input.push_action(entity, action) {
                    orphans.push(Orphan::Action(entity, action));
                }
            }
            _ => {}
        }
    }

    PreparedTick { input, orphans }
}

fn apply_membership(prior: &WorldSnapshot, changes: Vec<Ingress>) -> WorldSnapshot {
    let (tick, mut regions, mut entities) = prior.clone().into_parts();
    for change in changes {
        match change {
            Ingress::LoadRegion(region) => {
                regions.insert(region.address(), region);
            }
            Ingress::UnloadRegion(id) => {
                regions.shift_remove(&id);
            }
            Ingress::LoadEntity(entity) => {
                entities.insert(entity.id, entity);
            }
            Ingress::UnloadEntity(id) => {
                entities.shift_remove(&id);
            }
            Ingress::Mutation(_) | Ingress::Action(..) => {}
        }
    }
    WorldSnapshot::from_parts(tick, regions, entities)
}
