//! Parallel mutation applicator.
//!
//! One tick's work is described by a [`TickInput`]: the prior snapshot
//! plus a FIFO queue of operations per region and per entity. Every worker
//! runs [`apply_claimed_units`] over the same input; the
//! [`ProcessorElement`] decides which units each worker owns. Regions come
//! first in the unit sequence, then entities, both in snapshot order.
//!
//! Per claimed unit:
//!
//! - empty queue: the prior `Arc` is passed through untouched;
//! - otherwise: one working copy, every queued operation applied in
//!   order, secondary operations from successful ones collected for the
//!   next tick.
//!
//! [`merge_fragments`] folds the per-worker [`TickFragment`]s back into a
//! snapshot on the last thread through the barrier.

use std::sync::Arc;

use indexmap::IndexMap;
use strata_core::{
    Action, Entity, EntityId, Exports, Mutation, MutableEntity, MutableRegion, Region, RegionId,
    TickContext, TickId, WorldSnapshot,
};
use tracing::trace;

use crate::distributor::ProcessorElement;
use crate::ingress::{ActionQueue, MutationQueue};
use crate::listener::TickListener;

// ── TickInput ──────────────────────────────────────────────────────

/// Everything the workers need for one tick. Read-only once published.
#[derive(Debug)]
pub struct TickInput {
    tick: TickId,
    world: Arc<WorldSnapshot>,
    mutations: IndexMap<RegionId, MutationQueue>,
    actions: IndexMap<EntityId, ActionQueue>,
}

impl TickInput {
    /// Empty queues against `world`, for tick `tick`.
    pub fn new(tick: TickId, world: Arc<WorldSnapshot>) -> Self {
        Self {
            tick,
            world,
            mutations: IndexMap::new(),
            actions: IndexMap::new(),
        }
    }

    /// The tick being computed.
    pub fn tick(&self) -> TickId {
        self.tick
    }

    /// State as of the end of the previous tick.
    pub fn world(&self) -> &Arc<WorldSnapshot> {
        &self.world
    }

    /// Queue a mutation behind everything already queued for its region.
    ///
    /// Hands the mutation back if the region is not loaded.
    pub fn push_mutation(&mut self, mutation: Box<dyn Mutation>) -> Result<(), Box<dyn Mutation>> {
        let target = mutation.target();
        if self.world.region(target).is_none() {
            return Err(mutation);
        }
        self.mutations.entry(target).or_default().push(mutation);
        Ok(())
    }

    /// Queue an action for `entity`.
    ///
    /// Hands the action back if the entity is not loaded.
    pub fn push_action(
        &mut self,
        entity: EntityId,
        action: Box<dyn Action>,
    ) -> Result<(), Box<dyn Action>> {
        if self.world.entity(entity).is_none() {
            return Err(action);
        }
        self.actions.entry(entity).or_default().push(action);
        Ok(())
    }

    /// Length of the unit sequence: every region, then every entity.
    pub fn unit_count(&self) -> usize {
        self.world.region_count() + self.world.entity_count()
    }

    /// Number of queued operations across all units.
    pub fn queued(&self) -> usize {
        self.mutations.values().map(|q| q.len()).sum::<usize>()
            + self.actions.values().map(|q| q.len()).sum::<usize>()
    }
}

// ── TickFragment ───────────────────────────────────────────────────

/// Applied and dropped operation counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyCounts {
    /// Mutations that applied.
    pub committed_mutations: u64,
    /// Mutations their region rejected.
    pub dropped_mutations: u64,
    /// Actions that applied.
    pub committed_actions: u64,
    /// Actions their entity rejected.
    pub dropped_actions: u64,
}

impl ApplyCounts {
    fn add(&mut self, other: ApplyCounts) {
        self.committed_mutations += other.committed_mutations;
        self.dropped_mutations += other.dropped_mutations;
        self.committed_actions += other.committed_actions;
        self.dropped_actions += other.dropped_actions;
    }
}

/// One worker's share of a tick.
#[derive(Debug, Default)]
pub struct TickFragment {
    /// Worker that produced this fragment.
    pub worker: usize,
    /// New state of every region this worker claimed.
    pub regions: Vec<(RegionId, Arc<Region>)>,
    /// New state of every entity this worker claimed.
    pub entities: Vec<(EntityId, Arc<Entity>)>,
    /// Secondary operations, tagged with the index of the unit that
    /// emitted them.
    pub exports: Vec<(usize, Exports)>,
    /// Outcome counts.
    pub counts: ApplyCounts,
    /// Number of units claimed.
    pub units_claimed: usize,
}

// ── Apply ──────────────────────────────────────────────────────────

/// Walk the unit sequence of `input`, processing the units `element`
/// claims.
pub fn apply_claimed_units(
    input: &TickInput,
    element: &mut ProcessorElement<'_>,
    listener: &dyn TickListener,
) -> TickFragment {
    let mut fragment = TickFragment {
        worker: element.thread_id(),
        ..TickFragment::default()
    };
    let world = input.world.as_ref();

    for (index, (&id, region)) in world.regions().iter().enumerate() {
        if !element.handle_next_work_unit() {
            continue;
        }
        let region = match input.mutations.get(&id) {
            Some(queue) if !queue.is_empty() => {
                let (region, exports) =
                    apply_mutations(input, region, queue, listener, &mut fragment.counts);
                if !exports.is_empty() {
                    fragment.exports.push((index, exports));
                }
                region
            }
            _ => Arc::clone(region),
        };
        fragment.regions.push((id, region));
    }

    let offset = world.region_count();
    for (i, (&id, entity)) in world.entities().iter().enumerate() {
        if !element.handle_next_work_unit() {
            continue;
        }
        let entity = match input.actions.get(&id) {
            Some(queue) if !queue.is_empty() => {
                let (entity, exports) =
                    apply_actions(input, entity, queue, listener, &mut fragment.counts);
                if !exports.is_empty() {
                    fragment.exports.push((offset + i, exports));
                }
                entity
            }
            _ => Arc::clone(entity),
        };
        fragment.entities.push((id, entity));
    }

    fragment.units_claimed = element.owned();
    fragment
}

fn apply_mutations(
    input: &TickInput,
    region: &Arc<Region>,
    queue: &MutationQueue,
    listener: &dyn TickListener,
    counts: &mut ApplyCounts,
) -> (Arc<Region>, Exports) {
    let mut handle = MutableRegion::new(Arc::clone(region));
    let mut exports = Exports::default();
    for mutation in queue {
        let mut ctx = TickContext::new(input.tick, &*input.world);
        if mutation.apply(&mut ctx, &mut handle) {
            counts.committed_mutations += 1;
            exports.append(&mut ctx.into_exports());
            listener.mutation_committed(input.tick, &**mutation);
        } else {
            counts.dropped_mutations += 1;
            trace!(tick = %input.tick, region = %handle.address(), ?mutation, "mutation dropped");
            listener.mutation_dropped(input.tick, &**mutation);
        }
    }
    (handle.freeze(), exports)
}

fn apply_actions(
    input: &TickInput,
    entity: &Arc<Entity>,
    queue: &ActionQueue,
    listener: &dyn TickListener,
    counts: &mut ApplyCounts,
) -> (Arc<Entity>, Exports) {
    let mut handle = MutableEntity::new(Arc::clone(entity));
    let mut exports = Exports::default();
    for action in queue {
        let mut ctx = TickContext::new(input.tick, &*input.world);
        if action.apply(&mut ctx, &mut handle) {
            counts.committed_actions += 1;
            exports.append(&mut ctx.into_exports());
            listener.action_committed(input.tick, &**action);
        } else {
            counts.dropped_actions += 1;
            trace!(tick = %input.tick, entity = %handle.id(), ?action, "action dropped");
            listener.action_dropped(input.tick, &**action);
        }
    }
    (handle.freeze(), exports)
}

// ── Merge ──────────────────────────────────────────────────────────

/// The result of folding every fragment of a tick together.
#[derive(Debug)]
pub struct MergedTick {
    /// The new snapshot, in the same order as the prior one.
    pub snapshot: WorldSnapshot,
    /// Secondary operations for the next tick, in unit order.
    pub exports: Exports,
    /// Summed outcome counts.
    pub counts: ApplyCounts,
    /// Units claimed per worker.
    pub units_per_worker: Vec<usize>,
}

/// Fold `fragments` into the snapshot for `input.tick()`.
///
/// Units no fragment mentions keep their prior state. Exports are ordered
/// by the unit that emitted them, which makes the next tick's queues
/// independent of which worker ran which unit.
pub fn merge_fragments(input: &TickInput, fragments: Vec<TickFragment>, workers: usize) -> MergedTick {
    let (_, mut regions, mut entities) = WorldSnapshot::clone(&input.world).into_parts();
    let mut counts = ApplyCounts::default();
    let mut units_per_worker = vec![0; workers];
    let mut tagged = Vec::new();

    for fragment in fragments {
        for (id, region) in fragment.regions {
            if let Some(slot) = regions.get_mut(&id) {
                *slot = region;
            }
        }
        for (id, entity) in fragment.entities {
            if let Some(slot) = entities.get_mut(&id) {
                *slot = entity;
            }
        }
        counts.add(fragment.counts);
        if let Some(slot) = units_per_worker.get_mut(fragment.worker) {
            *slot += fragment.units_claimed;
        }
        tagged.extend(fragment.exports);
    }

    tagged.sort_by_key(|(index, _)| *index);
    let mut exports = Exports::default();
    for (_, mut unit_exports) in tagged {
        exports.append(&mut unit_exports);
    }

    MergedTick {
        snapshot: WorldSnapshot::from_parts(input.tick, regions, entities),
        exports,
        counts,
        units_per_worker,
    }
}
