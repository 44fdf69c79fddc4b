//! Observer hooks for operation outcomes and tick completion.

use strata_core::{Action, Mutation, TickId};

use crate::metrics::TickMetrics;

/// Receives operation outcomes from the tick coordinator.
///
/// Operation hooks are called from worker threads while a tick is in
/// flight, concurrently and in no particular order across units; within
/// one unit they follow enqueue order. `tick_completed` is called from
/// the merging thread once the tick's snapshot is built, just before
/// waiters can observe it. Implementations
/// must not block and must not call back into the coordinator.
///
/// Every method defaults to doing nothing.
pub trait TickListener: Send + Sync {
    /// A mutation applied to its region.
    fn mutation_committed(&self, tick: TickId, mutation: &dyn Mutation) {
        let _ = (tick, mutation);
    }

    /// A mutation was rejected, or its region was not loaded.
    fn mutation_dropped(&self, tick: TickId, mutation: &dyn Mutation) {
        let _ = (tick, mutation);
    }

    /// An action applied to its entity.
    fn action_committed(&self, tick: TickId, action: &dyn Action) {
        let _ = (tick, action);
    }

    /// An action was rejected, or its entity was not loaded.
    fn action_dropped(&self, tick: TickId, action: &dyn Action) {
        let _ = (tick, action);
    }

    /// A tick finished.
    fn tick_completed(&self, metrics: &TickMetrics) {
        let _ = metrics;
    }
}

/// A listener that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl TickListener for NoopListener {}
