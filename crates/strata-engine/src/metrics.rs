//! Per-tick statistics for the tick coordinator.
//!
//! [`TickMetrics`] captures timing and operation counts for a single
//! tick. The merging thread fills it in after publishing the snapshot;
//! consumers read it through
//! [`TickCoordinator::last_metrics`](crate::TickCoordinator::last_metrics)
//! or receive it in [`TickListener::tick_completed`](crate::TickListener::tick_completed).

use strata_core::TickId;

/// Timing and operation counts collected during a single tick.
///
/// Durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// The tick these numbers describe.
    pub tick: TickId,
    /// Wall-clock time from tick preparation to snapshot publication.
    pub total_us: u64,
    /// Time the last worker spent merging partial results.
    pub merge_us: u64,
    /// Mutations that applied.
    pub committed_mutations: u64,
    /// Mutations rejected by their target region.
    pub dropped_mutations: u64,
    /// Actions that applied.
    pub committed_actions: u64,
    /// Actions rejected by their target entity.
    pub dropped_actions: u64,
    /// Secondary mutations scheduled for the next tick.
    pub exported_mutations: u64,
    /// Secondary actions scheduled for the next tick.
    pub exported_actions: u64,
    /// Operations dropped at preparation because their target was not
    /// loaded.
    pub missing_target_drops: u64,
    /// Work units claimed by each worker, indexed by worker.
    pub units_per_worker: Vec<usize>,
}

impl TickMetrics {
    /// Mutations and actions that applied.
    pub fn committed(&self) -> u64 {
        self.committed_mutations + self.committed_actions
    }

    /// Operations that were rejected or had no target.
    pub fn dropped(&self) -> u64 {
        self.dropped_mutations + self.dropped_actions + self.missing_target_drops
    }

    /// Total work units processed this tick.
    pub fn units(&self) -> usize {
        self.units_per_worker.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = TickMetrics::default();
        assert_eq!(m.tick, TickId(0));
        assert_eq!(m.total_us, 0);
        assert_eq!(m.merge_us, 0);
        assert_eq!(m.committed(), 0);
        assert_eq!(m.dropped(), 0);
        assert_eq!(m.exported_mutations, 0);
        assert_eq!(m.exported_actions, 0);
        assert!(m.units_per_worker.is_empty());
    }

    #[test]
    fn totals_sum_their_parts() {
        let m = TickMetrics {
            committed_mutations: 3,
            committed_actions: 2,
            dropped_mutations: 1,
            dropped_actions: 4,
            missing_target_drops: 5,
            units_per_worker: vec![3, 0, 7],
            ..TickMetrics::default()
        };
        assert_eq!(m.committed(), 5);
        assert_eq!(m.dropped(), 10);
        assert_eq!(m.units(), 10);
    }
}
