//! Change notifications from the speculative projection.

use std::sync::Arc;

use strata_core::{CommitNumber, Entity, EntityId, Region, RegionId};

/// Receives the net effect of each projection call.
///
/// Notifications are batched: one call per region or entity whose final
/// value differs by identity from its value before the projection call,
/// delivered after the call has finished updating state.
///
/// Every method defaults to doing nothing.
pub trait ProjectionListener {
    /// A region was loaded or its content changed.
    fn region_changed(&mut self, id: RegionId, region: &Arc<Region>) {
        let _ = (id, region);
    }

    /// A region is no longer loaded.
    fn region_unloaded(&mut self, id: RegionId) {
        let _ = id;
    }

    /// An entity was loaded or its state changed.
    fn entity_changed(&mut self, entity: &Arc<Entity>) {
        let _ = entity;
    }

    /// An entity is no longer loaded.
    fn entity_unloaded(&mut self, id: EntityId) {
        let _ = id;
    }

    /// A speculative change could not be replayed on the new
    /// authoritative baseline and has snapped back.
    fn local_action_dropped(&mut self, commit: CommitNumber) {
        let _ = commit;
    }
}

impl ProjectionListener for () {}
