//! Strata: a parallel tick engine for voxel worlds, with client-side
//! speculative projection.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Strata sub-crates. For most users, adding `strata` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use strata::prelude::*;
//!
//! // Flips a block between air and stone; its own inverse.
//! #[derive(Clone, Copy, Debug)]
//! struct Toggle(BlockAddress);
//!
//! impl Mutation for Toggle {
//!     fn location(&self) -> BlockAddress {
//!         self.0
//!     }
//!
//!     fn apply(&self, _ctx: &mut TickContext<'_>, region: &mut MutableRegion) -> bool {
//!         let offset = self.0.offset();
//!         let next = if region.block(offset).is_air() { BlockId(1) } else { BlockId::AIR };
//!         region.set_block(offset, next);
//!         true
//!     }
//!
//!     fn apply_reversible(
//!         &self,
//!         ctx: &mut TickContext<'_>,
//!         region: &mut MutableRegion,
//!     ) -> Option<Box<dyn Mutation>> {
//!         self.apply(ctx, region);
//!         Some(Box::new(*self))
//!     }
//! }
//!
//! let origin = RegionId::new(0, 0, 0);
//! let spot = BlockAddress::new(1, 2, 3);
//!
//! // Server side: one tick on two workers.
//! let world = WorldSnapshot::new(TickId(0)).with_region(Region::empty(origin));
//! let mut engine = TickCoordinator::new(EngineConfig::with_workers(2), world)?;
//! engine.start()?;
//! engine.enqueue_mutation(Box::new(Toggle(spot)));
//! engine.start_next_tick()?;
//! let snapshot = engine.wait_for_previous_tick();
//! assert_eq!(snapshot.region(origin).unwrap().block(spot.offset()), BlockId(1));
//! engine.shutdown()?;
//!
//! // Client side: the same region, confirmed by the server's batch.
//! let mut client = SpeculativeProjection::new();
//! client.loaded_region(Arc::new(Region::empty(origin)))?;
//! let update = Operation::mutation(Toggle(spot));
//! client.apply_committed_mutations(TickId(1), &[], &[], vec![update], CommitNumber(0))?;
//! assert_eq!(client.region(origin).unwrap().block(spot.offset()), BlockId(1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `strata-core` | IDs, regions, entities, snapshots, operation traits |
//! | [`engine`] | `strata-engine` | The parallel tick coordinator and its parts |
//! | [`projection`] | `strata-projection` | Client-side speculation and reconciliation |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`strata-core`).
///
/// Contains the world data model and the [`types::Mutation`] and
/// [`types::Action`] contracts every operation implements.
pub use strata_core as types;

/// The authoritative tick engine (`strata-engine`).
///
/// [`engine::TickCoordinator`] owns the world and applies queued
/// operations once per tick across a pool of workers.
pub use strata_engine as engine;

/// Client-side speculative projection (`strata-projection`).
///
/// [`projection::SpeculativeProjection`] applies local actions ahead of
/// the server and reconciles with its authoritative batches.
pub use strata_projection as projection;

/// Common imports for typical Strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use strata_core::{
        Action, BlockAddress, BlockId, CommitNumber, Entity, EntityId, Exports, ItemId, Location,
        Mutation, MutableEntity, MutableRegion, Region, RegionId, TickContext, TickId,
        WorldReader, WorldSnapshot,
    };

    // Errors
    pub use strata_core::{EngineError, ProjectionError};

    // Engine
    pub use strata_engine::{EngineConfig, TickCoordinator, TickListener, TickMetrics};

    // Projection
    pub use strata_projection::{Operation, ProjectionListener, SpeculativeProjection};
}
