//! Core types and operation contracts for the Strata tick engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! world data model (regions, entities, snapshots), the [`Mutation`] and
//! [`Action`] contracts that every operation implements, the
//! [`TickContext`] operations execute in, and the shared error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod address;
pub mod context;
pub mod entity;
pub mod error;
pub mod id;
pub mod inventory;
pub mod region;
pub mod snapshot;
pub mod traits;

pub use address::{BlockAddress, BlockOffset, RegionId, REGION_EDGE, REGION_VOLUME};
pub use context::{Exports, TickContext};
pub use entity::{Entity, Location, MutableEntity, Velocity};
pub use error::{EngineError, ProjectionError};
pub use id::{BlockId, CommitNumber, EntityId, ItemId, TickId};
pub use inventory::Inventory;
pub use region::{MutableRegion, Region};
pub use snapshot::WorldSnapshot;
pub use traits::{Action, Mutation, WorldReader};
