//! Operation contracts shared by the tick engine and the projection.
//!
//! A [`Mutation`] changes one region; an [`Action`] changes one entity.
//! Both come in two flavours of application: plain `apply`, used by the
//! authority, and `apply_reversible`, used on the speculative client
//! timeline, which additionally returns the operation that undoes it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::address::{BlockAddress, RegionId};
use crate::context::TickContext;
use crate::entity::{Entity, MutableEntity};
use crate::id::EntityId;
use crate::region::{MutableRegion, Region};

/// Read-only view of world state used to resolve *other* units during an
/// operation.
///
/// Returns `None` for anything not loaded; operations must treat that as
/// an ordinary rejection because regions and entities can unload between
/// scheduling and execution.
pub trait WorldReader {
    /// Resolve a region.
    fn region(&self, id: RegionId) -> Option<Arc<Region>>;

    /// Resolve an entity.
    fn entity(&self, id: EntityId) -> Option<Arc<Entity>>;
}

/// A change to a single region.
///
/// Implementations must check their preconditions before writing: a
/// mutation that returns `false` (or `None`) must leave the handle as it
/// found it.
pub trait Mutation: Send + Sync + fmt::Debug {
    /// The block this mutation is about.
    fn location(&self) -> BlockAddress;

    /// The region this mutation must be applied to.
    fn target(&self) -> RegionId {
        self.location().region()
    }

    /// Apply against the working copy. Returns whether it took effect.
    fn apply(&self, ctx: &mut TickContext<'_>, region: &mut MutableRegion) -> bool;

    /// Apply and return the mutation that exactly restores the prior
    /// state, or `None` if this mutation was rejected.
    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        region: &mut MutableRegion,
    ) -> Option<Box<dyn Mutation>>;
}

/// A change to a single entity.
///
/// The same precondition rule as [`Mutation`] applies: rejection leaves
/// the working copy untouched.
pub trait Action: Send + Sync + fmt::Debug + Any {
    /// The entity this action applies to.
    fn target(&self) -> EntityId;

    /// Apply against the working copy. Returns whether it took effect.
    fn apply(&self, ctx: &mut TickContext<'_>, entity: &mut MutableEntity) -> bool;

    /// Apply and return the action that exactly restores the prior state,
    /// or `None` if this action was rejected.
    fn apply_reversible(
        &self,
        ctx: &mut TickContext<'_>,
        entity: &mut MutableEntity,
    ) -> Option<Box<dyn Action>>;

    /// Whether this action may be folded into the same local commit as
    /// `previous`, the last action applied against the same entity.
    ///
    /// Downcast `previous` through `&dyn Any` to inspect it.
    fn can_replace_previous(&self, previous: &dyn Action) -> bool {
        let _ = previous;
        false
    }
}
