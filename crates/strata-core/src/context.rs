//! Execution context handed to every [`Mutation`] and [`Action`].
//!
//! Secondary operations emitted during `apply` are collected into an
//! append-only [`Exports`] value rather than dispatched through callbacks.
//! What happens to them is decided by whoever runs the operation:
//!
//! - the tick engine schedules them for the *next* tick;
//! - the projection applies them immediately for local actions;
//! - the projection discards them for authoritative updates and undo.

use std::sync::Arc;

use crate::address::RegionId;
use crate::entity::Entity;
use crate::id::{EntityId, TickId};
use crate::region::Region;
use crate::traits::{Action, Mutation, WorldReader};

/// Secondary operations produced while applying one operation.
#[derive(Debug, Default)]
pub struct Exports {
    /// Emitted region mutations, in emission order.
    pub mutations: Vec<Box<dyn Mutation>>,
    /// Emitted entity actions, in emission order.
    pub actions: Vec<Box<dyn Action>>,
}

impl Exports {
    /// Whether nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.actions.is_empty()
    }

    /// Append everything in `other`, preserving order.
    pub fn append(&mut self, other: &mut Exports) {
        self.mutations.append(&mut other.mutations);
        self.actions.append(&mut other.actions);
    }
}

/// Per-operation context: read access to the rest of the world plus the
/// sinks for secondary operations.
///
/// The reader reflects the state *before* the current batch. It must not
/// be used to read the unit being mutated; that goes through the mutable
/// handle passed alongside the context.
pub struct TickContext<'a> {
    current_tick: TickId,
    reader: &'a dyn WorldReader,
    exports: Exports,
}

impl<'a> TickContext<'a> {
    /// Create a context for an operation executing during `current_tick`.
    pub fn new(current_tick: TickId, reader: &'a dyn WorldReader) -> Self {
        Self {
            current_tick,
            reader,
            exports: Exports::default(),
        }
    }

    /// The tick this operation runs in.
    pub fn current_tick(&self) -> TickId {
        self.current_tick
    }

    /// Resolve another region as of the start of the batch.
    pub fn resolve_region(&self, id: RegionId) -> Option<Arc<Region>> {
        self.reader.region(id)
    }

    /// Resolve an entity as of the start of the batch.
    pub fn resolve_entity(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.reader.entity(id)
    }

    /// Emit a secondary mutation.
    pub fn emit_mutation(&mut self, mutation: Box<dyn Mutation>) {
        self.exports.mutations.push(mutation);
    }

    /// Emit a secondary action.
    pub fn emit_action(&mut self, action: Box<dyn Action>) {
        self.exports.actions.push(action);
    }

    /// Number of secondary operations emitted so far.
    pub fn emitted(&self) -> usize {
        self.exports.mutations.len() + self.exports.actions.len()
    }

    /// Consume the context, yielding what was emitted.
    pub fn into_exports(self) -> Exports {
        self.exports
    }
}
