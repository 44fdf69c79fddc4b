//! The undo log of speculative changes.
//!
//! Every successful speculative application pushes one [`ReverseEntry`]
//! holding the operation that undoes it, tagged with the local commit it
//! belongs to. A commit can own several entries (secondary operations,
//! merged actions); entries are always pushed in application order and
//! popped in reverse.

use std::fmt;

use strata_core::{Action, CommitNumber, Mutation};

/// A mutation or an action, for places that carry either.
pub enum Operation {
    /// A region mutation.
    Mutation(Box<dyn Mutation>),
    /// An entity action.
    Action(Box<dyn Action>),
}

impl Operation {
    /// Wrap a mutation.
    pub fn mutation(mutation: impl Mutation + 'static) -> Self {
        Self::Mutation(Box::new(mutation))
    }

    /// Wrap an action.
    pub fn action(action: impl Action + 'static) -> Self {
        Self::Action(Box::new(action))
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutation(m) => m.fmt(f),
            Self::Action(a) => a.fmt(f),
        }
    }
}

/// One undo step.
#[derive(Debug)]
pub struct ReverseEntry {
    /// Local commit the undone change belongs to.
    pub commit: CommitNumber,
    /// Operation that restores the state before the change.
    pub inverse: Operation,
}

/// LIFO of [`ReverseEntry`] in application order.
#[derive(Debug, Default)]
pub struct ReverseStack {
    entries: Vec<ReverseEntry>,
}

impl ReverseStack {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an undo step on top.
    pub fn push(&mut self, commit: CommitNumber, inverse: Operation) {
        debug_assert!(
            self.last_commit().is_none_or(|top| top <= commit),
            "undo entries must be pushed in commit order"
        );
        self.entries.push(ReverseEntry { commit, inverse });
    }

    /// Take the most recent undo step.
    pub fn pop(&mut self) -> Option<ReverseEntry> {
        self.entries.pop()
    }

    /// Commit of the most recent entry.
    pub fn last_commit(&self) -> Option<CommitNumber> {
        self.entries.last().map(|e| e.commit)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there is nothing to undo.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct commits with at least one entry.
    pub fn commit_count(&self) -> usize {
        let mut count = 0;
        let mut previous = None;
        for entry in &self.entries {
            if previous != Some(entry.commit) {
                count += 1;
                previous = Some(entry.commit);
            }
        }
        count
    }
}
