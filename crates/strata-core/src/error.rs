//! Error types for the Strata tick engine and speculative projection.
//!
//! A rejected operation is never an error: `apply` returning `false` is
//! the normal outcome of a lost race and is reported through listeners.
//! The variants here cover lifecycle misuse and the invariant violations
//! that mean a client has desynchronized from the authority.

use thiserror::Error;

use crate::address::RegionId;
use crate::id::{CommitNumber, EntityId};

/// Errors from the tick coordinator lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `start()` was called while workers are already running.
    #[error("tick coordinator is already running")]
    AlreadyRunning,
    /// The operation requires running workers.
    #[error("tick coordinator is not running")]
    NotRunning,
    /// A worker thread terminated abnormally and could not be joined.
    #[error("tick worker {worker} panicked")]
    WorkerPanicked {
        /// Index of the failed worker.
        worker: usize,
    },
    /// A worker thread could not be spawned.
    #[error("failed to spawn tick worker: {reason}")]
    ThreadSpawnFailed {
        /// OS-level description of the failure.
        reason: String,
    },
}

/// Errors from speculative projection reconciliation.
///
/// All variants except [`Poisoned`](ProjectionError::Poisoned) are
/// reported once, at the point the invariant broke; afterwards the
/// projection refuses further work.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// Undoing a speculative change failed; the reverse stack no longer
    /// describes the local state.
    #[error("reverse application for commit {commit} failed")]
    ReverseFailed {
        /// Commit number of the entry that could not be undone.
        commit: CommitNumber,
    },
    /// An authoritative region update did not apply to the baseline.
    #[error("authoritative mutation rejected by region {region}")]
    AuthoritativeMutationRejected {
        /// Region the update targeted.
        region: RegionId,
    },
    /// An authoritative entity update did not apply to the baseline.
    #[error("authoritative action rejected by entity {entity}")]
    AuthoritativeActionRejected {
        /// Entity the update targeted.
        entity: EntityId,
    },
    /// A previous invariant violation left the projection unusable.
    #[error("projection is poisoned by an earlier desynchronization")]
    Poisoned,
}
