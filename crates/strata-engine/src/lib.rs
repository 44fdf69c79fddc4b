//! Parallel, barrier-synchronized tick engine for Strata worlds.
//!
//! Provides the [`TickCoordinator`] that owns the authoritative world
//! snapshot and applies queued mutations and actions once per tick across
//! a pool of worker threads. Work is split dynamically with a bakery
//! counter ([`ProcessorElement`]); ticks are separated by a
//! [`TickBarrier`] whose last arriver merges the per-worker results.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod applicator;
pub mod barrier;
pub mod config;
pub mod coordinator;
pub mod distributor;
pub mod ingress;
pub mod listener;
pub mod metrics;

pub use applicator::{ApplyCounts, TickFragment, TickInput};
pub use barrier::TickBarrier;
pub use config::{ConfigError, EngineConfig};
pub use coordinator::{CoordinatorState, ShutdownReport, TickCoordinator};
pub use distributor::ProcessorElement;
pub use ingress::{ActionQueue, Ingress, MutationQueue};
pub use listener::{NoopListener, TickListener};
pub use metrics::TickMetrics;
