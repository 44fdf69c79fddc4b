//! The tick coordinator: worker lifecycle and the between-ticks merge.
//!
//! # Architecture
//!
//! ```text
//! Caller                        Workers (N)                  Last worker
//!   |                              |                              |
//!   |--enqueue_*()--> ingress ch   |                              |
//!   |--start_next_tick()---------->| (parked in barrier) -------->| merge fragments
//!   |   requested += 1             |                              | publish snapshot
//!   |                              |                              | wait for request
//!   |                              |                              | drain ingress
//!   |                              |                              | prepare TickInput
//!   |                              |<--release_waiting_threads----|
//!   |                              | apply claimed units          |
//!   |                              | push fragment                |
//!   |<--wait_for_previous_tick()---| synchronize_and_release_last |
//! ```
//!
//! All workers take part in every tick. The one that reaches the barrier
//! last does the merge for the tick that just ended and prepares the next
//! one while the rest stay parked, so there is never more than one tick
//! in flight and nothing touches the snapshot concurrently with a merge.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use strata_core::{
    Action, EngineError, Entity, EntityId, Exports, Mutation, Region, RegionId, TickId,
    WorldSnapshot,
};
use tracing::{debug, error, info, trace, warn};

use crate::applicator::{apply_claimed_units, merge_fragments, TickFragment, TickInput};
use crate::barrier::TickBarrier;
use crate::config::{ConfigError, EngineConfig};
use crate::distributor::ProcessorElement;
use crate::ingress::{prepare_tick, Ingress, Orphan};
use crate::listener::{NoopListener, TickListener};
use crate::metrics::TickMetrics;

// ── State ──────────────────────────────────────────────────────────

/// Lifecycle state of a [`TickCoordinator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No worker threads exist.
    Stopped,
    /// Workers are parked waiting for the first tick of this run.
    Running,
    /// A tick has been requested and has not been published yet.
    TickInFlight,
    /// Every requested tick has been published.
    TickComplete,
    /// `shutdown()` is waiting for workers to exit.
    ShuttingDown,
}

/// Report from [`TickCoordinator::shutdown`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tick of the last published snapshot.
    pub final_tick: TickId,
    /// Number of worker threads joined.
    pub workers_joined: usize,
}

struct Control {
    state: CoordinatorState,
    /// Highest tick a caller has asked for.
    requested: TickId,
    stop: bool,
    snapshot: Arc<WorldSnapshot>,
    /// Secondary operations waiting for the next tick.
    carried: Exports,
    metrics: TickMetrics,
}

/// The tick currently being computed by the workers.
struct InFlight {
    input: TickInput,
    started: Instant,
    missing: u64,
}

struct Shared {
    workers: usize,
    barrier: TickBarrier,
    counter: AtomicUsize,
    /// `None` tells workers to exit.
    phase: RwLock<Option<Arc<InFlight>>>,
    fragments: Mutex<Vec<TickFragment>>,
    control: Mutex<Control>,
    control_changed: Condvar,
    ingress: Receiver<Ingress>,
    listener: Arc<dyn TickListener>,
}

// Compile-time assertion: Shared crosses into every worker thread.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Shared>();
};

// ── TickCoordinator ────────────────────────────────────────────────

/// Parallel, barrier-synchronized tick engine.
///
/// Holds the authoritative [`WorldSnapshot`]. Operations enqueued between
/// ticks are applied by the next tick; secondary operations they emit are
/// applied by the tick after that.
pub struct TickCoordinator {
    config: EngineConfig,
    shared: Arc<Shared>,
    ingress: Sender<Ingress>,
    handles: Vec<JoinHandle<()>>,
}

impl TickCoordinator {
    /// Create a stopped coordinator over `initial`.
    pub fn new(config: EngineConfig, initial: WorldSnapshot) -> Result<Self, ConfigError> {
        Self::with_listener(config, initial, Arc::new(NoopListener))
    }

    /// Create a stopped coordinator that reports to `listener`.
    pub fn with_listener(
        config: EngineConfig,
        initial: WorldSnapshot,
        listener: Arc<dyn TickListener>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let workers = config.resolved_worker_count();
        let (tx, rx) = crossbeam_channel::unbounded();
        let tick = initial.tick();
        let shared = Arc::new(Shared {
            workers,
            barrier: TickBarrier::new(workers),
            counter: AtomicUsize::new(0),
            phase: RwLock::new(None),
            fragments: Mutex::new(Vec::with_capacity(workers)),
            control: Mutex::new(Control {
                state: CoordinatorState::Stopped,
                requested: tick,
                stop: false,
                snapshot: Arc::new(initial),
                carried: Exports::default(),
                metrics: TickMetrics {
                    tick,
                    ..TickMetrics::default()
                },
            }),
            control_changed: Condvar::new(),
            ingress: rx,
            listener,
        });
        Ok(Self {
            config,
            shared,
            ingress: tx,
            handles: Vec::new(),
        })
    }

    /// Spawn the worker threads. They park until the first
    /// [`start_next_tick`](Self::start_next_tick).
    pub fn start(&mut self) -> Result<(), EngineError> {
        if !self.handles.is_empty() {
            return Err(EngineError::AlreadyRunning);
        }
        {
            let mut control = self.shared.control.lock();
            control.stop = false;
            control.state = CoordinatorState::Running;
            control.requested = control.snapshot.tick();
        }
        *self.shared.phase.write() = None;
        self.shared.fragments.lock().clear();
        self.shared.barrier.reset();

        for i in 0..self.shared.workers {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{i}", self.config.thread_name))
                .spawn(move || worker_main(&shared, i));
            match spawned {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    self.abandon_start();
                    return Err(EngineError::ThreadSpawnFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            workers = self.shared.workers,
            tick = %self.current_tick(),
            "tick coordinator started"
        );
        Ok(())
    }

    /// Tear down a partially spawned worker set.
    fn abandon_start(&mut self) {
        {
            let mut control = self.shared.control.lock();
            control.stop = true;
        }
        self.shared.control_changed.notify_all();
        self.shared.barrier.dissolve();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        let mut control = self.shared.control.lock();
        control.stop = false;
        control.state = CoordinatorState::Stopped;
    }

    /// Request the next tick and return without waiting for it.
    ///
    /// Requests queue up: calling this twice runs two ticks back to back.
    /// Returns the id of the requested tick.
    pub fn start_next_tick(&self) -> Result<TickId, EngineError> {
        let requested = {
            let mut control = self.shared.control.lock();
            if self.handles.is_empty() || control.stop {
                return Err(EngineError::NotRunning);
            }
            control.requested = control.requested.next();
            control.state = CoordinatorState::TickInFlight;
            control.requested
        };
        self.shared.control_changed.notify_all();
        Ok(requested)
    }

    /// Block until every requested tick has been published, then return
    /// the latest snapshot.
    ///
    /// Returns immediately when nothing is in flight.
    pub fn wait_for_previous_tick(&self) -> Arc<WorldSnapshot> {
        let mut control = self.shared.control.lock();
        while control.snapshot.tick() < control.requested {
            self.shared.control_changed.wait(&mut control);
        }
        Arc::clone(&control.snapshot)
    }

    /// Queue a mutation for the next tick.
    pub fn enqueue_mutation(&self, mutation: Box<dyn Mutation>) {
        self.submit(Ingress::Mutation(mutation));
    }

    /// Queue an action against `entity` for the next tick.
    pub fn enqueue_action(&self, entity: EntityId, action: Box<dyn Action>) {
        self.submit(Ingress::Action(entity, action));
    }

    /// Add a region before the next tick.
    pub fn load_region(&self, region: Arc<Region>) {
        self.submit(Ingress::LoadRegion(region));
    }

    /// Remove a region before the next tick.
    pub fn unload_region(&self, id: RegionId) {
        self.submit(Ingress::UnloadRegion(id));
    }

    /// Add an entity before the next tick.
    pub fn load_entity(&self, entity: Arc<Entity>) {
        self.submit(Ingress::LoadEntity(entity));
    }

    /// Remove an entity before the next tick.
    pub fn unload_entity(&self, id: EntityId) {
        self.submit(Ingress::UnloadEntity(id));
    }

    fn submit(&self, item: Ingress) {
        // `shared` owns the receiver, so the channel outlives `self`.
        let _ = self.ingress.send(item);
    }

    /// Stop the workers at the next tick boundary and join them.
    ///
    /// A tick already in flight completes and is published; requested
    /// ticks that have not started are abandoned. Queued operations and
    /// carried secondary operations are kept for the next
    /// [`start`](Self::start).
    pub fn shutdown(&mut self) -> Result<ShutdownReport, EngineError> {
        if self.handles.is_empty() {
            return Err(EngineError::NotRunning);
        }
        {
            let mut control = self.shared.control.lock();
            control.stop = true;
            control.state = CoordinatorState::ShuttingDown;
        }
        self.shared.control_changed.notify_all();

        let mut workers_joined = 0;
        let mut failed = None;
        for (i, handle) in self.handles.drain(..).enumerate() {
            match handle.join() {
                Ok(()) => workers_joined += 1,
                Err(_) => {
                    failed.get_or_insert(EngineError::WorkerPanicked { worker: i });
                }
            }
        }

        let final_tick = {
            let mut control = self.shared.control.lock();
            control.stop = false;
            control.state = CoordinatorState::Stopped;
            control.requested = control.snapshot.tick();
            control.snapshot.tick()
        };
        self.shared.control_changed.notify_all();

        info!(%final_tick, workers_joined, "tick coordinator stopped");
        match failed {
            Some(e) => Err(e),
            None => Ok(ShutdownReport {
                final_tick,
                workers_joined,
            }),
        }
    }

    /// Tick of the latest published snapshot.
    pub fn current_tick(&self) -> TickId {
        self.shared.control.lock().snapshot.tick()
    }

    /// The latest published snapshot.
    pub fn latest_snapshot(&self) -> Arc<WorldSnapshot> {
        Arc::clone(&self.shared.control.lock().snapshot)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CoordinatorState {
        self.shared.control.lock().state
    }

    /// Metrics of the most recently published tick.
    pub fn last_metrics(&self) -> TickMetrics {
        self.shared.control.lock().metrics.clone()
    }

    /// Number of worker threads per run.
    pub fn worker_count(&self) -> usize {
        self.shared.workers
    }
}

impl Drop for TickCoordinator {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            let _ = self.shutdown();
        }
    }
}

// ── Workers ────────────────────────────────────────────────────────

/// Aborts the process if a worker unwinds. A tick cannot be recovered
/// from a partially applied unit.
struct AbortOnPanic {
    worker: usize,
}

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(worker = self.worker, "tick worker panicked; aborting");
            std::process::abort();
        }
    }
}

fn worker_main(shared: &Shared, worker: usize) {
    let _guard = AbortOnPanic { worker };
    loop {
        if shared.barrier.synchronize_and_release_last() {
            shared.advance();
        }
        let Some(flight) = shared.phase.read().clone() else {
            break;
        };
        let mut element = ProcessorElement::new(worker, &shared.counter);
        let fragment = apply_claimed_units(&flight.input, &mut element, &*shared.listener);
        shared.fragments.lock().push(fragment);
    }
}

impl Shared {
    /// Runs on the last worker through the barrier, with every other
    /// worker parked. Finishes the previous tick, waits for the next
    /// request, publishes the next tick's input and opens the barrier.
    fn advance(&self) {
        let finished = self.phase.write().take();
        if let Some(flight) = finished {
            self.publish(&flight);
        }

        let next = {
            let mut control = self.control.lock();
            while !control.stop && control.snapshot.tick() >= control.requested {
                self.control_changed.wait(&mut control);
            }
            if control.stop {
                None
            } else {
                let tick = control.snapshot.tick().next();
                let carried = mem::take(&mut control.carried);
                Some((tick, Arc::clone(&control.snapshot), carried))
            }
        };

        if let Some((tick, prior, carried)) = next {
            let started = Instant::now();
            let ingress: Vec<Ingress> = self.ingress.try_iter().collect();
            let prepared = prepare_tick(tick, &prior, carried, ingress);
            let missing = self.report_orphans(tick, prepared.orphans);
            *self.phase.write() = Some(Arc::new(InFlight {
                input: prepared.input,
                started,
                missing,
            }));
        }

        self.counter.store(0, Ordering::Relaxed);
        self.barrier.release_waiting_threads();
    }

    /// Merge the fragments of `flight` and make the result visible.
    fn publish(&self, flight: &InFlight) {
        let merge_start = Instant::now();
        let fragments = mem::take(&mut *self.fragments.lock());
        let merged = merge_fragments(&flight.input, fragments, self.workers);
        let merge_us = merge_start.elapsed().as_micros() as u64;

        let metrics = TickMetrics {
            tick: flight.input.tick(),
            total_us: flight.started.elapsed().as_micros() as u64,
            merge_us,
            committed_mutations: merged.counts.committed_mutations,
            dropped_mutations: merged.counts.dropped_mutations,
            committed_actions: merged.counts.committed_actions,
            dropped_actions: merged.counts.dropped_actions,
            exported_mutations: merged.exports.mutations.len() as u64,
            exported_actions: merged.exports.actions.len() as u64,
            missing_target_drops: flight.missing,
            units_per_worker: merged.units_per_worker,
        };

        debug!(
            tick = %metrics.tick,
            committed = metrics.committed(),
            dropped = metrics.dropped(),
            total_us = metrics.total_us,
            "tick complete"
        );
        self.listener.tick_completed(&metrics);

        {
            let mut control = self.control.lock();
            let mut exports = merged.exports;
            control.carried.append(&mut exports);
            control.snapshot = Arc::new(merged.snapshot);
            control.metrics = metrics;
            if control.state == CoordinatorState::TickInFlight
                && control.snapshot.tick() >= control.requested
            {
                control.state = CoordinatorState::TickComplete;
            }
        }
        self.control_changed.notify_all();
    }

    fn report_orphans(&self, tick: TickId, orphans: Vec<Orphan>) -> u64 {
        if orphans.is_empty() {
            return 0;
        }
        let count = orphans.len() as u64;
        for orphan in orphans {
            match orphan {
                Orphan::Mutation(mutation) => {
                    trace!(%tick, region = %mutation.target(), "mutation target not loaded");
                    self.listener.mutation_dropped(tick, &*mutation);
                }
                Orphan::Action(entity, action) => {
                    trace!(%tick, %entity, "action target not loaded");
                    self.listener.action_dropped(tick, &*action);
                }
            }
        }
        warn!(%tick, count, "dropped operations targeting unloaded regions or entities");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_test_utils::fixtures::*;
    use strata_test_utils::{at, TestWorldBuilder, STONE};

    fn world() -> WorldSnapshot {
        TestWorldBuilder::new().region_grid(2, 1, 1).build()
    }

    #[test]
    fn lifecycle_start_tick_shutdown() {
        let mut coord = TickCoordinator::new(EngineConfig::with_workers(2), world()).unwrap();
        assert_eq!(coord.state(), CoordinatorState::Stopped);
        coord.start().unwrap();
        assert_eq!(coord.state(), CoordinatorState::Running);

        assert_eq!(coord.start_next_tick().unwrap(), TickId(1));
        let snap = coord.wait_for_previous_tick();
        assert_eq!(snap.tick(), TickId(1));
        assert_eq!(coord.state(), CoordinatorState::TickComplete);

        let report = coord.shutdown().unwrap();
        assert_eq!(report.final_tick, TickId(1));
        assert_eq!(report.workers_joined, 2);
        assert_eq!(coord.state(), CoordinatorState::Stopped);
    }

    #[test]
    fn start_twice_is_an_error() {
        let mut coord = TickCoordinator::new(EngineConfig::with_workers(1), world()).unwrap();
        coord.start().unwrap();
        assert_eq!(coord.start(), Err(EngineError::AlreadyRunning));
        coord.shutdown().unwrap();
    }

    #[test]
    fn stopped_coordinator_refuses_ticks() {
        let mut coord = TickCoordinator::new(EngineConfig::with_workers(1), world()).unwrap();
        assert_eq!(coord.start_next_tick(), Err(EngineError::NotRunning));
        assert_eq!(coord.shutdown(), Err(EngineError::NotRunning));
        // Nothing in flight: returns the initial snapshot.
        assert_eq!(coord.wait_for_previous_tick().tick(), TickId(0));
    }

    #[test]
    fn invalid_config_rejected() {
        let result = TickCoordinator::new(EngineConfig::with_workers(0), world());
        assert!(matches!(result, Err(ConfigError::ZeroWorkers)));
    }

    #[test]
    fn queued_requests_run_back_to_back() {
        let mut coord = TickCoordinator::new(EngineConfig::with_workers(3), world()).unwrap();
        coord.start().unwrap();
        coord.start_next_tick().unwrap();
        coord.start_next_tick().unwrap();
        assert_eq!(coord.start_next_tick().unwrap(), TickId(3));
        assert_eq!(coord.wait_for_previous_tick().tick(), TickId(3));
        coord.shutdown().unwrap();
    }

    #[test]
    fn metrics_cover_every_unit() {
        let mut coord = TickCoordinator::new(EngineConfig::with_workers(2), world()).unwrap();
        coord.start().unwrap();
        coord.enqueue_mutation(Box::new(place(at(0, 0, 0), STONE)));
        coord.start_next_tick().unwrap();
        coord.wait_for_previous_tick();
        let m = coord.last_metrics();
        assert_eq!(m.tick, TickId(1));
        assert_eq!(m.committed_mutations, 1);
        assert_eq!(m.units(), 2);
        assert_eq!(m.units_per_worker.len(), 2);
        coord.shutdown().unwrap();
    }

    #[test]
    fn drop_shuts_down() {
        let mut coord = TickCoordinator::new(EngineConfig::with_workers(2), world()).unwrap();
        coord.start().unwrap();
        coord.start_next_tick().unwrap();
        drop(coord);
        // If this doesn't hang, shutdown worked.
    }
}
