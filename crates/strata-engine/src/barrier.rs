//! Reusable thread barrier with a "last arriver merges" variant.
//!
//! A tick is a globally ordered checkpoint: no worker may start tick
//! `n + 1` until every worker has finished tick `n`. [`TickBarrier`]
//! enforces that with a generation counter so the same barrier can be
//! crossed once per tick forever.
//!
//! [`synchronize_and_release_last`](TickBarrier::synchronize_and_release_last)
//! lets the last thread through early while everyone else stays parked.
//! That thread does the between-ticks work (merge, ingress, publish) and
//! then opens the barrier with
//! [`release_waiting_threads`](TickBarrier::release_waiting_threads).

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    dissolved: bool,
}

/// Generation-counting barrier for a fixed number of parties.
#[derive(Debug)]
pub struct TickBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

// Compile-time assertion: the barrier is shared by every worker.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<TickBarrier>();
};

impl TickBarrier {
    /// Create a barrier for `parties` threads.
    ///
    /// # Panics
    ///
    /// Panics if `parties` is zero.
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "a barrier needs at least one party");
        Self {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                dissolved: false,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Number of threads that must arrive before the barrier opens.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Block until all parties have called this, then release them
    /// together.
    pub fn synchronize_threads(&self) {
        let mut state = self.state.lock();
        if state.dissolved {
            return;
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = generation.wrapping_add(1);
            self.cvar.notify_all();
            return;
        }
        while state.generation == generation && !state.dissolved {
            self.cvar.wait(&mut state);
        }
    }

    /// Block until all parties have arrived. Returns `true` on exactly one
    /// thread, the last to arrive, which proceeds immediately while every
    /// other party stays blocked until
    /// [`release_waiting_threads`](Self::release_waiting_threads).
    ///
    /// Returns `false` without blocking once the barrier is dissolved.
    pub fn synchronize_and_release_last(&self) -> bool {
        let mut state = self.state.lock();
        if state.dissolved {
            return false;
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            return true;
        }
        while state.generation == generation && !state.dissolved {
            self.cvar.wait(&mut state);
        }
        false
    }

    /// Wake every thread currently parked in the barrier and start a new
    /// generation.
    pub fn release_waiting_threads(&self) {
        let mut state = self.state.lock();
        state.arrived = 0;
        state.generation = state.generation.wrapping_add(1);
        self.cvar.notify_all();
    }

    /// Permanently open the barrier: wake everyone and let all later
    /// arrivals pass straight through until [`reset`](Self::reset).
    pub fn dissolve(&self) {
        let mut state = self.state.lock();
        state.dissolved = true;
        state.arrived = 0;
        state.generation = state.generation.wrapping_add(1);
        self.cvar.notify_all();
    }

    /// Return a dissolved barrier to service.
    ///
    /// Only valid while no thread is inside the barrier.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.dissolved = false;
        state.arrived = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_party_never_blocks() {
        let barrier = TickBarrier::new(1);
        barrier.synchronize_threads();
        assert!(barrier.synchronize_and_release_last());
        barrier.release_waiting_threads();
        assert!(barrier.synchronize_and_release_last());
    }

    #[test]
    #[should_panic(expected = "at least one party")]
    fn zero_parties_rejected() {
        let _ = TickBarrier::new(0);
    }

    #[test]
    fn nobody_passes_before_everyone_arrives() {
        const THREADS: usize = 4;
        const ROUNDS: usize = 50;
        let barrier = Arc::new(TickBarrier::new(THREADS));
        let arrivals = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let arrivals = Arc::clone(&arrivals);
                thread::spawn(move || {
                    for round in 0..ROUNDS {
                        arrivals.fetch_add(1, Ordering::SeqCst);
                        barrier.synchronize_threads();
                        // Every party of this round has arrived.
                        assert!(arrivals.load(Ordering::SeqCst) >= (round + 1) * THREADS);
                        barrier.synchronize_threads();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(arrivals.load(Ordering::SeqCst), THREADS * ROUNDS);
    }

    #[test]
    fn exactly_one_last_arriver_per_round() {
        const THREADS: usize = 3;
        const ROUNDS: usize = 20;
        let barrier = Arc::new(TickBarrier::new(THREADS));
        let merges = Arc::new(AtomicUsize::new(0));
        let passed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let merges = Arc::clone(&merges);
                let passed = Arc::clone(&passed);
                thread::spawn(move || {
                    for round in 0..ROUNDS {
                        if barrier.synchronize_and_release_last() {
                            // The others are still parked: nobody has passed
                            // this round yet.
                            assert_eq!(passed.load(Ordering::SeqCst), round * (THREADS - 1));
                            merges.fetch_add(1, Ordering::SeqCst);
                            barrier.release_waiting_threads();
                        } else {
                            passed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(merges.load(Ordering::SeqCst), ROUNDS);
        assert_eq!(passed.load(Ordering::SeqCst), ROUNDS * (THREADS - 1));
    }

    #[test]
    fn dissolve_frees_partial_arrivals() {
        let barrier = Arc::new(TickBarrier::new(3));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.synchronize_and_release_last())
        };
        barrier.dissolve();
        assert!(!waiter.join().unwrap());
        assert!(!barrier.synchronize_and_release_last());

        barrier.reset();
        thread::scope(|s| {
            s.spawn(|| barrier.synchronize_threads());
            s.spawn(|| barrier.synchronize_threads());
            barrier.synchronize_threads();
        });
    }
}
