//! Bakery-style dynamic work distribution.
//!
//! Every worker walks the same ordered sequence of work units. For each
//! unit it calls [`ProcessorElement::handle_next_work_unit`]; the call
//! returns `true` only on the worker that owns that unit. Ownership is
//! decided lazily: a worker that reaches an index it has not claimed yet
//! takes the next globally unclaimed index with a single `fetch_add` on
//! the shared counter, then skips forward until its cursor catches up.
//!
//! Fast workers therefore claim more units than slow ones, and no unit is
//! claimed twice, without any locking. The counter must be reset to zero
//! before each pass while no worker is using it.

use std::sync::atomic::{AtomicUsize, Ordering};

/// One worker's cursor over the shared unit sequence.
#[derive(Debug)]
pub struct ProcessorElement<'a> {
    thread_id: usize,
    position: usize,
    claimed: Option<usize>,
    owned: usize,
    counter: &'a AtomicUsize,
}

impl<'a> ProcessorElement<'a> {
    /// Start a pass for worker `thread_id` against `counter`.
    pub fn new(thread_id: usize, counter: &'a AtomicUsize) -> Self {
        Self {
            thread_id,
            position: 0,
            claimed: None,
            owned: 0,
            counter,
        }
    }

    /// Index of the worker driving this cursor.
    pub fn thread_id(&self) -> usize {
        self.thread_id
    }

    /// Advance past the next unit in the sequence. Returns whether this
    /// worker owns it.
    pub fn handle_next_work_unit(&mut self) -> bool {
        let index = self.position;
        self.position += 1;
        if self.claimed.is_none_or(|claimed| claimed < index) {
            // The barrier orders the reset against every fetch_add.
            self.claimed = Some(self.counter.fetch_add(1, Ordering::Relaxed));
        }
        let mine = self.claimed == Some(index);
        if mine {
            self.owned += 1;
        }
        mine
    }

    /// Number of units this worker has claimed so far in the pass.
    pub fn owned(&self) -> usize {
        self.owned
    }
}
