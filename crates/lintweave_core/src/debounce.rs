//! Quiet-window debouncing of change notifications.
//!
//! [`Debouncer`] is a plain state machine: callers feed it events with the
//! current `Instant` and ask it for the settled batch once the deadline has
//! passed. Timers live with the caller, which keeps the logic testable without
//! a runtime.

use std::collections::HashSet;
use std::hash::Hash;
use std::mem;
use std::time::{Duration, Instant};

use tracing::trace;

/// Default quiet window for raw filesystem events.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Default quiet window for host "touched" notifications.
pub const DEFAULT_TOUCH_DEBOUNCE_MS: u64 = 1000;

/// Items collected since the last flush. Deduplicated, insertion-ordered.
#[derive(Debug)]
pub struct PendingBatch<T> {
    items: Vec<T>,
    seen: HashSet<T>,
}

impl<T> Default for PendingBatch<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> PendingBatch<T> {
    /// Adds `item` unless already present. Returns true when added.
    pub fn push(&mut self, item: T) -> bool {
        if self.seen.insert(item.clone()) {
            self.items.push(item);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Moves the items out, leaving the batch empty.
    pub fn drain(&mut self) -> Vec<T> {
        self.seen.clear();
        mem::take(&mut self.items)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Collecting { deadline: Instant },
}

/// Collapses bursts of events into one settled batch.
///
/// `Idle` → event → `Collecting` (deadline = now + quiet). Every further event
/// pushes the deadline out again. Once the deadline passes, [`Debouncer::poll`]
/// hands out the batch and the debouncer returns to `Idle`.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    state: State,
    pending: PendingBatch<T>,
}

impl<T: Eq + Hash + Clone> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            state: State::Idle,
            pending: PendingBatch::default(),
        }
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    /// Records an event at `now` and restarts the quiet window.
    pub fn push(&mut self, item: T, now: Instant) {
        self.pending.push(item);
        self.state = State::Collecting {
            deadline: now + self.quiet,
        };
        trace!(pending = self.pending.len(), "Debouncer collecting");
    }

    /// When the current batch settles, if one is being collected.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            State::Idle => None,
            State::Collecting { deadline } => Some(deadline),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Returns the settled batch if the deadline has passed at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<T>> {
        match self.state {
            State::Collecting { deadline } if now >= deadline => Some(self.take()),
            _ => None,
        }
    }

    /// Flushes whatever is pending and returns to `Idle`.
    pub fn take(&mut self) -> Vec<T> {
        self.state = State::Idle;
        self.pending.drain()
    }
}
