//! Bounded relay channel with configurable overflow policy
//!
//! The decoupling primitive between the watch-dispatch path (producer)
//! and a sink's drain task (consumer). `push` never blocks: when the
//! queue is full, the configured element - oldest queued or newly
//! arriving - is sacrificed and the drop is reported to the caller and
//! counted. Retained elements keep their arrival order.
//!
//! This is a deliberate at-most-once trade-off: under sustained
//! overload the channel sheds load instead of stalling the dispatch
//! thread or growing without bound.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Which element to sacrifice when the channel is full
///
/// Fixed at construction time, not a runtime decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the oldest queued element to make room for the new one
    #[default]
    DropOldest,

    /// Discard the newly arriving element, keeping the queue as-is
    DropNewest,
}

impl OverflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DropOldest => "drop_oldest",
            Self::DropNewest => "drop_newest",
        }
    }
}

/// Result of a non-blocking enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Element queued without displacing anything
    Enqueued,

    /// Element queued; the oldest queued element was discarded
    DroppedOldest,

    /// Channel full; the arriving element was discarded
    DroppedNewest,
}

impl PushOutcome {
    /// True when some element was sacrificed
    #[inline]
    pub fn is_drop(&self) -> bool {
        !matches!(self, Self::Enqueued)
    }
}

/// Fixed-capacity queue safe for one concurrent producer and one
/// concurrent consumer
pub struct RelayChannel<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    policy: OverflowPolicy,
    notify: Notify,
    dropped: AtomicU64,
}

impl<T> RelayChannel<T> {
    /// Create a channel holding at most `capacity` elements
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; config validation rejects that
    /// before construction.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        assert!(capacity > 0, "relay capacity must be at least 1");
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue without blocking
    ///
    /// At capacity the policy-selected element is discarded; the
    /// outcome says which. Occupancy never exceeds `capacity`.
    pub fn push(&self, item: T) -> PushOutcome {
        let outcome = {
            let mut queue = self.queue.lock();
            if queue.len() < self.capacity {
                queue.push_back(item);
                PushOutcome::Enqueued
            } else {
                match self.policy {
                    OverflowPolicy::DropOldest => {
                        queue.pop_front();
                        queue.push_back(item);
                        PushOutcome::DroppedOldest
                    }
                    OverflowPolicy::DropNewest => PushOutcome::DroppedNewest,
                }
            }
        };

        if outcome.is_drop() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        if outcome != PushOutcome::DroppedNewest {
            self.notify.notify_one();
        }
        outcome
    }

    /// Consumer side: wait until one element is available or the token
    /// is cancelled. Returns `None` only on cancellation.
    pub async fn recv_wait(&self, cancel: &CancellationToken) -> Option<T> {
        loop {
            if let Some(item) = self.queue.lock().pop_front() {
                return Some(item);
            }

            // Register for notification, then re-check: a push between
            // the pop above and here leaves a stored permit, so the
            // select below cannot miss it.
            let notified = self.notify.notified();

            if let Some(item) = self.queue.lock().pop_front() {
                return Some(item);
            }

            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Pop everything currently queued, preserving arrival order
    ///
    /// A snapshot of "pending right now", not a continuously draining
    /// loop: elements pushed after the lock is taken wait for the next
    /// cycle.
    pub fn drain_pending(&self) -> Vec<T> {
        let mut queue = self.queue.lock();
        queue.drain(..).collect()
    }

    /// Current occupancy
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Configured capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured overflow policy
    #[inline]
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Total elements sacrificed since construction
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T> std::fmt::Debug for RelayChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayChannel")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod relay_test;
