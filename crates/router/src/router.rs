//! Event router - watch callbacks to sink forwarding

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use eventcast_events::{ClusterEvent, EventSink, WatchObject};

/// Counters for one router instance
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Creations forwarded
    added: AtomicU64,

    /// Updates forwarded
    updated: AtomicU64,

    /// Delete notifications observed and deliberately not forwarded
    deletes_ignored: AtomicU64,

    /// Notifications that did not resolve to an event
    malformed: AtomicU64,
}

impl RouterMetrics {
    pub const fn new() -> Self {
        Self {
            added: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            deletes_ignored: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            added: self.added.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            deletes_ignored: self.deletes_ignored.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of router metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterSnapshot {
    pub added: u64,
    pub updated: u64,
    pub deletes_ignored: u64,
    pub malformed: u64,
}

/// Routes watch-source notifications into the active sink
///
/// All three callbacks are non-blocking and panic-free: a payload of
/// unexpected shape is logged and discarded, never forwarded and never
/// fatal.
pub struct EventRouter {
    sink: Arc<dyn EventSink>,
    metrics: Arc<RouterMetrics>,
}

impl EventRouter {
    /// Create a router targeting the given sink
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            metrics: Arc::new(RouterMetrics::new()),
        }
    }

    /// Get reference to metrics
    #[inline]
    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }

    /// A new event appeared (or was seen during the initial list)
    pub fn on_add(&self, obj: WatchObject) {
        let Some(event) = self.resolve(obj, "add") else {
            return;
        };

        tracing::trace!(
            reason = event.reason.as_deref().unwrap_or("-"),
            object = %event.display_name(),
            "event added"
        );
        self.metrics.added.fetch_add(1, Ordering::Relaxed);
        self.sink.forward(event, None);
    }

    /// An existing event changed (count bump, new last-seen time, ...)
    pub fn on_update(&self, old: WatchObject, new: WatchObject) {
        let Some(event) = self.resolve(new, "update") else {
            return;
        };

        // A malformed old snapshot degrades to a creation-shaped record:
        // the new state is the half worth shipping.
        let old_event = match old {
            WatchObject::Event(e) => Some(e),
            WatchObject::Tombstone { last_known: Some(e) } => Some(e),
            other => {
                tracing::warn!(
                    shape = other.shape(),
                    object = %event.display_name(),
                    "update carried an unusable previous snapshot, forwarding as creation"
                );
                None
            }
        };

        tracing::trace!(
            reason = event.reason.as_deref().unwrap_or("-"),
            object = %event.display_name(),
            count = event.count,
            "event updated"
        );
        self.metrics.updated.fetch_add(1, Ordering::Relaxed);
        self.sink.forward(event, old_event);
    }

    /// An event was removed from the watch cache
    ///
    /// Deletion happens only via the cache's TTL expiry; there is
    /// nothing actionable for an audit trail, so nothing is forwarded.
    pub fn on_delete(&self, obj: WatchObject) {
        match obj {
            WatchObject::Event(event) => {
                self.metrics.deletes_ignored.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    reason = event.reason.as_deref().unwrap_or("-"),
                    object = %event.display_name(),
                    "event expired from the watch cache, not forwarding"
                );
            }
            WatchObject::Tombstone {
                last_known: Some(event),
            } => {
                self.metrics.deletes_ignored.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    object = %event.display_name(),
                    "tombstone for expired event, not forwarding"
                );
            }
            other => {
                self.metrics.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    shape = other.shape(),
                    "delete notification was neither event nor recoverable tombstone"
                );
            }
        }
    }

    /// Unwrap a callback payload to its event, counting failures
    fn resolve(&self, obj: WatchObject, callback: &'static str) -> Option<Arc<ClusterEvent>> {
        match obj {
            WatchObject::Event(event) => Some(event),
            WatchObject::Tombstone {
                last_known: Some(event),
            } => {
                tracing::debug!(
                    callback,
                    object = %event.display_name(),
                    "unwrapped tombstone placeholder"
                );
                Some(event)
            }
            other => {
                self.metrics.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    callback,
                    shape = other.shape(),
                    "notification did not resolve to an event, discarding"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;
