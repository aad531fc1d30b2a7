//! Immutable new/old event snapshot
//!
//! Built once per watch notification on the dispatch path, then handed
//! through the relay channel to the drain loop. Never mutated after
//! construction; serialized at most once by the uploader.

use std::sync::Arc;

use serde::Serialize;

use crate::event::ClusterEvent;

/// Snapshot of one forwarded notification
///
/// `event` is always present; `old_event` is present only when the
/// notification was an update to an already-observed record.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub event: Arc<ClusterEvent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_event: Option<Arc<ClusterEvent>>,
}

impl EventRecord {
    /// Snapshot for a newly created event
    pub fn created(event: Arc<ClusterEvent>) -> Self {
        Self {
            event,
            old_event: None,
        }
    }

    /// Snapshot for an update to an existing event
    pub fn updated(event: Arc<ClusterEvent>, old_event: Arc<ClusterEvent>) -> Self {
        Self {
            event,
            old_event: Some(old_event),
        }
    }

    /// True when this record captures a creation (no previous snapshot)
    #[inline]
    pub fn is_creation(&self) -> bool {
        self.old_event.is_none()
    }

    /// Send-timestamp for the downstream log stream, when the event
    /// carries one.
    #[inline]
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.event.last_seen_millis()
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
