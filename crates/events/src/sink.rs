//! Sink capability
//!
//! The contract between the router and every concrete sink. `forward`
//! is invoked synchronously on the watch-dispatch path, so
//! implementations must return immediately: build the record, enqueue
//! it into the sink's relay channel, and nothing else. No I/O, no
//! serialization, no blocking waits.

use std::sync::Arc;

use crate::event::ClusterEvent;

/// Capability implemented by every sink the router can target
pub trait EventSink: Send + Sync {
    /// Hand one notification to the sink. `old_event` is `None` for
    /// creations. Must never block the caller; under overflow the sink
    /// drops per its configured policy rather than waiting.
    fn forward(&self, event: Arc<ClusterEvent>, old_event: Option<Arc<ClusterEvent>>);
}
