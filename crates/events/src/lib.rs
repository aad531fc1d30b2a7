//! Eventcast - Events
//!
//! Shared base types for the event relay pipeline: the normalized
//! cluster event model, the immutable new/old record snapshot built at
//! enqueue time, the watch-notification boundary payload, and the
//! `EventSink` capability implemented by every concrete sink.
//!
//! ```text
//! [Watch Source] --WatchObject--> [Router] --EventSink::forward--> [Sink]
//! ```

mod event;
mod record;
mod sink;
mod watch;

pub use event::{ClusterEvent, EventKind, EventSource, ObjectRef};
pub use record::EventRecord;
pub use sink::EventSink;
pub use watch::WatchObject;
