//! Eventcast - Sinks
//!
//! Output sinks for the event relay. Each sink owns a bounded relay
//! channel (producer side exposed as an `EventSink` handle) and a
//! single drain task that batches whatever is currently queued.
//!
//! # Architecture
//!
//! ```text
//! [Router] --forward--> [Relay Channel] --> [Drain Task] --> [Destination]
//!            (never                (bounded,      (one per sink,
//!             blocks)               drop policy)   batches + uploads)
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Purpose |
//! |------|---------|
//! | `stdout` | Human-readable console output |
//! | `seqlog` | Batched, rate-limited uploads to a sequenced log stream |
//!
//! # Example
//!
//! ```ignore
//! use eventcast_sinks::stdout::{StdoutConfig, StdoutSink};
//! use tokio_util::sync::CancellationToken;
//!
//! let sink = StdoutSink::new(StdoutConfig::default());
//! let handle = sink.handle(); // implements EventSink, give to the router
//!
//! let cancel = CancellationToken::new();
//! tokio::spawn(sink.run(cancel));
//! ```

/// Sequenced-log sink - batched uploads with token retry
pub mod seqlog;

/// Stdout sink - human-readable debug output
pub mod stdout;

/// Bounded relay channel with configurable overflow policy
pub mod relay;

/// Common types shared by all sinks
mod common;

pub use common::SinkError;
pub use relay::{OverflowPolicy, PushOutcome, RelayChannel};

/// Default relay channel capacity
pub const DEFAULT_RELAY_CAPACITY: usize = 1500;
