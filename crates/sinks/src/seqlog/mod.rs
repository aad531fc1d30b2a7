//! Sequenced-Log Sink - batched uploads to a hosted log stream
//!
//! Relays cluster events to an append-only, sequenced log service.
//! `forward` enqueues into the bounded relay channel and returns; the
//! drain task batches whatever is queued, serializes it, and uploads
//! under three constraints:
//!
//! 1. entries within one append call are in timestamp order;
//! 2. no call exceeds the configured byte ceiling (including the
//!    service's per-record bookkeeping overhead);
//! 3. at most one upload per `upload_interval` - records staged inside
//!    the window stay pending for the next cycle.
//!
//! A stale sequencing token is corrected from the error payload and
//! retried exactly once; a duplicate-submission error is treated as
//! success. Anything else leaves the pending buffer intact for the
//! next natural drain cycle.
//!
//! # Example
//!
//! ```ignore
//! let client = Arc::new(HttpAppendClient::new(
//!     "https://logs.example.com",
//!     "cluster-events",
//! )?);
//! let sink = SeqLogSink::new(SeqLogConfig::new("default"), client);
//! let handle = sink.handle(); // give to the router
//! tokio::spawn(sink.run(cancel));
//! ```

mod client;
mod metrics;
mod uploader;

pub use client::{
    AppendClient, AppendEntry, AppendError, AppendResponse, HttpAppendClient, RejectedInfo,
};
pub use metrics::{SeqLogMetrics, SeqLogSnapshot};
pub use uploader::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_UPLOAD_INTERVAL, PER_RECORD_OVERHEAD};

use std::sync::Arc;
use std::time::Duration;

use eventcast_events::{ClusterEvent, EventRecord, EventSink};
use tokio_util::sync::CancellationToken;

use crate::DEFAULT_RELAY_CAPACITY;
use crate::relay::{OverflowPolicy, RelayChannel};
use uploader::Uploader;

/// Configuration for the sequenced-log sink
#[derive(Debug, Clone)]
pub struct SeqLogConfig {
    /// Destination stream name
    pub log_stream: String,

    /// Minimum interval between successful uploads
    pub upload_interval: Duration,

    /// Hard byte ceiling for one append call
    pub max_message_size: usize,

    /// Relay channel capacity
    pub relay_capacity: usize,

    /// Which record to sacrifice when the relay is full
    pub overflow_policy: OverflowPolicy,
}

impl SeqLogConfig {
    /// Create a config for one destination stream with defaults
    pub fn new(log_stream: impl Into<String>) -> Self {
        Self {
            log_stream: log_stream.into(),
            upload_interval: DEFAULT_UPLOAD_INTERVAL,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }

    /// Set the upload interval
    #[must_use]
    pub fn with_upload_interval(mut self, interval: Duration) -> Self {
        self.upload_interval = interval;
        self
    }

    /// Set the per-call byte ceiling
    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the relay channel capacity
    #[must_use]
    pub fn with_relay_capacity(mut self, capacity: usize) -> Self {
        self.relay_capacity = capacity;
        self
    }

    /// Set the overflow policy
    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }
}

/// Producer-side handle implementing the sink capability
///
/// Cheap to clone; stays valid after `run()` consumes the sink.
#[derive(Clone)]
pub struct SeqLogHandle {
    relay: Arc<RelayChannel<EventRecord>>,
    metrics: Arc<SeqLogMetrics>,
    name: String,
}

impl EventSink for SeqLogHandle {
    fn forward(&self, event: Arc<ClusterEvent>, old_event: Option<Arc<ClusterEvent>>) {
        self.metrics.record_received();

        let record = match old_event {
            Some(old) => EventRecord::updated(event, old),
            None => EventRecord::created(event),
        };

        let outcome = self.relay.push(record);
        if outcome.is_drop() {
            tracing::debug!(
                sink = %self.name,
                policy = self.relay.policy().as_str(),
                dropped_total = self.relay.dropped(),
                "relay full, record sacrificed per overflow policy"
            );
        }
    }
}

/// Sequenced-log sink: consumer side, consumed by `run()`
pub struct SeqLogSink {
    relay: Arc<RelayChannel<EventRecord>>,
    uploader: Uploader,
    name: String,
    metrics: Arc<SeqLogMetrics>,
}

impl SeqLogSink {
    /// Create a new sink uploading through `client`
    pub fn new(config: SeqLogConfig, client: Arc<dyn AppendClient>) -> Self {
        Self::with_name(config, client, "seqlog")
    }

    /// Create a new sink with a custom name
    pub fn with_name(
        config: SeqLogConfig,
        client: Arc<dyn AppendClient>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let metrics = Arc::new(SeqLogMetrics::new());
        let relay = Arc::new(RelayChannel::new(
            config.relay_capacity,
            config.overflow_policy,
        ));
        let uploader = Uploader::new(
            config.log_stream,
            client,
            config.upload_interval,
            config.max_message_size,
            Arc::clone(&metrics),
        );

        Self {
            relay,
            uploader,
            name,
            metrics,
        }
    }

    /// Producer handle for the router
    pub fn handle(&self) -> SeqLogHandle {
        SeqLogHandle {
            relay: Arc::clone(&self.relay),
            metrics: Arc::clone(&self.metrics),
            name: self.name.clone(),
        }
    }

    /// Get reference to metrics
    #[inline]
    pub fn metrics(&self) -> &SeqLogMetrics {
        &self.metrics
    }

    /// Get the sink name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the drain loop until cancellation
    ///
    /// Each wakeup drains everything currently queued into one slice
    /// and hands it to the uploader. On cancellation the loop exits
    /// without a final flush; undrained records are lost by design.
    pub async fn run(mut self, cancel: CancellationToken) -> SeqLogSnapshot {
        tracing::info!(
            sink = %self.name,
            capacity = self.relay.capacity(),
            policy = self.relay.policy().as_str(),
            "seqlog sink starting"
        );

        while let Some(first) = self.relay.recv_wait(&cancel).await {
            let mut records = vec![first];
            records.extend(self.relay.drain_pending());
            self.metrics.record_drain();

            if let Err(e) = self.uploader.drain(records).await {
                tracing::warn!(
                    sink = %self.name,
                    error = %e,
                    pending = self.uploader.pending(),
                    "append failed, entries retained for next cycle"
                );
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            sink = %self.name,
            received = snapshot.records_received,
            staged = snapshot.records_staged,
            appends = snapshot.appends,
            entries = snapshot.entries_uploaded,
            bytes = snapshot.bytes_uploaded,
            token_retries = snapshot.token_retries,
            failures = snapshot.upload_failures,
            relay_dropped = self.relay.dropped(),
            undrained = self.relay.len() + self.uploader.pending(),
            "seqlog sink shutting down"
        );

        snapshot
    }
}
