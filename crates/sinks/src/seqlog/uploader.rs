//! Batch staging and upload with token retry
//!
//! The uploader owns one `LogStream`'s state: the pending serialized
//! entries, their accumulated byte cost, and the continuation token the
//! service expects next. `drain` stages a slice of records, then either
//! uploads (chronologically sorted, chunked under the byte ceiling) or
//! defers until the upload interval has passed.
//!
//! Token lifecycle for one stream: unknown until the first append or
//! the first error that carries a token; replaced in place on a stale-
//! token error, which is retried exactly once; left untouched by
//! unrelated failures, whose entries stay pending for the next cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eventcast_events::EventRecord;
use tokio::time::Instant;

use super::client::{AppendClient, AppendEntry, AppendError, AppendResponse};
use super::metrics::SeqLogMetrics;

/// Bookkeeping cost the service charges per entry on top of the payload
pub const PER_RECORD_OVERHEAD: usize = 26;

/// Hard ceiling on one append call's total cost
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_046_528;

/// Default minimum interval between uploads to one stream
pub const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_secs(120);

/// A stream with no successful append for this long is considered idle
const STREAM_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(3600);

/// One staged entry awaiting upload
#[derive(Debug, Clone)]
struct PendingEntry {
    payload: String,
    timestamp_millis: i64,
    /// payload bytes + per-record overhead
    cost: usize,
}

/// Per-destination append state, owned exclusively by one uploader
#[derive(Debug)]
pub(crate) struct LogStream {
    name: String,
    entries: Vec<PendingEntry>,
    byte_len: usize,
    next_token: Option<String>,
    expires_at: Option<Instant>,
}

impl LogStream {
    fn new(name: String) -> Self {
        Self {
            name,
            entries: Vec::new(),
            byte_len: 0,
            next_token: None,
            expires_at: None,
        }
    }

    fn stage(&mut self, payload: String, timestamp_millis: i64, cost: usize) {
        self.entries.push(PendingEntry {
            payload,
            timestamp_millis,
            cost,
        });
        self.byte_len += cost;
    }

    /// Stable sort: ties in timestamp keep arrival order
    fn sort_chronological(&mut self) {
        self.entries.sort_by_key(|e| e.timestamp_millis);
    }

    /// Number of leading entries that fit under `budget` (at least one,
    /// so a single oversized entry still goes out alone)
    fn chunk_len(&self, budget: usize) -> usize {
        let mut total = 0;
        let mut count = 0;
        for entry in &self.entries {
            if count > 0 && total + entry.cost > budget {
                break;
            }
            total += entry.cost;
            count += 1;
        }
        count
    }

    /// Drop the first `count` entries after a successful append
    fn consume(&mut self, count: usize) {
        let removed: usize = self.entries.drain(..count).map(|e| e.cost).sum();
        self.byte_len -= removed;
    }

    fn touch(&mut self) {
        self.expires_at = Some(Instant::now() + STREAM_INACTIVITY_TIMEOUT);
    }

    fn is_idle(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Turns drained record slices into sequenced append calls
pub(crate) struct Uploader {
    client: Arc<dyn AppendClient>,
    stream: LogStream,
    upload_interval: Duration,
    max_message_size: usize,
    last_upload: Option<Instant>,
    metrics: Arc<SeqLogMetrics>,
}

impl Uploader {
    pub(crate) fn new(
        stream_name: impl Into<String>,
        client: Arc<dyn AppendClient>,
        upload_interval: Duration,
        max_message_size: usize,
        metrics: Arc<SeqLogMetrics>,
    ) -> Self {
        Self {
            client,
            stream: LogStream::new(stream_name.into()),
            upload_interval,
            max_message_size,
            last_upload: None,
            metrics,
        }
    }

    /// Records pending upload (staged but not yet appended)
    pub(crate) fn pending(&self) -> usize {
        self.stream.entries.len()
    }

    /// Current continuation token, if the service has issued one
    pub(crate) fn token(&self) -> Option<&str> {
        self.stream.next_token.as_deref()
    }

    /// Stage one drain cycle's records and upload if the gate allows
    ///
    /// On upload failure the staged entries stay pending; the error is
    /// returned for logging and the next cycle retries naturally.
    pub(crate) async fn drain(&mut self, records: Vec<EventRecord>) -> Result<(), AppendError> {
        let mut deferred_err: Option<AppendError> = None;

        for record in records {
            let payload = match serde_json::to_string(&record) {
                Ok(p) => p,
                Err(e) => {
                    self.metrics.record_serialize_failure();
                    tracing::warn!(
                        stream = %self.stream.name,
                        error = %e,
                        "failed to encode record, dropping it from the batch"
                    );
                    continue;
                }
            };
            let cost = payload.len() + PER_RECORD_OVERHEAD;

            // The hard size ceiling outranks the rate gate: flush what
            // is staged before this entry would push the call over.
            if deferred_err.is_none()
                && !self.stream.entries.is_empty()
                && self.stream.byte_len + cost > self.max_message_size
            {
                if let Err(e) = self.flush().await {
                    deferred_err = Some(e);
                }
            }

            let timestamp = record
                .timestamp_millis()
                .unwrap_or_else(|| Utc::now().timestamp_millis());
            self.stream.stage(payload, timestamp, cost);
            self.metrics.record_staged();
        }

        if let Some(e) = deferred_err {
            return Err(e);
        }
        if self.stream.entries.is_empty() {
            return Ok(());
        }

        if !self.gate_open() {
            self.metrics.record_deferred();
            tracing::trace!(
                stream = %self.stream.name,
                pending = self.stream.entries.len(),
                "upload gate closed, deferring to next cycle"
            );
            return Ok(());
        }

        self.flush().await
    }

    /// True when enough time has passed since the last successful append
    fn gate_open(&self) -> bool {
        match self.last_upload {
            None => true,
            Some(at) => at.elapsed() >= self.upload_interval,
        }
    }

    /// Upload everything pending, in timestamp order, split into calls
    /// that each respect the byte ceiling
    async fn flush(&mut self) -> Result<(), AppendError> {
        self.stream.sort_chronological();

        if self.stream.is_idle() {
            tracing::debug!(
                stream = %self.stream.name,
                "resuming appends to a stream idle past its inactivity window"
            );
        }

        while !self.stream.entries.is_empty() {
            let count = self.stream.chunk_len(self.max_message_size);
            let entries: Vec<AppendEntry> = self.stream.entries[..count]
                .iter()
                .map(|e| AppendEntry {
                    payload: e.payload.clone(),
                    timestamp_millis: e.timestamp_millis,
                })
                .collect();
            let bytes: usize = self.stream.entries[..count].iter().map(|e| e.cost).sum();

            match self.append_with_retry(&entries).await {
                Ok(()) => {
                    self.stream.consume(count);
                    self.stream.touch();
                    self.last_upload = Some(Instant::now());
                    self.metrics.record_append(count as u64, bytes as u64);
                }
                Err(e) => {
                    self.metrics.record_upload_failure();
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// One append call, retried at most once on a stale token
    async fn append_with_retry(&mut self, entries: &[AppendEntry]) -> Result<(), AppendError> {
        let client = Arc::clone(&self.client);
        let mut retried = false;

        loop {
            let token = self.stream.next_token.clone();
            let result = client
                .append_batch(&self.stream.name, entries, token.as_deref())
                .await;

            match result {
                Ok(response) => {
                    self.log_rejected(&response);
                    if response.next_token.is_some() {
                        self.stream.next_token = response.next_token;
                    }
                    return Ok(());
                }
                Err(AppendError::AlreadyAccepted { token }) => {
                    // The service has this batch; adopt its token and
                    // move on without re-sending.
                    tracing::info!(
                        stream = %self.stream.name,
                        "batch already accepted by the service, ignoring error"
                    );
                    self.metrics.record_duplicate();
                    if token.is_some() {
                        self.stream.next_token = token;
                    }
                    return Ok(());
                }
                Err(AppendError::InvalidToken { expected }) => {
                    self.stream.next_token = expected.clone();
                    if retried {
                        return Err(AppendError::InvalidToken { expected });
                    }
                    retried = true;
                    self.metrics.record_token_retry();
                    tracing::warn!(
                        stream = %self.stream.name,
                        "sequencing token was stale, retrying once with the corrected token"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn log_rejected(&self, response: &AppendResponse) {
        let Some(rejected) = &response.rejected else {
            return;
        };
        if rejected.is_empty() {
            return;
        }

        self.metrics.record_rejected();
        if let Some(end) = rejected.too_old_end_index {
            tracing::warn!(
                stream = %self.stream.name,
                end_index = end,
                "service marked entries as too old"
            );
        }
        if let Some(start) = rejected.too_new_start_index {
            tracing::warn!(
                stream = %self.stream.name,
                start_index = start,
                "service marked entries as too new"
            );
        }
        if let Some(end) = rejected.expired_end_index {
            tracing::warn!(
                stream = %self.stream.name,
                end_index = end,
                "service marked entries as expired"
            );
        }
    }
}

#[cfg(test)]
#[path = "uploader_test.rs"]
mod uploader_test;
