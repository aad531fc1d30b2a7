//! Sequenced-log sink metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one seqlog sink instance
#[derive(Debug, Default)]
pub struct SeqLogMetrics {
    /// Records handed to `forward`
    records_received: AtomicU64,

    /// Records staged into the pending buffer
    records_staged: AtomicU64,

    /// Records dropped because they could not be encoded
    serialize_failures: AtomicU64,

    /// Drain-loop wakeups
    drain_cycles: AtomicU64,

    /// Successful append calls
    appends: AtomicU64,

    /// Entries confirmed by the service
    entries_uploaded: AtomicU64,

    /// Bytes (payload + overhead) confirmed by the service
    bytes_uploaded: AtomicU64,

    /// Appends the service reported as already accepted
    duplicate_appends: AtomicU64,

    /// Stale-token retries issued
    token_retries: AtomicU64,

    /// Drain cycles deferred by the upload gate
    deferred_cycles: AtomicU64,

    /// Append calls that failed after retry handling
    upload_failures: AtomicU64,

    /// Successful appends that carried partial-rejection info
    rejected_batches: AtomicU64,
}

impl SeqLogMetrics {
    pub const fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_staged: AtomicU64::new(0),
            serialize_failures: AtomicU64::new(0),
            drain_cycles: AtomicU64::new(0),
            appends: AtomicU64::new(0),
            entries_uploaded: AtomicU64::new(0),
            bytes_uploaded: AtomicU64::new(0),
            duplicate_appends: AtomicU64::new(0),
            token_retries: AtomicU64::new(0),
            deferred_cycles: AtomicU64::new(0),
            upload_failures: AtomicU64::new(0),
            rejected_batches: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_staged(&self) {
        self.records_staged.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_serialize_failure(&self) {
        self.serialize_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_drain(&self) {
        self.drain_cycles.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_append(&self, entries: u64, bytes: u64) {
        self.appends.fetch_add(1, Ordering::Relaxed);
        self.entries_uploaded.fetch_add(entries, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_duplicate(&self) {
        self.duplicate_appends.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_token_retry(&self) {
        self.token_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_deferred(&self) {
        self.deferred_cycles.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_upload_failure(&self) {
        self.upload_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.rejected_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> SeqLogSnapshot {
        SeqLogSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_staged: self.records_staged.load(Ordering::Relaxed),
            serialize_failures: self.serialize_failures.load(Ordering::Relaxed),
            drain_cycles: self.drain_cycles.load(Ordering::Relaxed),
            appends: self.appends.load(Ordering::Relaxed),
            entries_uploaded: self.entries_uploaded.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            duplicate_appends: self.duplicate_appends.load(Ordering::Relaxed),
            token_retries: self.token_retries.load(Ordering::Relaxed),
            deferred_cycles: self.deferred_cycles.load(Ordering::Relaxed),
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
            rejected_batches: self.rejected_batches.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of seqlog sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeqLogSnapshot {
    pub records_received: u64,
    pub records_staged: u64,
    pub serialize_failures: u64,
    pub drain_cycles: u64,
    pub appends: u64,
    pub entries_uploaded: u64,
    pub bytes_uploaded: u64,
    pub duplicate_appends: u64,
    pub token_retries: u64,
    pub deferred_cycles: u64,
    pub upload_failures: u64,
    pub rejected_batches: u64,
}
