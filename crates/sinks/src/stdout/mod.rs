//! Stdout Sink - Human-readable debug output
//!
//! Prints relayed cluster events to stdout, one line per record. Not
//! intended for production use at high event rates.
//!
//! # Example Output
//!
//! ```text
//! 07:34:59.161 Warning BackOff   default/pod-x (x7) Back-off restarting failed container
//! 07:35:00.100 Normal  Scheduled default/pod-y Successfully assigned default/pod-y to node-1
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{TimeZone, Utc};
use eventcast_events::{ClusterEvent, EventKind, EventRecord, EventSink};
use owo_colors::{OwoColorize, Style};
use tokio_util::sync::CancellationToken;

use crate::DEFAULT_RELAY_CAPACITY;
use crate::relay::{OverflowPolicy, RelayChannel};

/// Configuration for stdout sink
#[derive(Debug, Clone)]
pub struct StdoutConfig {
    /// Enable colored output
    pub color: bool,

    /// Relay channel capacity
    pub relay_capacity: usize,

    /// Which record to sacrifice when the relay is full
    pub overflow_policy: OverflowPolicy,
}

impl Default for StdoutConfig {
    fn default() -> Self {
        Self {
            color: true,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

impl StdoutConfig {
    /// Create config with colors disabled (for piped output)
    pub fn no_color() -> Self {
        Self {
            color: false,
            ..Self::default()
        }
    }
}

// =============================================================================
// Color Styles
// =============================================================================

/// Color styles for terminal output
struct Styles {
    timestamp: Style,
    label: Style,
    message: Style,
}

impl Styles {
    fn new(enabled: bool) -> Self {
        if enabled {
            Self {
                timestamp: Style::new().dimmed(),
                label: Style::new().dimmed(),
                message: Style::new().dimmed(),
            }
        } else {
            Self {
                timestamp: Style::new(),
                label: Style::new(),
                message: Style::new(),
            }
        }
    }
}

/// Get style for event kind
fn kind_style(kind: EventKind, enabled: bool) -> Style {
    if !enabled {
        return Style::new();
    }
    match kind {
        EventKind::Warning => Style::new().red(),
        EventKind::Normal => Style::new().green(),
        EventKind::Other => Style::new().yellow(),
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Metrics for stdout sink
#[derive(Debug, Default)]
pub struct StdoutSinkMetrics {
    records_received: AtomicU64,
    records_printed: AtomicU64,
    drain_cycles: AtomicU64,
}

impl StdoutSinkMetrics {
    #[inline]
    pub const fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_printed: AtomicU64::new(0),
            drain_cycles: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_drain(&self, printed: u64) {
        self.drain_cycles.fetch_add(1, Ordering::Relaxed);
        self.records_printed.fetch_add(printed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_printed: self.records_printed.load(Ordering::Relaxed),
            drain_cycles: self.drain_cycles.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of stdout sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub records_printed: u64,
    pub drain_cycles: u64,
}

// =============================================================================
// StdoutSink Implementation
// =============================================================================

/// Producer-side handle implementing the sink capability
#[derive(Clone)]
pub struct StdoutHandle {
    relay: Arc<RelayChannel<EventRecord>>,
    metrics: Arc<StdoutSinkMetrics>,
    name: String,
}

impl EventSink for StdoutHandle {
    fn forward(&self, event: Arc<ClusterEvent>, old_event: Option<Arc<ClusterEvent>>) {
        self.metrics.record_received();

        let record = match old_event {
            Some(old) => EventRecord::updated(event, old),
            None => EventRecord::created(event),
        };

        if self.relay.push(record).is_drop() {
            tracing::debug!(
                sink = %self.name,
                dropped_total = self.relay.dropped(),
                "relay full, record sacrificed per overflow policy"
            );
        }
    }
}

/// Stdout sink for debug output
pub struct StdoutSink {
    relay: Arc<RelayChannel<EventRecord>>,
    config: StdoutConfig,
    name: String,
    metrics: Arc<StdoutSinkMetrics>,
}

impl StdoutSink {
    /// Create a new stdout sink with the given config
    pub fn new(config: StdoutConfig) -> Self {
        Self::with_name(config, "stdout")
    }

    /// Create a new stdout sink with a custom name
    pub fn with_name(config: StdoutConfig, name: impl Into<String>) -> Self {
        let relay = Arc::new(RelayChannel::new(
            config.relay_capacity,
            config.overflow_policy,
        ));
        Self {
            relay,
            config,
            name: name.into(),
            metrics: Arc::new(StdoutSinkMetrics::new()),
        }
    }

    /// Producer handle for the router
    pub fn handle(&self) -> StdoutHandle {
        StdoutHandle {
            relay: Arc::clone(&self.relay),
            metrics: Arc::clone(&self.metrics),
            name: self.name.clone(),
        }
    }

    /// Get reference to metrics
    #[inline]
    pub fn metrics(&self) -> &StdoutSinkMetrics {
        &self.metrics
    }

    /// Get the sink name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the drain loop until cancellation
    pub async fn run(self, cancel: CancellationToken) -> MetricsSnapshot {
        tracing::info!(sink = %self.name, "stdout sink starting");

        while let Some(first) = self.relay.recv_wait(&cancel).await {
            let mut records = vec![first];
            records.extend(self.relay.drain_pending());

            let styles = Styles::new(self.config.color);
            for record in &records {
                self.print_record(record, &styles);
            }
            self.metrics.record_drain(records.len() as u64);
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            sink = %self.name,
            received = snapshot.records_received,
            printed = snapshot.records_printed,
            relay_dropped = self.relay.dropped(),
            "stdout sink shutting down"
        );

        snapshot
    }

    /// Print one record as a single line
    fn print_record(&self, record: &EventRecord, styles: &Styles) {
        let event = &record.event;

        let ts = format_timestamp(record.timestamp_millis());
        let kind = format!("{:7}", event.kind.as_str());
        let reason = event.reason.as_deref().unwrap_or("-");
        let target = event.display_name();
        let message = event.message.as_deref().unwrap_or("");

        let count = if event.count > 1 {
            format!(" (x{})", event.count)
        } else {
            String::new()
        };

        println!(
            "{} {} {} {}{} {}",
            ts.style(styles.timestamp),
            kind.style(kind_style(event.kind, self.config.color)),
            reason,
            target.style(styles.label),
            count.style(styles.label),
            message.style(styles.message),
        );
    }
}

// =============================================================================
// Formatting Helpers
// =============================================================================

/// Format timestamp as HH:MM:SS.mmm (from milliseconds)
fn format_timestamp(ts_millis: Option<i64>) -> String {
    let Some(millis) = ts_millis else {
        return "--:--:--.---".to_string();
    };
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| format!("{}", millis))
}
