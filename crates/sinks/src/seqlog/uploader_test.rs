use super::*;
use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::TimeZone;
use eventcast_events::ClusterEvent;
use parking_lot::Mutex;

use crate::seqlog::RejectedInfo;

// =============================================================================
// Scripted mock client
// =============================================================================

#[derive(Debug)]
struct RecordedCall {
    stream: String,
    token: Option<String>,
    entries: Vec<AppendEntry>,
}

/// Mock that replays a script of responses and records every call.
/// Once the script is exhausted it answers with a plain success.
struct MockClient {
    calls: Mutex<Vec<RecordedCall>>,
    script: Mutex<VecDeque<Result<AppendResponse, AppendError>>>,
}

impl MockClient {
    fn new() -> Arc<Self> {
        Self::scripted(vec![])
    }

    fn scripted(script: Vec<Result<AppendResponse, AppendError>>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
        })
    }

    fn calls(&self) -> Vec<RecordedCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl AppendClient for MockClient {
    async fn append_batch(
        &self,
        log_stream: &str,
        entries: &[AppendEntry],
        token: Option<&str>,
    ) -> Result<AppendResponse, AppendError> {
        self.calls.lock().push(RecordedCall {
            stream: log_stream.to_string(),
            token: token.map(String::from),
            entries: entries.to_vec(),
        });
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(AppendResponse::default()))
    }
}

fn response_with_token(token: &str) -> Result<AppendResponse, AppendError> {
    Ok(AppendResponse {
        next_token: Some(token.to_string()),
        rejected: None,
    })
}

fn service_error() -> Result<AppendResponse, AppendError> {
    Err(AppendError::Service {
        status: 500,
        message: "internal".into(),
    })
}

// =============================================================================
// Test fixtures
// =============================================================================

fn record(reason: &str, ts_secs: i64) -> EventRecord {
    EventRecord::created(Arc::new(ClusterEvent {
        reason: Some(reason.into()),
        last_timestamp: chrono::Utc.timestamp_opt(ts_secs, 0).single(),
        ..Default::default()
    }))
}

fn uploader(client: Arc<MockClient>) -> Uploader {
    Uploader::new(
        "test-stream",
        client,
        Duration::from_secs(120),
        DEFAULT_MAX_MESSAGE_SIZE,
        Arc::new(SeqLogMetrics::new()),
    )
}

fn uploader_with(
    client: Arc<MockClient>,
    interval: Duration,
    max_size: usize,
    metrics: Arc<SeqLogMetrics>,
) -> Uploader {
    Uploader::new("test-stream", client, interval, max_size, metrics)
}

// =============================================================================
// Staging and batching
// =============================================================================

#[tokio::test]
async fn test_single_drain_single_append() {
    let client = MockClient::new();
    let mut up = uploader(Arc::clone(&client));

    up.drain(vec![record("a", 10), record("b", 20), record("c", 30)])
        .await
        .unwrap();

    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].stream, "test-stream");
    assert_eq!(calls[0].entries.len(), 3);
    assert!(calls[0].token.is_none());
    assert_eq!(up.pending(), 0);
}

#[tokio::test]
async fn test_entries_sorted_chronologically() {
    let client = MockClient::new();
    let mut up = uploader(Arc::clone(&client));

    up.drain(vec![record("late", 300), record("early", 100), record("mid", 200)])
        .await
        .unwrap();

    let calls = client.calls();
    let timestamps: Vec<i64> = calls[0].entries.iter().map(|e| e.timestamp_millis).collect();
    assert_eq!(timestamps, vec![100_000, 200_000, 300_000]);
    assert!(calls[0].entries[0].payload.contains("early"));
    assert!(calls[0].entries[2].payload.contains("late"));
}

#[tokio::test]
async fn test_timestamp_ties_keep_arrival_order() {
    let client = MockClient::new();
    let mut up = uploader(Arc::clone(&client));

    up.drain(vec![record("first", 100), record("second", 100), record("third", 100)])
        .await
        .unwrap();

    let calls = client.calls();
    assert!(calls[0].entries[0].payload.contains("first"));
    assert!(calls[0].entries[1].payload.contains("second"));
    assert!(calls[0].entries[2].payload.contains("third"));
}

#[tokio::test]
async fn test_records_without_timestamps_are_stamped() {
    let client = MockClient::new();
    let mut up = uploader(Arc::clone(&client));

    let bare = EventRecord::created(Arc::new(ClusterEvent::default()));
    let before = chrono::Utc::now().timestamp_millis();
    up.drain(vec![bare]).await.unwrap();
    let after = chrono::Utc::now().timestamp_millis();

    let calls = client.calls();
    let ts = calls[0].entries[0].timestamp_millis;
    assert!(ts >= before && ts <= after);
}

#[tokio::test]
async fn test_byte_budget_splits_into_multiple_calls() {
    let client = MockClient::new();
    let metrics = Arc::new(SeqLogMetrics::new());
    // Each encoded record is well over 100 bytes, so a 400-byte budget
    // forces more than one call for four records.
    let mut up = uploader_with(Arc::clone(&client), Duration::from_secs(120), 400, metrics);

    up.drain(vec![
        record("aaaa", 10),
        record("bbbb", 20),
        record("cccc", 30),
        record("dddd", 40),
    ])
    .await
    .unwrap();

    let calls = client.calls();
    assert!(calls.len() > 1, "expected budget to split the batch");
    for call in &calls {
        let cost: usize = call
            .entries
            .iter()
            .map(|e| e.payload.len() + PER_RECORD_OVERHEAD)
            .sum();
        assert!(cost <= 400, "one call exceeded the budget: {cost}");
    }
    let total: usize = calls.iter().map(|c| c.entries.len()).sum();
    assert_eq!(total, 4);
    assert_eq!(up.pending(), 0);
}

#[tokio::test]
async fn test_oversized_single_entry_still_uploads_alone() {
    let client = MockClient::new();
    let metrics = Arc::new(SeqLogMetrics::new());
    // Budget smaller than any one encoded record
    let mut up = uploader_with(Arc::clone(&client), Duration::from_secs(120), 10, metrics);

    up.drain(vec![record("big", 10)]).await.unwrap();

    assert_eq!(client.call_count(), 1);
    assert_eq!(up.pending(), 0);
}

// =============================================================================
// Rate gate
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_gate_defers_second_cycle() {
    let client = MockClient::new();
    let metrics = Arc::new(SeqLogMetrics::new());
    let mut up = uploader_with(
        Arc::clone(&client),
        Duration::from_secs(120),
        DEFAULT_MAX_MESSAGE_SIZE,
        Arc::clone(&metrics),
    );

    // First cycle uploads (no previous upload recorded)
    up.drain(vec![record("a", 10)]).await.unwrap();
    assert_eq!(client.call_count(), 1);

    // Second cycle inside the window: staged but deferred
    tokio::time::advance(Duration::from_secs(30)).await;
    up.drain(vec![record("b", 20)]).await.unwrap();
    assert_eq!(client.call_count(), 1);
    assert_eq!(up.pending(), 1);
    assert_eq!(metrics.snapshot().deferred_cycles, 1);

    // Past the window: deferred record goes out with the new one
    tokio::time::advance(Duration::from_secs(120)).await;
    up.drain(vec![record("c", 30)]).await.unwrap();
    assert_eq!(client.call_count(), 2);

    let calls = client.calls();
    assert_eq!(calls[1].entries.len(), 2);
    assert_eq!(up.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_gate_applies_per_successful_upload() {
    let client = MockClient::new();
    let metrics = Arc::new(SeqLogMetrics::new());
    let mut up = uploader_with(
        Arc::clone(&client),
        Duration::from_secs(60),
        DEFAULT_MAX_MESSAGE_SIZE,
        metrics,
    );

    up.drain(vec![record("a", 10)]).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    up.drain(vec![record("b", 20)]).await.unwrap();

    assert_eq!(client.call_count(), 2);
}

// =============================================================================
// Token state machine
// =============================================================================

#[tokio::test]
async fn test_token_adopted_from_success() {
    let client = MockClient::scripted(vec![response_with_token("T1")]);
    let mut up = uploader(Arc::clone(&client));

    up.drain(vec![record("a", 10)]).await.unwrap();
    assert_eq!(up.token(), Some("T1"));
}

#[tokio::test(start_paused = true)]
async fn test_token_quoted_on_next_append() {
    let client = MockClient::scripted(vec![response_with_token("T1")]);
    let mut up = uploader(Arc::clone(&client));

    up.drain(vec![record("a", 10)]).await.unwrap();
    tokio::time::advance(Duration::from_secs(121)).await;
    up.drain(vec![record("b", 20)]).await.unwrap();

    let calls = client.calls();
    assert_eq!(calls[0].token, None);
    assert_eq!(calls[1].token.as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_already_accepted_is_success_without_retry() {
    let client = MockClient::scripted(vec![Err(AppendError::AlreadyAccepted {
        token: Some("T2".into()),
    })]);
    let metrics = Arc::new(SeqLogMetrics::new());
    let mut up = uploader_with(
        Arc::clone(&client),
        Duration::from_secs(120),
        DEFAULT_MAX_MESSAGE_SIZE,
        Arc::clone(&metrics),
    );

    up.drain(vec![record("a", 10)]).await.unwrap();

    assert_eq!(client.call_count(), 1, "no retry on duplicate submission");
    assert_eq!(up.pending(), 0, "buffer cleared");
    assert_eq!(up.token(), Some("T2"));
    assert_eq!(metrics.snapshot().duplicate_appends, 1);
}

#[tokio::test]
async fn test_invalid_token_retried_once_with_correction() {
    let client = MockClient::scripted(vec![
        Err(AppendError::InvalidToken {
            expected: Some("T3".into()),
        }),
        response_with_token("T4"),
    ]);
    let metrics = Arc::new(SeqLogMetrics::new());
    let mut up = uploader_with(
        Arc::clone(&client),
        Duration::from_secs(120),
        DEFAULT_MAX_MESSAGE_SIZE,
        Arc::clone(&metrics),
    );

    up.drain(vec![record("a", 10)]).await.unwrap();

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].token.as_deref(), Some("T3"));
    assert_eq!(up.pending(), 0, "buffer cleared exactly once");
    assert_eq!(up.token(), Some("T4"));
    assert_eq!(metrics.snapshot().token_retries, 1);
}

#[tokio::test]
async fn test_invalid_token_retry_failing_with_unrelated_error_retains_buffer() {
    let client = MockClient::scripted(vec![
        Err(AppendError::InvalidToken {
            expected: Some("T3".into()),
        }),
        service_error(),
    ]);
    let mut up = uploader(Arc::clone(&client));

    let result = up.drain(vec![record("a", 10)]).await;

    assert!(result.is_err());
    assert_eq!(client.call_count(), 2);
    assert_eq!(up.pending(), 1, "buffer retained for next cycle");
    assert_eq!(up.token(), Some("T3"), "corrected token kept for retry");
}

#[tokio::test]
async fn test_repeated_invalid_token_does_not_loop() {
    let client = MockClient::scripted(vec![
        Err(AppendError::InvalidToken {
            expected: Some("T3".into()),
        }),
        Err(AppendError::InvalidToken {
            expected: Some("T5".into()),
        }),
    ]);
    let mut up = uploader(Arc::clone(&client));

    let result = up.drain(vec![record("a", 10)]).await;

    assert!(matches!(result, Err(AppendError::InvalidToken { .. })));
    assert_eq!(client.call_count(), 2, "exactly one retry, no unbounded loop");
    assert_eq!(up.pending(), 1);
    assert_eq!(up.token(), Some("T5"));
}

// =============================================================================
// Failure retention and recovery
// =============================================================================

#[tokio::test]
async fn test_other_error_retains_buffer_and_next_cycle_retries() {
    let client = MockClient::scripted(vec![service_error()]);
    let mut up = uploader(Arc::clone(&client));

    let result = up.drain(vec![record("a", 10), record("b", 20)]).await;
    assert!(result.is_err());
    assert_eq!(up.pending(), 2);

    // Next natural cycle (no new records) retries and succeeds
    up.drain(Vec::new()).await.unwrap();
    assert_eq!(up.pending(), 0);

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].entries.len(), 2);
}

#[tokio::test]
async fn test_empty_drain_with_empty_buffer_makes_no_call() {
    let client = MockClient::new();
    let mut up = uploader(Arc::clone(&client));

    up.drain(Vec::new()).await.unwrap();
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_rejected_ranges_do_not_fail_the_append() {
    let client = MockClient::scripted(vec![Ok(AppendResponse {
        next_token: Some("T1".into()),
        rejected: Some(RejectedInfo {
            too_old_end_index: Some(1),
            ..Default::default()
        }),
    })]);
    let metrics = Arc::new(SeqLogMetrics::new());
    let mut up = uploader_with(
        Arc::clone(&client),
        Duration::from_secs(120),
        DEFAULT_MAX_MESSAGE_SIZE,
        Arc::clone(&metrics),
    );

    up.drain(vec![record("a", 10), record("b", 20)]).await.unwrap();

    assert_eq!(up.pending(), 0);
    assert_eq!(up.token(), Some("T1"));
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.appends, 1);
    assert_eq!(snapshot.rejected_batches, 1);
    assert_eq!(snapshot.upload_failures, 0);
}

#[tokio::test]
async fn test_metrics_account_for_staged_and_uploaded() {
    let client = MockClient::new();
    let metrics = Arc::new(SeqLogMetrics::new());
    let mut up = uploader_with(
        Arc::clone(&client),
        Duration::from_secs(120),
        DEFAULT_MAX_MESSAGE_SIZE,
        Arc::clone(&metrics),
    );

    up.drain(vec![record("a", 10), record("b", 20)]).await.unwrap();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.records_staged, 2);
    assert_eq!(snapshot.entries_uploaded, 2);
    assert_eq!(snapshot.appends, 1);
    assert!(snapshot.bytes_uploaded > (2 * PER_RECORD_OVERHEAD) as u64);
}
