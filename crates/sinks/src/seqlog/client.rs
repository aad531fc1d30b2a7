//! Append client boundary
//!
//! The sequenced-log service is reached through one operation: append a
//! chronological batch of entries to a named stream, quoting the
//! continuation token from the previous append. The trait keeps the
//! uploader testable; `HttpAppendClient` is the production
//! implementation.
//!
//! Error classification matters more than transport detail here: the
//! uploader's retry state machine keys off `AlreadyAccepted` and
//! `InvalidToken`, both of which carry the token the service expected.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::SinkError;

/// One entry in an append call
#[derive(Debug, Clone, Serialize)]
pub struct AppendEntry {
    /// Serialized record payload
    pub payload: String,

    /// Milliseconds since epoch; entries within one call must be
    /// non-decreasing in this field
    pub timestamp_millis: i64,
}

/// Indexes of entries the service rejected from an otherwise
/// successful append
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RejectedInfo {
    /// Entries at or below this index were older than the retention window
    pub too_old_end_index: Option<usize>,

    /// Entries at or above this index were too far in the future
    pub too_new_start_index: Option<usize>,

    /// Entries at or below this index arrived past their expiry
    pub expired_end_index: Option<usize>,
}

impl RejectedInfo {
    /// True when no entries were rejected
    pub fn is_empty(&self) -> bool {
        self.too_old_end_index.is_none()
            && self.too_new_start_index.is_none()
            && self.expired_end_index.is_none()
    }
}

/// Successful append result
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppendResponse {
    /// Token to quote on the next append to the same stream
    pub next_token: Option<String>,

    /// Partially rejected entries, if any
    pub rejected: Option<RejectedInfo>,
}

/// Classified append failures
#[derive(Debug, Error)]
pub enum AppendError {
    /// The batch was already accepted under a different token; carries
    /// the token to use going forward. Recovered transparently.
    #[error("batch already accepted, current token {token:?}")]
    AlreadyAccepted { token: Option<String> },

    /// The quoted token is stale; carries the token the service
    /// expected. Recovered with exactly one retry.
    #[error("stale sequencing token, expected {expected:?}")]
    InvalidToken { expected: Option<String> },

    /// Could not reach the service
    #[error("transport error: {0}")]
    Transport(String),

    /// The service refused the call for any other reason
    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },
}

/// Abstract append-batch RPC
#[async_trait]
pub trait AppendClient: Send + Sync {
    /// Append `entries` to `log_stream`, quoting `token` from the
    /// previous append. Entries must already be sorted by timestamp.
    async fn append_batch(
        &self,
        log_stream: &str,
        entries: &[AppendEntry],
        token: Option<&str>,
    ) -> Result<AppendResponse, AppendError>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// Error body returned by the log service on a refused append
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    expected_token: Option<String>,
}

#[derive(Serialize)]
struct AppendRequestBody<'a> {
    entries: &'a [AppendEntry],
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

/// JSON-over-HTTP append client
///
/// `POST {endpoint}/v1/groups/{group}/streams/{stream}:append`
pub struct HttpAppendClient {
    http: reqwest::Client,
    endpoint: String,
    log_group: String,
}

impl HttpAppendClient {
    /// Build a client for one log group
    pub fn new(endpoint: impl Into<String>, log_group: impl Into<String>) -> Result<Self, SinkError> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(SinkError::config("endpoint must not be empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::init(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            log_group: log_group.into(),
        })
    }

    fn append_url(&self, log_stream: &str) -> String {
        format!(
            "{}/v1/groups/{}/streams/{}:append",
            self.endpoint, self.log_group, log_stream
        )
    }
}

#[async_trait]
impl AppendClient for HttpAppendClient {
    async fn append_batch(
        &self,
        log_stream: &str,
        entries: &[AppendEntry],
        token: Option<&str>,
    ) -> Result<AppendResponse, AppendError> {
        let body = AppendRequestBody { entries, token };

        let response = self
            .http
            .post(self.append_url(log_stream))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<AppendResponse>()
                .await
                .map_err(|e| AppendError::Transport(e.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &text))
    }
}

/// Map a non-success response onto the append error taxonomy
fn classify_error(status: u16, body: &str) -> AppendError {
    let parsed: Option<ServiceErrorBody> = serde_json::from_str(body).ok();

    match parsed {
        Some(err) if err.code == "DataAlreadyAccepted" => AppendError::AlreadyAccepted {
            token: err.expected_token,
        },
        Some(err) if err.code == "InvalidSequenceToken" => AppendError::InvalidToken {
            expected: err.expected_token,
        },
        Some(err) => AppendError::Service {
            status,
            message: if err.message.is_empty() {
                err.code
            } else {
                err.message
            },
        },
        None => AppendError::Service {
            status,
            message: body.chars().take(256).collect(),
        },
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;
