//! Sink selection and per-sink configuration
//!
//! Exactly one sink is active per process; the `type` tag in `[sink]`
//! picks it at startup. The set of sinks is closed - there is no
//! runtime plugin registry.

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Default seconds between uploads to the sequenced log service
pub const DEFAULT_UPLOAD_INTERVAL_SECS: u64 = 120;

/// Default byte ceiling for a single append call, including per-record
/// bookkeeping overhead
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_046_528;

/// Active sink selection
///
/// # Example
///
/// ```toml
/// [sink]
/// type = "seqlog"
/// endpoint = "https://logs.example.com"
/// log_group = "cluster-events"
/// log_stream = "default"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkSelection {
    /// Console sink - human-readable debug output
    Stdout(StdoutSinkConfig),

    /// Sequenced-log sink - batched uploads to a hosted log service
    Seqlog(SeqLogSinkConfig),
}

impl Default for SinkSelection {
    fn default() -> Self {
        Self::Stdout(StdoutSinkConfig::default())
    }
}

impl SinkSelection {
    /// Get the sink type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Stdout(_) => "stdout",
            Self::Seqlog(_) => "seqlog",
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::Stdout(_) => Ok(()),
            Self::Seqlog(c) => c.validate(),
        }
    }
}

/// Console sink configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StdoutSinkConfig {
    /// Enable colored output
    pub color: bool,
}

impl Default for StdoutSinkConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Sequenced-log sink configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeqLogSinkConfig {
    /// Base URL of the log service
    pub endpoint: String,

    /// Log group the stream lives in
    pub log_group: String,

    /// Destination stream name
    pub log_stream: String,

    /// Minimum seconds between successful uploads
    pub upload_interval_secs: u64,

    /// Hard byte ceiling for one append call
    pub max_message_size: usize,
}

impl Default for SeqLogSinkConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            log_group: "cluster-events".to_string(),
            log_stream: "default".to_string(),
            upload_interval_secs: DEFAULT_UPLOAD_INTERVAL_SECS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl SeqLogSinkConfig {
    fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::missing_field("sink", "endpoint"));
        }
        if self.log_stream.is_empty() {
            return Err(ConfigError::missing_field("sink", "log_stream"));
        }
        if self.upload_interval_secs == 0 {
            return Err(ConfigError::invalid_value(
                "sink",
                "upload_interval_secs",
                "must be at least 1",
            ));
        }
        if self.max_message_size == 0 || self.max_message_size > DEFAULT_MAX_MESSAGE_SIZE {
            return Err(ConfigError::invalid_value(
                "sink",
                "max_message_size",
                format!("must be in 1..={}", DEFAULT_MAX_MESSAGE_SIZE),
            ));
        }
        Ok(())
    }
}
