//! Common types shared by sinks

use thiserror::Error;

/// Errors raised while constructing a sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink initialization failed
    #[error("failed to initialize sink: {0}")]
    Init(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl SinkError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
