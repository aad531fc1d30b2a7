//! Eventcast Configuration
//!
//! TOML-based configuration loading with sensible defaults. A minimal
//! config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use eventcast_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[sink]\ntype = \"stdout\"").unwrap();
//! ```
//!
//! # Example Full Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [watch]
//! namespace = ""            # empty = all namespaces
//!
//! [relay]
//! capacity = 1500
//! drop_oldest = true
//!
//! [sink]
//! type = "seqlog"
//! endpoint = "https://logs.example.com"
//! log_group = "cluster-events"
//! log_stream = "default"
//! upload_interval_secs = 120
//! ```

mod error;
mod logging;
mod relay;
mod sink;
mod watch;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogLevel};
pub use relay::{DEFAULT_RELAY_CAPACITY, RelayConfig};
pub use sink::{
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_UPLOAD_INTERVAL_SECS, SeqLogSinkConfig, SinkSelection,
    StdoutSinkConfig,
};
pub use watch::WatchConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Watch source settings
    pub watch: WatchConfig,

    /// Relay channel settings
    pub relay: RelayConfig,

    /// Active sink selection
    pub sink: SinkSelection,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        contents.parse()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.relay.validate()?;
        self.sink.validate()?;
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
