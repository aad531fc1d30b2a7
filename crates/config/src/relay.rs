//! Relay channel configuration
//!
//! The bounded queue between the watch-dispatch path and each sink's
//! drain task.

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Default number of records buffered before the overflow policy kicks in
pub const DEFAULT_RELAY_CAPACITY: usize = 1500;

/// Relay channel configuration
///
/// # Example
///
/// ```toml
/// [relay]
/// capacity = 1500
/// drop_oldest = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum records held between drain cycles
    pub capacity: usize,

    /// When full, sacrifice the oldest queued record (true) or the
    /// newly arriving one (false)
    pub drop_oldest: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RELAY_CAPACITY,
            drop_oldest: true,
        }
    }
}

impl RelayConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ConfigError::invalid_value(
                "relay",
                "capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
