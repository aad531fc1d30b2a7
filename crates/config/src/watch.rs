//! Watch source configuration

use serde::Deserialize;

/// Watch source configuration
///
/// # Example
///
/// ```toml
/// [watch]
/// namespace = "production"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Namespace to watch; empty watches all namespaces
    pub namespace: String,
}

impl WatchConfig {
    /// Namespace to watch, or `None` for all namespaces
    pub fn namespace(&self) -> Option<&str> {
        if self.namespace.is_empty() {
            None
        } else {
            Some(&self.namespace)
        }
    }
}
