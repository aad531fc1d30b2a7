//! Normalized cluster event model
//!
//! A `ClusterEvent` is the relay's view of one audit/status record from
//! the control plane: who it happened to, why, how often, and when it
//! was first and last observed. Fields the control plane leaves unset
//! stay `None`/empty rather than failing conversion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity class of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventKind {
    /// Routine informational event
    #[default]
    Normal,

    /// Something the operator should look at
    Warning,

    /// Unrecognized type string from the control plane
    #[serde(other)]
    Other,
}

impl EventKind {
    /// Parse the control plane's free-form type string
    pub fn from_type_str(s: &str) -> Self {
        match s {
            "Normal" => Self::Normal,
            "Warning" => Self::Warning,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
            Self::Other => "Other",
        }
    }
}

/// Reference to the object an event is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectRef {
    pub api_version: Option<String>,
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub uid: Option<String>,
}

impl ObjectRef {
    /// `namespace/name` form used in log lines
    pub fn display_name(&self) -> String {
        let name = self.name.as_deref().unwrap_or("<unknown>");
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{}/{}", ns, name),
            _ => name.to_string(),
        }
    }
}

/// Component that reported an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSource {
    pub component: Option<String>,
    pub host: Option<String>,
}

/// One cluster event record as observed through the watch source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterEvent {
    /// Event object's own namespace
    pub namespace: Option<String>,

    /// Event object's own name
    pub name: Option<String>,

    /// Event object's UID (stable across updates to the same event)
    pub uid: Option<String>,

    /// Machine-readable reason, e.g. "BackOff"
    pub reason: Option<String>,

    /// Human-readable description
    pub message: Option<String>,

    /// Normal / Warning
    pub kind: EventKind,

    /// Reporting component
    pub source: EventSource,

    /// Object the event is about
    pub involved: ObjectRef,

    /// Number of occurrences compacted into this record
    pub count: i32,

    /// First observation time
    pub first_timestamp: Option<DateTime<Utc>>,

    /// Most recent observation time
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl ClusterEvent {
    /// Milliseconds since epoch of the most recent observation, falling
    /// back to the first observation. `None` when the control plane set
    /// neither timestamp.
    pub fn last_seen_millis(&self) -> Option<i64> {
        self.last_timestamp
            .or(self.first_timestamp)
            .map(|t| t.timestamp_millis())
    }

    /// Short identity used in log lines: the involved object if known,
    /// otherwise the event object itself.
    pub fn display_name(&self) -> String {
        if self.involved.name.is_some() {
            return self.involved.display_name();
        }
        let name = self.name.as_deref().unwrap_or("<unknown>");
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{}/{}", ns, name),
            _ => name.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;
