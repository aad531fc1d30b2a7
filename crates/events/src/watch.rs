//! Watch-notification boundary payload
//!
//! The watch source delivers loosely-shaped objects: usually the event
//! itself, but after a missed delete the cache hands over a tombstone
//! placeholder that may or may not still wrap the last known object.
//! The router is responsible for unwrapping; this enum just makes the
//! three shapes explicit.

use std::sync::Arc;

use crate::event::ClusterEvent;

/// One callback argument from the watch source
#[derive(Debug, Clone)]
pub enum WatchObject {
    /// A well-formed event
    Event(Arc<ClusterEvent>),

    /// Cache tombstone for an object deleted while unobserved
    Tombstone {
        last_known: Option<Arc<ClusterEvent>>,
    },

    /// Something that resolved to neither; carries a description for
    /// diagnostics
    Unknown(String),
}

impl WatchObject {
    /// Shape label for log lines
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Event(_) => "event",
            Self::Tombstone { .. } => "tombstone",
            Self::Unknown(_) => "unknown",
        }
    }
}
