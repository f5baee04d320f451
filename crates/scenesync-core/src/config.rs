//! Graph-wide sync configuration

use serde::{Deserialize, Serialize};

use crate::error::SyncResult;

/// Default capacity of the observer event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// When local writes are sent to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushPolicy {
    /// Flush after every successful write to an open object
    Eager,
    /// Flush only on an explicit `flush()` / `flush_all()` tick
    #[default]
    Batched,
}

/// Configuration for an [`ObjectGraph`](crate::ObjectGraph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub flush_policy: FlushPolicy,
    /// Events buffered per observer before the slowest one starts lagging
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_policy: FlushPolicy::Batched,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Parse from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
