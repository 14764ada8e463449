//! Checkpoint descriptors
//!
//! A serializable summary of a checkpoint, for tooling and logs:
//! - name: `null` for the unnamed checkpoint
//! - stable_timestamp: stable timestamp captured at creation (0 = unset)
//! - commit_seq: highest commit sequence included
//! - created_at: RFC3339 wall-clock creation time
//! - tables: tables captured, sorted by name

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checkpoint descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointInfo {
    pub name: Option<String>,
    pub stable_timestamp: u64,
    pub commit_seq: u64,
    pub created_at: String,
    pub tables: Vec<String>,
}

impl CheckpointInfo {
    pub(crate) fn new(
        name: Option<String>,
        stable_timestamp: u64,
        commit_seq: u64,
        created_at: DateTime<Utc>,
        tables: Vec<String>,
    ) -> Self {
        Self {
            name,
            stable_timestamp,
            commit_seq,
            created_at: created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            tables,
        }
    }

    /// Serializes the descriptor to JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Deserializes a descriptor from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
