//! Checkpoints
//!
//! A checkpoint is an immutable, point-in-time view of every table, taken
//! as of the stable timestamp current at creation.
//!
//! # Design Principles
//!
//! - Capture is a snapshot of chain heads, not a copy of data: committed
//!   versions are never mutated, so sharing them is safe
//! - Creating a checkpoint never blocks writers
//! - A checkpoint's answers never change, whatever happens to the stable
//!   timestamp, the live tables or the table list afterwards
//!
//! # Visibility
//!
//! A version is in a checkpoint if its transaction committed before the
//! checkpoint was taken and, when the captured stable timestamp is set, its
//! commit timestamp is at or before it. Read timestamps are clamped to the
//! captured stable timestamp. Prepared versions are never included.

mod errors;
mod info;
mod manager;

pub use errors::{CheckpointError, CheckpointResult};
pub use info::CheckpointInfo;
pub use manager::CheckpointManager;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::mvcc::{
    CommitSeq, DataValue, MvccError, MvccResult, ReadView, Timestamp, VersionNode, Visibility,
};

/// Frozen chain heads of one table.
#[derive(Debug, Default)]
pub struct FrozenTable {
    heads: BTreeMap<DataValue, Arc<VersionNode>>,
}

impl FrozenTable {
    pub(crate) fn new(heads: BTreeMap<DataValue, Arc<VersionNode>>) -> Self {
        Self { heads }
    }

    /// Number of keys with at least one version at capture time.
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    fn head(&self, key: &DataValue) -> Option<&VersionNode> {
        self.heads.get(key).map(|node| node.as_ref())
    }
}

/// An immutable database snapshot.
#[derive(Debug)]
pub struct Checkpoint {
    name: Option<String>,
    stable_ts: Timestamp,
    seq_upper: CommitSeq,
    created_at: DateTime<Utc>,
    tables: HashMap<String, FrozenTable>,
}

impl Checkpoint {
    pub(crate) fn new(
        name: Option<String>,
        stable_ts: Timestamp,
        seq_upper: CommitSeq,
        tables: HashMap<String, FrozenTable>,
    ) -> Self {
        Self {
            name,
            stable_ts,
            seq_upper,
            created_at: Utc::now(),
            tables,
        }
    }

    /// Checkpoint name; `None` for the unnamed checkpoint.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Stable timestamp captured at creation.
    pub fn stable_timestamp(&self) -> Timestamp {
        self.stable_ts
    }

    /// Highest commit sequence included.
    pub fn commit_seq(&self) -> CommitSeq {
        self.seq_upper
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if `table` existed when the checkpoint was taken.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Frozen state of `table`, if captured.
    pub fn table(&self, table: &str) -> Option<&FrozenTable> {
        self.tables.get(table)
    }

    /// The read view for this checkpoint at an optional read timestamp.
    pub fn view(&self, read_ts: Option<Timestamp>) -> ReadView {
        ReadView::checkpoint(self.seq_upper, self.stable_ts, read_ts)
    }

    /// Value of `key` in `table`, optionally as of `read_ts`.
    pub fn get(
        &self,
        table: &str,
        key: impl Into<DataValue>,
        read_ts: Option<Timestamp>,
    ) -> MvccResult<Option<DataValue>> {
        let frozen = self
            .tables
            .get(table)
            .ok_or_else(|| MvccError::UnknownTable(table.to_string()))?;
        let key = key.into();
        Visibility::visible_value(&key, frozen.head(&key), &self.view(read_ts))
    }

    /// Serializable descriptor.
    pub fn info(&self) -> CheckpointInfo {
        let mut tables: Vec<String> = self.tables.keys().cloned().collect();
        tables.sort();
        CheckpointInfo::new(
            self.name.clone(),
            self.stable_ts.value(),
            self.seq_upper.value(),
            self.created_at,
            tables,
        )
    }
}
