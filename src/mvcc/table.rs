//! Multi-version tables
//!
//! A table maps keys to version chains. Writes go through a transaction and
//! are checked against the key's newest version under the chain's lock:
//! - another transaction's unresolved version is a write conflict
//! - a committed version the writer cannot see is a write conflict
//!
//! Reads pick a view: latest, as of a read timestamp, a transaction's
//! snapshot, or a checkpoint.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{
    DataValue, KeyChain, MvccError, MvccResult, ReadView, Timestamp, Transaction, TxnStatus,
    VersionNode, VersionPayload, VersionRecord, Visibility,
};
use crate::checkpoint::Checkpoint;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum WriteMode {
    Insert { overwrite: bool },
    Update,
    Remove,
}

/// An ordered, multi-version key/value table.
#[derive(Debug)]
pub struct Table {
    name: String,
    chains: RwLock<BTreeMap<DataValue, Arc<KeyChain>>>,
}

impl Table {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chains: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn chain(&self, key: &DataValue) -> Option<Arc<KeyChain>> {
        self.chains.read().get(key).cloned()
    }

    fn chain_or_create(&self, key: &DataValue) -> Arc<KeyChain> {
        if let Some(chain) = self.chain(key) {
            return chain;
        }
        Arc::clone(self.chains.write().entry(key.clone()).or_default())
    }

    /// Reads `key` under an explicit view.
    pub fn get_with_view(&self, key: &DataValue, view: &ReadView) -> MvccResult<Option<DataValue>> {
        let head = self.chain(key).and_then(|chain| chain.head());
        Visibility::visible_value(key, head.as_deref(), view)
    }

    /// Latest committed value, or the value as of `read_ts`.
    pub fn get(
        &self,
        key: impl Into<DataValue>,
        read_ts: Option<Timestamp>,
    ) -> MvccResult<Option<DataValue>> {
        self.get_with_view(&key.into(), &ReadView::live(read_ts))
    }

    /// Value visible to `txn`, including its own writes.
    pub fn get_in(&self, txn: &Transaction, key: impl Into<DataValue>) -> MvccResult<Option<DataValue>> {
        self.get_with_view(&key.into(), &txn.view())
    }

    /// Value in `checkpoint`, optionally as of `read_ts`.
    pub fn get_at(
        &self,
        checkpoint: &Checkpoint,
        key: impl Into<DataValue>,
        read_ts: Option<Timestamp>,
    ) -> MvccResult<Option<DataValue>> {
        checkpoint.get(&self.name, key, read_ts)
    }

    /// Inserts `key`. Without `overwrite`, fails with `DuplicateKey` if the
    /// key already has a value visible to `txn`.
    pub fn insert(
        &self,
        txn: &Transaction,
        key: impl Into<DataValue>,
        value: impl Into<DataValue>,
        overwrite: bool,
    ) -> MvccResult<()> {
        self.write(
            txn,
            key.into(),
            VersionPayload::Value(value.into()),
            WriteMode::Insert { overwrite },
        )
    }

    /// Replaces the value of an existing key.
    pub fn update(
        &self,
        txn: &Transaction,
        key: impl Into<DataValue>,
        value: impl Into<DataValue>,
    ) -> MvccResult<()> {
        self.write(txn, key.into(), VersionPayload::Value(value.into()), WriteMode::Update)
    }

    /// Removes an existing key.
    pub fn remove(&self, txn: &Transaction, key: impl Into<DataValue>) -> MvccResult<()> {
        self.write(txn, key.into(), VersionPayload::Tombstone, WriteMode::Remove)
    }

    /// Removes every key in `[start, stop]` visible to `txn`; an open bound
    /// extends to the end of the table. Returns the number of keys removed.
    pub fn truncate(
        &self,
        txn: &Transaction,
        start: Option<&DataValue>,
        stop: Option<&DataValue>,
    ) -> MvccResult<usize> {
        txn.ensure_running()?;
        if let (Some(start), Some(stop)) = (start, stop) {
            if start > stop {
                return Ok(0);
            }
        }
        let lower = start.map_or(Bound::Unbounded, Bound::Included);
        let upper = stop.map_or(Bound::Unbounded, Bound::Included);
        let keys: Vec<DataValue> = self
            .chains
            .read()
            .range::<DataValue, _>((lower, upper))
            .map(|(key, _)| key.clone())
            .collect();

        let view = txn.view();
        let mut removed = 0;
        for key in keys {
            if self.get_with_view(&key, &view)?.is_some() {
                self.write(txn, key, VersionPayload::Tombstone, WriteMode::Remove)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Current head of every non-empty chain.
    pub(crate) fn snapshot_heads(&self) -> BTreeMap<DataValue, Arc<VersionNode>> {
        self.chains
            .read()
            .iter()
            .filter_map(|(key, chain)| chain.head().map(|head| (key.clone(), head)))
            .collect()
    }

    fn write(
        &self,
        txn: &Transaction,
        key: DataValue,
        payload: VersionPayload,
        mode: WriteMode,
    ) -> MvccResult<()> {
        txn.ensure_running()?;
        let view = txn.view();
        let chain = self.chain_or_create(&key);
        let record = VersionRecord::new(payload, Arc::clone(txn.state()));

        chain.push_checked(record, |head| {
            check_write_conflict(&key, head, &view, txn)?;
            let exists = Visibility::visible_value(&key, head, &view)?.is_some();
            match mode {
                WriteMode::Insert { overwrite: false } if exists => {
                    Err(MvccError::DuplicateKey(key.to_string()))
                }
                WriteMode::Update | WriteMode::Remove if !exists => {
                    Err(MvccError::NotFound(key.to_string()))
                }
                _ => Ok(()),
            }
        })?;
        txn.record_write(&chain);
        Ok(())
    }
}

fn check_write_conflict(
    key: &DataValue,
    head: Option<&VersionNode>,
    view: &ReadView,
    txn: &Transaction,
) -> MvccResult<()> {
    for record in head.into_iter().flat_map(VersionNode::iter) {
        if record.txn_id() == txn.id() {
            return Ok(());
        }
        match record.status() {
            TxnStatus::RolledBack => continue,
            TxnStatus::Running | TxnStatus::Prepared { .. } => {
                return Err(MvccError::WriteConflict(key.to_string()))
            }
            TxnStatus::Committed { commit_ts, seq, .. } => {
                if view.sees_commit(commit_ts, seq) {
                    return Ok(());
                }
                return Err(MvccError::WriteConflict(key.to_string()));
            }
        }
    }
    Ok(())
}
