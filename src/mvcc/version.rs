//! Version records
//!
//! A version record is a value (or explicit tombstone) written by one
//! transaction. The record itself never changes after creation. Its commit
//! and durable timestamps live in the owning transaction's shared state, so
//! a multi-key commit becomes visible with a single status write.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{CommitSeq, DataValue, Timestamp, TxnId};

/// Either a value or an explicit deletion marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionPayload {
    Value(DataValue),
    Tombstone,
}

impl VersionPayload {
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, VersionPayload::Tombstone)
    }

    /// The value, or `None` for a tombstone.
    pub fn value(&self) -> Option<&DataValue> {
        match self {
            VersionPayload::Value(value) => Some(value),
            VersionPayload::Tombstone => None,
        }
    }
}

/// Resolution state of a transaction, as seen by readers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxnStatus {
    Running,
    /// `generation` orders prepares against transaction snapshots.
    Prepared {
        prepare_ts: Timestamp,
        generation: u64,
    },
    Committed {
        commit_ts: Timestamp,
        durable_ts: Timestamp,
        seq: CommitSeq,
    },
    RolledBack,
}

impl TxnStatus {
    /// Returns true once the transaction can no longer change state.
    pub fn is_resolved(&self) -> bool {
        matches!(self, TxnStatus::Committed { .. } | TxnStatus::RolledBack)
    }
}

/// Transaction state shared between a transaction and every record it wrote.
#[derive(Debug)]
pub struct TxnState {
    id: TxnId,
    status: RwLock<TxnStatus>,
}

impl TxnState {
    pub(crate) fn new(id: TxnId) -> Self {
        Self {
            id,
            status: RwLock::new(TxnStatus::Running),
        }
    }

    #[inline]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Current status.
    pub fn status(&self) -> TxnStatus {
        *self.status.read()
    }

    /// Publishes a new status to all readers at once.
    pub(crate) fn publish(&self, status: TxnStatus) {
        *self.status.write() = status;
    }
}

/// One immutable version of a key.
#[derive(Clone, Debug)]
pub struct VersionRecord {
    payload: VersionPayload,
    owner: Arc<TxnState>,
}

impl VersionRecord {
    pub fn new(payload: VersionPayload, owner: Arc<TxnState>) -> Self {
        Self { payload, owner }
    }

    #[inline]
    pub fn payload(&self) -> &VersionPayload {
        &self.payload
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_tombstone()
    }

    /// Writing transaction.
    #[inline]
    pub fn txn_id(&self) -> TxnId {
        self.owner.id()
    }

    /// Status of the writing transaction.
    pub fn status(&self) -> TxnStatus {
        self.owner.status()
    }

    /// Commit timestamp, once committed.
    pub fn commit_ts(&self) -> Option<Timestamp> {
        match self.status() {
            TxnStatus::Committed { commit_ts, .. } => Some(commit_ts),
            _ => None,
        }
    }

    /// Durable timestamp, once committed.
    pub fn durable_ts(&self) -> Option<Timestamp> {
        match self.status() {
            TxnStatus::Committed { durable_ts, .. } => Some(durable_ts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(id: u64) -> Arc<TxnState> {
        Arc::new(TxnState::new(TxnId::new(id)))
    }

    #[test]
    fn test_new_record_is_uncommitted() {
        let record = VersionRecord::new(VersionPayload::Value("v".into()), owner(1));
        assert_eq!(record.status(), TxnStatus::Running);
        assert_eq!(record.commit_ts(), None);
        assert!(!record.is_tombstone());
        assert_eq!(record.payload().value(), Some(&DataValue::from("v")));
    }

    #[test]
    fn test_publish_reaches_every_record() {
        let txn = owner(2);
        let a = VersionRecord::new(VersionPayload::Value("a".into()), txn.clone());
        let b = VersionRecord::new(VersionPayload::Tombstone, txn.clone());

        txn.publish(TxnStatus::Committed {
            commit_ts: Timestamp::new(60),
            durable_ts: Timestamp::new(65),
            seq: CommitSeq::new(1),
        });

        assert_eq!(a.commit_ts(), Some(Timestamp::new(60)));
        assert_eq!(b.durable_ts(), Some(Timestamp::new(65)));
        assert!(b.status().is_resolved());
    }

    #[test]
    fn test_tombstone_has_no_value() {
        let record = VersionRecord::new(VersionPayload::Tombstone, owner(3));
        assert!(record.is_tombstone());
        assert_eq!(record.payload().value(), None);
        assert_eq!(record.txn_id(), TxnId::new(3));
    }
}
