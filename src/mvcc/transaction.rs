//! Transactions
//!
//! ```text
//! running ──prepare──► prepared ──commit──► committed
//!    │                    │
//!    ├──────commit────────┼───────────────► committed
//!    └──────rollback──────┴──rollback─────► rolled_back
//! ```
//!
//! Timestamp rules:
//! - prepare_ts must be after the stable timestamp
//! - a prepared transaction must commit with commit_ts >= prepare_ts and
//!   commit_ts after the stable timestamp at commit time
//! - durable_ts defaults to commit_ts and may not precede it
//!
//! A failed prepare or commit leaves the transaction where it was. A
//! transaction dropped while unresolved is rolled back.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::database::DatabaseCore;
use super::{
    CommitSeq, KeyChain, MvccError, MvccResult, ReadView, Timestamp, TxnId, TxnState, TxnStatus,
};

struct TxnInner {
    read_ts: Option<Timestamp>,
    snapshot: CommitSeq,
    prepare_generation: u64,
    writes: Vec<Arc<KeyChain>>,
}

/// A transaction against one database.
pub struct Transaction {
    state: Arc<TxnState>,
    core: Arc<DatabaseCore>,
    inner: Mutex<TxnInner>,
}

impl Transaction {
    pub(crate) fn begin(core: Arc<DatabaseCore>, read_ts: Option<Timestamp>) -> Self {
        let id = core.next_txn_id();
        let (snapshot, prepare_generation) = core.snapshot_marks();
        debug!(txn = id.value(), read_ts = ?read_ts.map(|ts| ts.value()), "txn.begin");
        Self {
            state: Arc::new(TxnState::new(id)),
            core,
            inner: Mutex::new(TxnInner {
                read_ts,
                snapshot,
                prepare_generation,
                writes: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> TxnId {
        self.state.id()
    }

    pub fn status(&self) -> TxnStatus {
        self.state.status()
    }

    /// The read timestamp fixed at begin, if any.
    pub fn read_timestamp(&self) -> Option<Timestamp> {
        self.inner.lock().read_ts
    }

    /// The view this transaction reads through.
    pub fn view(&self) -> ReadView {
        let inner = self.inner.lock();
        ReadView::Transaction {
            txn: self.id(),
            snapshot: inner.snapshot,
            read_ts: inner.read_ts,
            prepare_generation: inner.prepare_generation,
        }
    }

    pub(crate) fn state(&self) -> &Arc<TxnState> {
        &self.state
    }

    /// Fails unless the transaction can still write.
    pub(crate) fn ensure_running(&self) -> MvccResult<()> {
        match self.status() {
            TxnStatus::Running => Ok(()),
            other => Err(MvccError::InvalidState(format!(
                "{} cannot write in state {:?}",
                self.id(),
                other
            ))),
        }
    }

    pub(crate) fn record_write(&self, chain: &Arc<KeyChain>) {
        let mut inner = self.inner.lock();
        if !inner.writes.iter().any(|c| Arc::ptr_eq(c, chain)) {
            inner.writes.push(Arc::clone(chain));
        }
    }

    /// Prepares the transaction at `prepare_ts`.
    pub fn prepare(&self, prepare_ts: Timestamp) -> MvccResult<()> {
        self.ensure_running()?;
        if prepare_ts.is_none() {
            return Err(MvccError::IllegalTimestamp(
                "prepare timestamp must be set".to_string(),
            ));
        }
        let mut authority = self.core.authority();
        let stable = authority.stable();
        if prepare_ts <= stable {
            return Err(MvccError::IllegalTimestamp(format!(
                "prepare timestamp {} is not after the stable timestamp {}",
                prepare_ts, stable
            )));
        }
        let generation = authority.next_prepare_generation();
        self.state.publish(TxnStatus::Prepared {
            prepare_ts,
            generation,
        });
        drop(authority);
        debug!(
            txn = self.id().value(),
            prepare_ts = prepare_ts.value(),
            generation,
            "txn.prepare"
        );
        Ok(())
    }

    /// Commits at `commit_ts`, durable at `durable_ts` (default: `commit_ts`).
    ///
    /// `Timestamp::NONE` commits without a timestamp; such versions are
    /// visible at every read timestamp. Prepared transactions must supply one.
    pub fn commit(&self, commit_ts: Timestamp, durable_ts: Option<Timestamp>) -> MvccResult<()> {
        let durable_ts = durable_ts.unwrap_or(commit_ts);
        if durable_ts < commit_ts {
            return Err(MvccError::IllegalTimestamp(format!(
                "durable timestamp {} precedes commit timestamp {}",
                durable_ts, commit_ts
            )));
        }

        let mut authority = self.core.authority();
        match self.status() {
            TxnStatus::Running => {}
            TxnStatus::Prepared { prepare_ts, .. } => {
                if commit_ts.is_none() {
                    return Err(MvccError::IllegalTimestamp(
                        "prepared transaction must commit with a timestamp".to_string(),
                    ));
                }
                if commit_ts < prepare_ts {
                    return Err(MvccError::IllegalTimestamp(format!(
                        "commit timestamp {} precedes prepare timestamp {}",
                        commit_ts, prepare_ts
                    )));
                }
                if commit_ts <= authority.stable() {
                    return Err(MvccError::IllegalTimestamp(format!(
                        "commit timestamp {} is not after the stable timestamp {}",
                        commit_ts,
                        authority.stable()
                    )));
                }
            }
            other => {
                return Err(MvccError::InvalidState(format!(
                    "{} cannot commit in state {:?}",
                    self.id(),
                    other
                )))
            }
        }

        let seq = authority.next_commit_seq();
        authority.mark_committed(seq)?;
        self.state.publish(TxnStatus::Committed {
            commit_ts,
            durable_ts,
            seq,
        });
        drop(authority);

        let writes = std::mem::take(&mut self.inner.lock().writes);
        self.core.metrics().increment_commits();
        debug!(
            txn = self.id().value(),
            commit_ts = commit_ts.value(),
            durable_ts = durable_ts.value(),
            seq = seq.value(),
            keys = writes.len(),
            "txn.commit"
        );
        Ok(())
    }

    /// Discards every version this transaction wrote.
    ///
    /// No-op on a transaction that already rolled back; a committed
    /// transaction cannot be rolled back and is left as is.
    pub fn rollback(&self) {
        match self.status() {
            TxnStatus::RolledBack => return,
            TxnStatus::Committed { .. } => {
                warn!(txn = self.id().value(), "txn.rollback_after_commit");
                return;
            }
            TxnStatus::Running | TxnStatus::Prepared { .. } => {}
        }

        self.state.publish(TxnStatus::RolledBack);
        let writes = std::mem::take(&mut self.inner.lock().writes);
        let removed: usize = writes.iter().map(|chain| chain.discard(self.id())).sum();
        self.core.metrics().increment_rollbacks();
        debug!(txn = self.id().value(), removed, "txn.rollback");
    }

    /// Moves the snapshot to the latest committed state.
    ///
    /// Drops any read timestamp given at begin.
    pub fn reset_snapshot(&self) -> MvccResult<()> {
        self.ensure_running()?;
        let (snapshot, prepare_generation) = self.core.snapshot_marks();
        let mut inner = self.inner.lock();
        inner.snapshot = snapshot;
        inner.prepare_generation = prepare_generation;
        inner.read_ts = None;
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.state.status().is_resolved() {
            self.rollback();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}
