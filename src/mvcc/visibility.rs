//! Read views and visibility
//!
//! A read view describes which committed versions a read may observe.
//! Given a view and a key's chain, the visible version is the committed
//! version with the greatest `(commit_ts, commit_seq)` that the view admits,
//! except that a transaction always sees its own uncommitted writes.
//! A visible tombstone makes the key read as absent.
//!
//! Live reads that meet a prepared version at or below their read bound
//! fail with `PrepareConflict`: the outcome of that transaction would
//! change the answer. A transaction snapshot skips versions prepared after
//! it was taken, since they commit past the snapshot. Checkpoint reads
//! never see prepared versions.

use super::{CommitSeq, DataValue, MvccError, MvccResult, Timestamp, TxnId, TxnStatus};
use super::{VersionNode, VersionRecord};

/// Which committed versions a read may observe.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadView {
    /// Latest committed state.
    Latest,
    /// Versions committed at or before a read timestamp.
    AsOf(Timestamp),
    /// A transaction's snapshot, plus its own writes. `prepare_generation`
    /// is the database's prepare generation when the snapshot was taken.
    Transaction {
        txn: TxnId,
        snapshot: CommitSeq,
        read_ts: Option<Timestamp>,
        prepare_generation: u64,
    },
    /// A checkpoint: commits up to `seq_upper`, bounded by `bound` if set.
    Checkpoint {
        seq_upper: CommitSeq,
        bound: Option<Timestamp>,
    },
}

impl ReadView {
    /// Live view for an optional read timestamp.
    pub fn live(read_ts: Option<Timestamp>) -> Self {
        match read_ts {
            Some(ts) => ReadView::AsOf(ts),
            None => ReadView::Latest,
        }
    }

    /// Checkpoint view. A read timestamp is clamped to the checkpoint's
    /// stable timestamp; an unset stable timestamp bounds nothing.
    pub fn checkpoint(seq_upper: CommitSeq, stable: Timestamp, read_ts: Option<Timestamp>) -> Self {
        let bound = match (stable.is_none(), read_ts) {
            (true, read_ts) => read_ts,
            (false, None) => Some(stable),
            (false, Some(read_ts)) => Some(read_ts.min(stable)),
        };
        ReadView::Checkpoint { seq_upper, bound }
    }

    fn owner(&self) -> Option<TxnId> {
        match self {
            ReadView::Transaction { txn, .. } => Some(*txn),
            _ => None,
        }
    }

    /// Returns true if a commit at `(commit_ts, seq)` is visible.
    pub fn sees_commit(&self, commit_ts: Timestamp, seq: CommitSeq) -> bool {
        match *self {
            ReadView::Latest => true,
            ReadView::AsOf(read_ts) => commit_ts <= read_ts,
            ReadView::Transaction {
                snapshot, read_ts, ..
            } => seq <= snapshot && read_ts.map_or(true, |read_ts| commit_ts <= read_ts),
            ReadView::Checkpoint { seq_upper, bound } => {
                seq <= seq_upper && bound.map_or(true, |bound| commit_ts <= bound)
            }
        }
    }

    fn conflicts_with_prepare(&self, prepare_ts: Timestamp, generation: u64) -> bool {
        match *self {
            ReadView::Latest => true,
            ReadView::AsOf(read_ts) => prepare_ts <= read_ts,
            ReadView::Transaction {
                read_ts,
                prepare_generation,
                ..
            } => {
                generation <= prepare_generation
                    && read_ts.map_or(true, |read_ts| prepare_ts <= read_ts)
            }
            ReadView::Checkpoint { .. } => false,
        }
    }
}

/// Stateless visibility resolver.
pub struct Visibility;

impl Visibility {
    /// The version of `key` visible under `view`, tombstones included.
    pub fn visible_version<'a>(
        key: &DataValue,
        head: Option<&'a VersionNode>,
        view: &ReadView,
    ) -> MvccResult<Option<&'a VersionRecord>> {
        let owner = view.owner();
        let mut best: Option<(&VersionRecord, Timestamp, CommitSeq)> = None;

        for record in head.into_iter().flat_map(VersionNode::iter) {
            let status = record.status();
            if owner == Some(record.txn_id()) && !status.is_resolved() {
                return Ok(Some(record));
            }
            match status {
                TxnStatus::Running | TxnStatus::RolledBack => {}
                TxnStatus::Prepared {
                    prepare_ts,
                    generation,
                } => {
                    if view.conflicts_with_prepare(prepare_ts, generation) {
                        return Err(MvccError::PrepareConflict(key.to_string()));
                    }
                }
                TxnStatus::Committed { commit_ts, seq, .. } => {
                    let newer = best.map_or(true, |(_, ts, s)| (commit_ts, seq) > (ts, s));
                    if view.sees_commit(commit_ts, seq) && newer {
                        best = Some((record, commit_ts, seq));
                    }
                }
            }
        }
        Ok(best.map(|(record, _, _)| record))
    }

    /// The value of `key` visible under `view`, or `None`.
    pub fn visible_value(
        key: &DataValue,
        head: Option<&VersionNode>,
        view: &ReadView,
    ) -> MvccResult<Option<DataValue>> {
        let record = Self::visible_version(key, head, view)?;
        Ok(record.and_then(|record| record.payload().value().cloned()))
    }
}
