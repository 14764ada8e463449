//! Key version chains
//!
//! A chain is a singly linked list of immutable nodes, newest first. New
//! versions are published by swapping the head pointer; a reader that
//! cloned the head keeps a consistent chain however many versions are
//! published after it. Rolled back versions are unlinked by rebuilding the
//! newer part of the chain and publishing the rebuilt head, never by
//! editing a node in place.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{MvccResult, TxnId, VersionRecord};

/// An immutable chain node.
#[derive(Debug)]
pub struct VersionNode {
    record: VersionRecord,
    older: Option<Arc<VersionNode>>,
}

impl VersionNode {
    #[inline]
    pub fn record(&self) -> &VersionRecord {
        &self.record
    }

    #[inline]
    pub fn older(&self) -> Option<&Arc<VersionNode>> {
        self.older.as_ref()
    }

    /// Iterates from this node towards older versions.
    pub fn iter(&self) -> VersionIter<'_> {
        VersionIter { next: Some(self) }
    }
}

/// Newest-to-oldest iterator over a chain snapshot.
pub struct VersionIter<'a> {
    next: Option<&'a VersionNode>,
}

impl<'a> Iterator for VersionIter<'a> {
    type Item = &'a VersionRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.older.as_deref();
        Some(&node.record)
    }
}

/// The version history of one key.
#[derive(Debug, Default)]
pub struct KeyChain {
    head: RwLock<Option<Arc<VersionNode>>>,
}

impl KeyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current head.
    pub fn head(&self) -> Option<Arc<VersionNode>> {
        self.head.read().clone()
    }

    /// Returns true if the chain has no versions.
    pub fn is_empty(&self) -> bool {
        self.head.read().is_none()
    }

    /// Number of versions in the chain.
    pub fn len(&self) -> usize {
        self.head().map_or(0, |head| head.iter().count())
    }

    /// Publishes `record` as the newest version.
    pub fn push(&self, record: VersionRecord) {
        let mut head = self.head.write();
        let node = Arc::new(VersionNode {
            record,
            older: head.take(),
        });
        *head = Some(node);
    }

    /// Runs `check` against the current head and, if it passes, publishes
    /// `record`, without letting another writer in between.
    pub fn push_checked<F>(&self, record: VersionRecord, check: F) -> MvccResult<()>
    where
        F: FnOnce(Option<&VersionNode>) -> MvccResult<()>,
    {
        let mut head = self.head.write();
        check(head.as_deref())?;
        let node = Arc::new(VersionNode {
            record,
            older: head.take(),
        });
        *head = Some(node);
        Ok(())
    }

    /// Unlinks every version written by `txn`. Returns how many were removed.
    pub fn discard(&self, txn: TxnId) -> usize {
        let mut head = self.head.write();

        // Survivors newer than the oldest discarded node get fresh nodes;
        // everything older than it is shared as is.
        let mut newer = Vec::new();
        let mut pending = Vec::new();
        let mut shared = None;
        let mut removed = 0;
        let mut cursor = head.clone();
        while let Some(node) = cursor {
            if node.record.txn_id() == txn {
                removed += 1;
                newer.append(&mut pending);
                shared = node.older.clone();
            } else {
                pending.push(node.record.clone());
            }
            cursor = node.older.clone();
        }
        if removed == 0 {
            return 0;
        }

        let mut rebuilt = shared;
        for record in newer.into_iter().rev() {
            rebuilt = Some(Arc::new(VersionNode {
                record,
                older: rebuilt,
            }));
        }
        *head = rebuilt;
        removed
    }
}
