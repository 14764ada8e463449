//! Timestamps and commit identities
//!
//! - `Timestamp`: application-assigned logical time (commit, durable,
//!   prepare, read and stable timestamps). Zero means "none".
//! - `CommitSeq`: engine-assigned, totally ordered commit identity. No two
//!   commits share one, and the order matches the order in which commits
//!   became visible.
//! - `TxnId`: transaction identity.

use std::fmt;

/// A logical timestamp.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The unset timestamp. Orders before every other timestamp.
    pub const NONE: Timestamp = Timestamp(0);

    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns true for the unset timestamp.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A totally ordered commit identity.
///
/// Assigned only by the database's commit authority.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CommitSeq(u64);

impl CommitSeq {
    /// Precedes every real commit.
    pub const ZERO: CommitSeq = CommitSeq(0);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    #[inline]
    pub(crate) fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

/// A transaction identity.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TxnId(u64);

impl TxnId {
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}
