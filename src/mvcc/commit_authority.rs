//! Commit authority
//!
//! Owns the database-wide watermarks that commit ordering depends on: the
//! highest assigned commit sequence, the stable timestamp and the prepare
//! generation. The database keeps it behind one lock, so commits, prepares,
//! stable timestamp changes and checkpoint capture are totally ordered with
//! respect to each other.

use super::{CommitSeq, MvccError, MvccResult, Timestamp};

/// Commit sequence and stable timestamp bookkeeping.
#[derive(Debug)]
pub struct CommitAuthority {
    highest: CommitSeq,
    stable: Timestamp,
    prepare_generation: u64,
}

impl CommitAuthority {
    /// Fresh authority: no commits, stable timestamp unset.
    pub fn new() -> Self {
        Self {
            highest: CommitSeq::ZERO,
            stable: Timestamp::NONE,
            prepare_generation: 0,
        }
    }

    /// The sequence the next commit will receive.
    pub fn next_commit_seq(&self) -> CommitSeq {
        self.highest.next()
    }

    /// Records that `seq` was assigned. Sequences must be assigned in order.
    pub fn mark_committed(&mut self, seq: CommitSeq) -> MvccResult<()> {
        let expected = self.next_commit_seq();
        if seq != expected {
            return Err(MvccError::InvalidState(format!(
                "out of order commit: attempted {} but expected {}",
                seq.value(),
                expected.value()
            )));
        }
        self.highest = seq;
        Ok(())
    }

    /// Highest assigned commit sequence, `CommitSeq::ZERO` if none.
    pub fn highest(&self) -> CommitSeq {
        self.highest
    }

    /// Number of prepares issued so far.
    pub fn prepare_generation(&self) -> u64 {
        self.prepare_generation
    }

    /// Issues the generation for a new prepare. A snapshot taken with
    /// `prepare_generation() < g` predates the prepare stamped `g`.
    pub fn next_prepare_generation(&mut self) -> u64 {
        self.prepare_generation += 1;
        self.prepare_generation
    }

    pub fn stable(&self) -> Timestamp {
        self.stable
    }

    /// Moves the stable timestamp forward. Backward moves are ignored.
    ///
    /// Returns true if the stable timestamp changed.
    pub fn advance_stable(&mut self, ts: Timestamp) -> bool {
        if ts > self.stable {
            self.stable = ts;
            true
        } else {
            false
        }
    }
}

impl Default for CommitAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_authority_starts_at_zero() {
        let authority = CommitAuthority::new();
        assert_eq!(authority.highest(), CommitSeq::ZERO);
        assert_eq!(authority.stable(), Timestamp::NONE);
        assert_eq!(authority.next_commit_seq(), CommitSeq::new(1));
        assert_eq!(authority.prepare_generation(), 0);
    }

    #[test]
    fn test_prepare_generation_increases() {
        let mut authority = CommitAuthority::new();
        assert_eq!(authority.next_prepare_generation(), 1);
        assert_eq!(authority.next_prepare_generation(), 2);
        assert_eq!(authority.prepare_generation(), 2);
        assert_eq!(authority.highest(), CommitSeq::ZERO);
    }

    #[test]
    fn test_mark_committed_updates_highest() {
        let mut authority = CommitAuthority::new();
        let seq = authority.next_commit_seq();
        authority.mark_committed(seq).unwrap();
        assert_eq!(authority.highest(), CommitSeq::new(1));
        assert_eq!(authority.next_commit_seq(), CommitSeq::new(2));
    }

    #[test]
    fn test_out_of_order_commit_fails() {
        let mut authority = CommitAuthority::new();
        assert!(matches!(
            authority.mark_committed(CommitSeq::new(5)),
            Err(MvccError::InvalidState(_))
        ));
        assert_eq!(authority.highest(), CommitSeq::ZERO);
    }

    #[test]
    fn test_stable_never_moves_backward() {
        let mut authority = CommitAuthority::new();
        assert!(authority.advance_stable(Timestamp::new(60)));
        assert!(!authority.advance_stable(Timestamp::new(50)));
        assert!(!authority.advance_stable(Timestamp::new(60)));
        assert_eq!(authority.stable(), Timestamp::new(60));
    }
}
