//! MVCC Transaction Tests
//!
//! - Timestamp visibility of committed writes
//! - Snapshot isolation and read-your-writes
//! - Atomic publication of multi-key commits under concurrent readers
//! - Write-write conflicts between concurrent writers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use keelstore::mvcc::{Database, DataValue, MvccError, Timestamp, TxnStatus};
use proptest::prelude::*;

// =============================================================================
// Test Utilities
// =============================================================================

fn ts(v: u64) -> Timestamp {
    Timestamp::new(v)
}

fn val(v: i64) -> Option<DataValue> {
    Some(DataValue::from(v))
}

// =============================================================================
// Timestamp Visibility
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A commit at `c` is visible at read timestamp `r` exactly when `r >= c`.
    #[test]
    fn test_commit_visible_from_its_timestamp(c in 1u64..1000, r in 1u64..1000) {
        let db = Database::new();
        let table = db.create_table("t").unwrap();
        let txn = db.begin_transaction(None);
        table.insert(&txn, 1i64, 100i64, false).unwrap();
        txn.commit(ts(c), None).unwrap();

        let seen = table.get(1i64, Some(ts(r))).unwrap();
        prop_assert_eq!(seen.is_some(), r >= c);
        prop_assert_eq!(table.get(1i64, None).unwrap(), val(100));
    }
}

/// The version with the greatest commit timestamp wins, whatever the commit order.
#[test]
fn test_greatest_commit_timestamp_wins() {
    let db = Database::new();
    let table = db.create_table("t").unwrap();

    let txn = db.begin_transaction(None);
    table.insert(&txn, 1i64, 20i64, false).unwrap();
    txn.commit(ts(20), None).unwrap();

    let txn = db.begin_transaction(None);
    table.update(&txn, 1i64, 10i64).unwrap();
    txn.commit(ts(10), None).unwrap();

    assert_eq!(table.get(1i64, None).unwrap(), val(20));
    assert_eq!(table.get(1i64, Some(ts(15))).unwrap(), val(10));
    assert_eq!(table.get(1i64, Some(ts(5))).unwrap(), None);
}

/// Untimestamped commits are visible at every read timestamp.
#[test]
fn test_untimestamped_commit_visible_everywhere() {
    let db = Database::new();
    let table = db.create_table("t").unwrap();
    let txn = db.begin_transaction(None);
    table.insert(&txn, "k", "v", false).unwrap();
    txn.commit(Timestamp::NONE, None).unwrap();

    assert!(table.get("k", Some(ts(1))).unwrap().is_some());
    assert!(table.get("k", None).unwrap().is_some());
}

/// A read timestamp fixed at begin bounds a transaction's reads.
#[test]
fn test_transaction_read_timestamp() {
    let db = Database::new();
    let table = db.create_table("t").unwrap();
    for (value, commit) in [(1i64, 10u64), (2, 20)] {
        let txn = db.begin_transaction(None);
        table.insert(&txn, "k", value, true).unwrap();
        txn.commit(ts(commit), None).unwrap();
    }

    let reader = db.begin_transaction(Some(ts(15)));
    assert_eq!(reader.read_timestamp(), Some(ts(15)));
    assert_eq!(table.get_in(&reader, "k").unwrap(), val(1));
}

// =============================================================================
// Snapshot Isolation
// =============================================================================

/// A transaction does not see commits made after it began until it resets.
#[test]
fn test_snapshot_isolation_and_reset() {
    let db = Database::new();
    let table = db.create_table("t").unwrap();
    let reader = db.begin_transaction(None);

    let writer = db.begin_transaction(None);
    table.insert(&writer, "k", "v", false).unwrap();
    assert_eq!(table.get_in(&writer, "k").unwrap(), Some(DataValue::from("v")));
    assert_eq!(table.get_in(&reader, "k").unwrap(), None);
    writer.commit(ts(5), None).unwrap();

    assert_eq!(table.get_in(&reader, "k").unwrap(), None);
    reader.reset_snapshot().unwrap();
    assert_eq!(table.get_in(&reader, "k").unwrap(), Some(DataValue::from("v")));
}

/// A version prepared after a transaction began is outside its snapshot
/// and does not block its reads. Transactions begun later still conflict.
#[test]
fn test_prepare_after_snapshot_does_not_block_reader() {
    let db = Database::new();
    let table = db.create_table("t").unwrap();

    let writer = db.begin_transaction(None);
    table.insert(&writer, "k", "old", false).unwrap();
    writer.commit(ts(10), None).unwrap();

    let reader = db.begin_transaction(None);
    let bounded = db.begin_transaction(Some(ts(100)));

    let preparer = db.begin_transaction(None);
    table.update(&preparer, "k", "new").unwrap();
    preparer.prepare(ts(50)).unwrap();

    assert_eq!(table.get_in(&reader, "k").unwrap(), Some(DataValue::from("old")));
    assert_eq!(table.get_in(&bounded, "k").unwrap(), Some(DataValue::from("old")));

    let late = db.begin_transaction(Some(ts(100)));
    assert!(matches!(
        table.get_in(&late, "k"),
        Err(MvccError::PrepareConflict(_))
    ));
    assert!(matches!(
        table.get("k", None),
        Err(MvccError::PrepareConflict(_))
    ));

    // Moving the snapshot forward brings the prepare into view.
    reader.reset_snapshot().unwrap();
    assert!(matches!(
        table.get_in(&reader, "k"),
        Err(MvccError::PrepareConflict(_))
    ));

    preparer.commit(ts(60), None).unwrap();
    assert_eq!(table.get_in(&bounded, "k").unwrap(), Some(DataValue::from("old")));
    assert_eq!(table.get_in(&late, "k").unwrap(), Some(DataValue::from("old")));
    assert_eq!(table.get("k", None).unwrap(), Some(DataValue::from("new")));
}

/// Rollback is idempotent and rollback after commit changes nothing.
#[test]
fn test_rollback_semantics() {
    let db = Database::new();
    let table = db.create_table("t").unwrap();

    let txn = db.begin_transaction(None);
    table.insert(&txn, "a", 1i64, false).unwrap();
    txn.rollback();
    txn.rollback();
    assert_eq!(txn.status(), TxnStatus::RolledBack);
    assert!(matches!(
        table.insert(&txn, "a", 1i64, false),
        Err(MvccError::InvalidState(_))
    ));

    let txn = db.begin_transaction(None);
    table.insert(&txn, "b", 2i64, false).unwrap();
    txn.commit(ts(3), None).unwrap();
    txn.rollback();
    assert!(matches!(txn.status(), TxnStatus::Committed { .. }));
    assert_eq!(table.get("b", None).unwrap(), val(2));
    assert_eq!(table.get("a", None).unwrap(), None);
}

/// A durable timestamp before the commit timestamp is rejected.
#[test]
fn test_durable_before_commit_rejected() {
    let db = Database::new();
    let table = db.create_table("t").unwrap();
    let txn = db.begin_transaction(None);
    table.insert(&txn, "k", "v", false).unwrap();
    assert!(matches!(
        txn.commit(ts(20), Some(ts(10))),
        Err(MvccError::IllegalTimestamp(_))
    ));
    assert_eq!(txn.status(), TxnStatus::Running);
    txn.commit(ts(20), Some(ts(25))).unwrap();
}

// =============================================================================
// Concurrency
// =============================================================================

/// Readers never observe half of a multi-key commit.
#[test]
fn test_multi_key_commit_is_atomic() {
    let db = Arc::new(Database::new());
    let table = db.create_table("t").unwrap();
    let setup = db.begin_transaction(None);
    table.insert(&setup, "a", 0i64, false).unwrap();
    table.insert(&setup, "b", 0i64, false).unwrap();
    setup.commit(Timestamp::NONE, None).unwrap();

    let writer = {
        let db = Arc::clone(&db);
        let table = Arc::clone(&table);
        thread::spawn(move || {
            for i in 1..=200i64 {
                let txn = db.begin_transaction(None);
                table.update(&txn, "a", i).unwrap();
                table.update(&txn, "b", i).unwrap();
                txn.commit(Timestamp::NONE, None).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for _ in 0..200 {
                    let txn = db.begin_transaction(None);
                    let a = table.get_in(&txn, "a").unwrap();
                    let b = table.get_in(&txn, "b").unwrap();
                    assert_eq!(a, b);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(table.get("a", None).unwrap(), val(200));
}

/// Concurrent writers to one key: every write either commits or conflicts.
#[test]
fn test_concurrent_writers_conflict_or_commit() {
    let db = Arc::new(Database::new());
    let table = db.create_table("t").unwrap();
    let setup = db.begin_transaction(None);
    table.insert(&setup, "counter", 0i64, false).unwrap();
    setup.commit(Timestamp::NONE, None).unwrap();

    let committed = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = Arc::clone(&db);
            let table = Arc::clone(&table);
            let committed = Arc::clone(&committed);
            thread::spawn(move || {
                for _ in 0..50 {
                    let txn = db.begin_transaction(None);
                    let current = match table.get_in(&txn, "counter").unwrap() {
                        Some(DataValue::Int(n)) => n,
                        other => panic!("unexpected counter value {:?}", other),
                    };
                    match table.update(&txn, "counter", current + 1) {
                        Ok(()) => {
                            txn.commit(Timestamp::NONE, None).unwrap();
                            committed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(MvccError::WriteConflict(_)) => txn.rollback(),
                        Err(e) => panic!("unexpected error {}", e),
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // No lost updates: the counter equals the number of successful commits.
    let total = committed.load(Ordering::SeqCst) as i64;
    assert!(total > 0);
    assert_eq!(table.get("counter", None).unwrap(), val(total));
}

/// Writers on disjoint keys never conflict.
#[test]
fn test_disjoint_writers_never_conflict() {
    let db = Arc::new(Database::new());
    let table = db.create_table("t").unwrap();

    let handles: Vec<_> = (0..4i64)
        .map(|t| {
            let db = Arc::clone(&db);
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for i in 0..50i64 {
                    let txn = db.begin_transaction(None);
                    table.insert(&txn, t * 1000 + i, i, false).unwrap();
                    txn.commit(ts((i + 1) as u64), None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4i64 {
        assert_eq!(table.get(t * 1000 + 49, None).unwrap(), val(49));
    }
    assert_eq!(db.metrics().snapshot().transactions_committed, 200);
}
