//! Database handle
//!
//! Owns the table catalog, the commit authority and the checkpoint registry.
//! Transactions and tables share the core through an `Arc`, so a table or
//! transaction outliving a `drop_table` keeps working against its own data.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use super::{CommitAuthority, CommitSeq, MvccError, MvccResult, Table, Timestamp, Transaction, TxnId};
use crate::checkpoint::{Checkpoint, CheckpointManager, CheckpointResult, FrozenTable};
use crate::observability::MetricsRegistry;

/// State shared between a database and its transactions.
pub(crate) struct DatabaseCore {
    authority: Mutex<CommitAuthority>,
    next_txn: AtomicU64,
    metrics: Arc<MetricsRegistry>,
}

impl DatabaseCore {
    fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            authority: Mutex::new(CommitAuthority::new()),
            next_txn: AtomicU64::new(1),
            metrics,
        }
    }

    pub(crate) fn next_txn_id(&self) -> TxnId {
        TxnId::new(self.next_txn.fetch_add(1, Ordering::Relaxed))
    }

    /// Highest commit sequence and prepare generation, read together.
    pub(crate) fn snapshot_marks(&self) -> (CommitSeq, u64) {
        let authority = self.authority.lock();
        (authority.highest(), authority.prepare_generation())
    }

    pub(crate) fn authority(&self) -> MutexGuard<'_, CommitAuthority> {
        self.authority.lock()
    }

    pub(crate) fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }
}

/// A multi-version, transactional key/value database.
pub struct Database {
    core: Arc<DatabaseCore>,
    tables: RwLock<BTreeMap<String, Arc<Table>>>,
    checkpoints: CheckpointManager,
}

impl Database {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(MetricsRegistry::new()))
    }

    /// Database reporting into a shared metrics registry.
    pub fn with_metrics(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            core: Arc::new(DatabaseCore::new(metrics)),
            tables: RwLock::new(BTreeMap::new()),
            checkpoints: CheckpointManager::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.core.metrics
    }

    /// Creates an empty table.
    pub fn create_table(&self, name: &str) -> MvccResult<Arc<Table>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(MvccError::TableExists(name.to_string()));
        }
        let table = Arc::new(Table::new(name));
        tables.insert(name.to_string(), Arc::clone(&table));
        debug!(table = name, "table.create");
        Ok(table)
    }

    pub fn table(&self, name: &str) -> MvccResult<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MvccError::UnknownTable(name.to_string()))
    }

    /// Removes a table from the catalog. Checkpoints taken earlier keep
    /// their copy of it.
    pub fn drop_table(&self, name: &str) -> MvccResult<()> {
        self.tables
            .write()
            .remove(name)
            .map(|_| debug!(table = name, "table.drop"))
            .ok_or_else(|| MvccError::UnknownTable(name.to_string()))
    }

    /// Table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Starts a transaction, optionally reading as of `read_ts`.
    pub fn begin_transaction(&self, read_ts: Option<Timestamp>) -> Transaction {
        Transaction::begin(Arc::clone(&self.core), read_ts)
    }

    /// Moves the stable timestamp forward. Earlier values are ignored.
    pub fn set_stable_timestamp(&self, ts: Timestamp) {
        let mut authority = self.core.authority();
        let previous = authority.stable();
        if authority.advance_stable(ts) {
            debug!(from = previous.value(), to = ts.value(), "stable.advance");
        } else {
            debug!(current = previous.value(), requested = ts.value(), "stable.ignored");
        }
    }

    pub fn stable_timestamp(&self) -> Timestamp {
        self.core.authority().stable()
    }

    /// Takes a checkpoint of every table as of the current stable timestamp.
    ///
    /// A named checkpoint replaces any earlier one with the same name;
    /// `None` replaces the previous unnamed checkpoint.
    pub fn create_checkpoint(&self, name: Option<&str>) -> CheckpointResult<Arc<Checkpoint>> {
        if let Some(name) = name {
            CheckpointManager::validate_name(name)?;
        }

        let (stable, seq_upper) = {
            let authority = self.core.authority();
            (authority.stable(), authority.highest())
        };

        let tables: HashMap<String, FrozenTable> = self
            .tables
            .read()
            .iter()
            .map(|(name, table)| (name.clone(), FrozenTable::new(table.snapshot_heads())))
            .collect();
        let table_count = tables.len();

        let checkpoint = self.checkpoints.register(Checkpoint::new(
            name.map(str::to_string),
            stable,
            seq_upper,
            tables,
        ));
        self.core.metrics().increment_checkpoints();
        info!(
            name = name.unwrap_or("(unnamed)"),
            stable_ts = stable.value(),
            commit_seq = seq_upper.value(),
            tables = table_count,
            "checkpoint.create"
        );
        Ok(checkpoint)
    }

    /// A checkpoint by name, or the latest unnamed one.
    pub fn checkpoint(&self, name: Option<&str>) -> CheckpointResult<Arc<Checkpoint>> {
        self.checkpoints.get(name)
    }

    /// Named checkpoints, sorted.
    pub fn checkpoint_names(&self) -> Vec<String> {
        self.checkpoints.names()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("tables", &self.table_names())
            .field("stable_ts", &self.stable_timestamp())
            .field("checkpoints", &self.checkpoints.len())
            .finish()
    }
}
