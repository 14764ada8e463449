//! Multi-version concurrency control
//!
//! Tables keep, per key, a chain of versions written by transactions. Every
//! read names a view and sees, for each key, the newest version that view
//! admits.
//!
//! This module provides:
//! - `Timestamp`, `CommitSeq`, `TxnId` - logical time and identities
//! - `DataValue` - ordered key and value type
//! - `VersionRecord` / `KeyChain` - per-key version history
//! - `ReadView` / `Visibility` - which version a reader sees
//! - `CommitAuthority` - commit ordering and the stable timestamp
//! - `Transaction` - prepare, commit and rollback with timestamp rules
//! - `Table` / `Database` - the user-facing surface
//!
//! # Invariants
//!
//! - Committed versions are immutable
//! - A transaction's versions become visible together, at commit
//! - A reader never sees a partially committed transaction
//! - Commit sequences are unique and ordered by visibility

mod commit_authority;
mod database;
mod errors;
mod table;
mod timestamp;
mod transaction;
mod value;
mod version;
mod version_chain;
mod visibility;

pub use commit_authority::CommitAuthority;
pub use database::Database;
pub use errors::{MvccError, MvccResult};
pub use table::Table;
pub use timestamp::{CommitSeq, Timestamp, TxnId};
pub use transaction::Transaction;
pub use value::DataValue;
pub use version::{TxnState, TxnStatus, VersionPayload, VersionRecord};
pub use version_chain::{KeyChain, VersionIter, VersionNode};
pub use visibility::{ReadView, Visibility};
