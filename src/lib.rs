//! keelstore - checksum-verified block storage and a multi-version
//! checkpoint engine
//!
//! - `block`: address cookies, block layout, chunk cache and the verified
//!   read path with corruption handling
//! - `mvcc`: tables, transactions and timestamp-based visibility
//! - `checkpoint`: immutable point-in-time views over every table
//! - `observability`: logging setup, diagnostic sink and metrics
//! - `config`: engine configuration
//! - `cli`: the `keel-inspect` tool

pub mod block;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod mvcc;
pub mod observability;
