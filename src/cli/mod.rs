//! CLI module for keel-inspect
//!
//! Provides a command-line interface for:
//! - cookie: Encode and decode address cookies
//! - read: Verified read of one block
//! - dump: Hex dump of one block, corrupt or not
//! - probe: Raw header probe (diagnostic builds)

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command, CookieAction};
pub use commands::{cookie_decode, cookie_encode, dump, read, run, run_command};
#[cfg(feature = "diagnostic")]
pub use commands::probe;
pub use errors::{CliError, CliErrorCode, CliResult};
