//! CLI argument definitions using clap
//!
//! Commands:
//! - keel-inspect cookie encode --object-id <id> --offset <off> --size <n> --checksum <c>
//! - keel-inspect cookie decode <hex>
//! - keel-inspect read <file> <hex cookie>
//! - keel-inspect dump <file> <hex cookie>
//! - keel-inspect probe <file> --offset <off> (diagnostic builds)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// keel-inspect - Investigate blocks in keelstore block files
#[derive(Parser, Debug)]
#[command(name = "keel-inspect")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to an engine configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode or decode address cookies
    Cookie {
        #[command(subcommand)]
        action: CookieAction,
    },

    /// Read and verify the block addressed by a cookie
    Read {
        /// Block file
        file: PathBuf,
        /// Address cookie, hex encoded
        cookie: String,
        /// Object id of the block file
        #[arg(long, default_value_t = 0)]
        object_id: u32,
    },

    /// Read a block and hex dump it, whether or not it verifies
    Dump {
        /// Block file
        file: PathBuf,
        /// Address cookie, hex encoded
        cookie: String,
        /// Object id of the block file
        #[arg(long, default_value_t = 0)]
        object_id: u32,
    },

    /// Print the header declared at a raw offset, without verification
    #[cfg(feature = "diagnostic")]
    Probe {
        /// Block file
        file: PathBuf,
        /// Byte offset of the block
        #[arg(long)]
        offset: u64,
        /// Object id of the block file
        #[arg(long, default_value_t = 0)]
        object_id: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum CookieAction {
    /// Pack cookie fields into hex
    Encode {
        #[arg(long)]
        object_id: u32,
        #[arg(long, allow_hyphen_values = true)]
        offset: i64,
        #[arg(long)]
        size: u32,
        /// Checksum, decimal or 0x-prefixed hex
        #[arg(long)]
        checksum: String,
    },

    /// Unpack a hex cookie
    Decode {
        cookie: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
