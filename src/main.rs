//! keel-inspect entry point
//!
//! Parses arguments and dispatches through `cli::run`, printing any error to
//! stderr and exiting non-zero on failure. All logic lives in the CLI module.

use keelstore::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
