//! CLI command implementations
//!
//! Every command opens the block file read-only, runs one operation and
//! writes a short report to the given writer. Reads in `read` run with the
//! primary handle in verify mode, so a corrupt block is reported and
//! returned as an error instead of aborting the process.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::block::{AddressCookie, BlockBuffer, BlockManager};
use crate::config::EngineConfig;
use crate::observability::{init_tracing, MemorySink};

use super::args::{Cli, Command, CookieAction};
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments, loads configuration, installs logging and dispatches.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    init_tracing(&config.log_filter);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_command(cli.command, &config, &mut out)
}

/// Run the appropriate command, writing its report to `out`
pub fn run_command(cmd: Command, config: &EngineConfig, out: &mut dyn Write) -> CliResult<()> {
    match cmd {
        Command::Cookie { action } => match action {
            CookieAction::Encode {
                object_id,
                offset,
                size,
                checksum,
            } => writeln!(out, "{}", cookie_encode(object_id, offset, size, &checksum)?)?,
            CookieAction::Decode { cookie } => writeln!(out, "{}", cookie_decode(&cookie)?)?,
        },
        Command::Read {
            file,
            cookie,
            object_id,
        } => writeln!(out, "{}", read(config, &file, object_id, &cookie)?)?,
        Command::Dump {
            file,
            cookie,
            object_id,
        } => {
            for line in dump(config, &file, object_id, &cookie)? {
                writeln!(out, "{}", line)?;
            }
        }
        #[cfg(feature = "diagnostic")]
        Command::Probe {
            file,
            offset,
            object_id,
        } => writeln!(out, "{}", probe(config, &file, object_id, offset)?)?,
    }
    Ok(())
}

/// Packs cookie fields into a hex string
pub fn cookie_encode(object_id: u32, offset: i64, size: u32, checksum: &str) -> CliResult<String> {
    let checksum = parse_u32(checksum)?;
    Ok(hex::encode(
        AddressCookie::new(object_id, offset, size, checksum).encode(),
    ))
}

/// Unpacks a hex cookie into a JSON object
pub fn cookie_decode(cookie: &str) -> CliResult<serde_json::Value> {
    let cookie = parse_cookie(cookie)?;
    Ok(json!({
        "object_id": cookie.object_id,
        "offset": cookie.offset,
        "size": cookie.size,
        "checksum": format!("{:#010x}", cookie.checksum),
    }))
}

/// Verified read of the block addressed by `cookie`
pub fn read(config: &EngineConfig, file: &Path, object_id: u32, cookie: &str) -> CliResult<String> {
    let cookie = parse_cookie(cookie)?;
    let manager = BlockManager::open(file, object_id, config)?;
    manager.set_verify(true);

    let mut buf = BlockBuffer::new();
    manager.read_cookie(&config.read_session(), &cookie, &mut buf)?;
    Ok(format!("OK {} ({} bytes)", cookie, buf.len()))
}

/// Hex dump of the block addressed by `cookie`, followed by a status line
pub fn dump(
    config: &EngineConfig,
    file: &Path,
    object_id: u32,
    cookie: &str,
) -> CliResult<Vec<String>> {
    let bytes = decode_hex(cookie)?;
    let sink = Arc::new(MemorySink::new());
    let manager = BlockManager::open(file, object_id, config)?.with_sink(sink.clone());

    let status = match manager.read_corrupt_report(&bytes) {
        Ok(()) => "status: OK".to_string(),
        Err(e) => format!("status: {}", e),
    };
    let mut lines = sink.lines();
    lines.push(status);
    Ok(lines)
}

/// Header fields declared at a raw offset
#[cfg(feature = "diagnostic")]
pub fn probe(config: &EngineConfig, file: &Path, object_id: u32, offset: u64) -> CliResult<String> {
    let manager = BlockManager::open(file, object_id, config)?;
    let (disk_size, checksum) = manager.read_raw_header_probe(object_id, offset)?;
    Ok(format!(
        "offset={} disk_size={} checksum={:#010x}",
        offset, disk_size, checksum
    ))
}

fn decode_hex(s: &str) -> CliResult<Vec<u8>> {
    hex::decode(s.trim())
        .map_err(|e| CliError::invalid_argument(format!("cookie is not valid hex: {}", e)))
}

fn parse_cookie(s: &str) -> CliResult<AddressCookie> {
    Ok(AddressCookie::decode(&decode_hex(s)?)?)
}

fn parse_u32(s: &str) -> CliResult<u32> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| CliError::invalid_argument(format!("not a 32-bit value: {}", s)))
}
