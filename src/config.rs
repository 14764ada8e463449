//! Engine configuration
//!
//! JSON file, every field optional:
//!
//! ```json
//! {
//!   "allocation_unit_size": 4096,
//!   "chunk_cache": { "enabled": true, "capacity_bytes": 67108864 },
//!   "multi_handle": false,
//!   "quiet_corrupt": false,
//!   "log_filter": "info"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::{ReadSession, MIN_ALLOCATION_UNIT};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Chunk cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCacheConfig {
    /// Whether reads consult the chunk cache (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Cache capacity in bytes (default: 64MB)
    #[serde(default = "default_chunk_cache_capacity")]
    pub capacity_bytes: u64,
}

impl Default for ChunkCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity_bytes: default_chunk_cache_capacity(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Allocation unit of block stores (default: 4096)
    #[serde(default = "default_allocation_unit_size")]
    pub allocation_unit_size: u32,

    #[serde(default)]
    pub chunk_cache: ChunkCacheConfig,

    /// Resolve a block store per object id (default: false)
    #[serde(default)]
    pub multi_handle: bool,

    /// Default quiet-corruption mode for read sessions (default: false)
    #[serde(default)]
    pub quiet_corrupt: bool,

    /// Log filter directive (default: "info")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_allocation_unit_size() -> u32 {
    4096
}

fn default_chunk_cache_capacity() -> u64 {
    64 * 1024 * 1024
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allocation_unit_size: default_allocation_unit_size(),
            chunk_cache: ChunkCacheConfig::default(),
            multi_handle: false,
            quiet_corrupt: false,
            log_filter: default_log_filter(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.allocation_unit_size < MIN_ALLOCATION_UNIT
            || !self.allocation_unit_size.is_power_of_two()
        {
            return Err(ConfigError::Invalid(format!(
                "allocation_unit_size must be a power of two >= {}, got {}",
                MIN_ALLOCATION_UNIT, self.allocation_unit_size
            )));
        }
        if self.chunk_cache.enabled && self.chunk_cache.capacity_bytes == 0 {
            return Err(ConfigError::Invalid(
                "chunk_cache.capacity_bytes must be > 0 when the cache is enabled".to_string(),
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter must not be empty".to_string()));
        }
        Ok(())
    }

    /// Read session carrying the configured quiet-corruption default
    pub fn read_session(&self) -> ReadSession {
        ReadSession::new().with_quiet_corrupt(self.quiet_corrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.allocation_unit_size, 4096);
        assert!(!config.chunk_cache.enabled);
        assert_eq!(config.chunk_cache.capacity_bytes, 64 * 1024 * 1024);
        assert!(!config.multi_handle);
        assert!(!config.quiet_corrupt);
        assert_eq!(config.log_filter, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json(
            r#"{"allocation_unit_size": 512, "chunk_cache": {"enabled": true}, "quiet_corrupt": true}"#,
        )
        .unwrap();
        assert_eq!(config.allocation_unit_size, 512);
        assert!(config.chunk_cache.enabled);
        assert_eq!(config.chunk_cache.capacity_bytes, 64 * 1024 * 1024);
        assert!(config.read_session().is_quiet_corrupt());
    }

    #[test]
    fn test_rejects_bad_allocation_unit() {
        for unit in [0, 256, 1000, 3000] {
            let json = format!(r#"{{"allocation_unit_size": {}}}"#, unit);
            assert!(matches!(
                EngineConfig::from_json(&json),
                Err(ConfigError::Invalid(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_capacity_when_enabled() {
        let err = EngineConfig::from_json(
            r#"{"chunk_cache": {"enabled": true, "capacity_bytes": 0}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("capacity_bytes"));

        // Disabled cache ignores capacity
        EngineConfig::from_json(r#"{"chunk_cache": {"capacity_bytes": 0}}"#).unwrap();
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"multi_handle": true, "log_filter": "debug"}}"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert!(config.multi_handle);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/keel.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
