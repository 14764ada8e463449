//! Checkpoint registry
//!
//! Holds every named checkpoint plus the most recent unnamed one. Creating
//! a checkpoint under an existing name replaces it; creating an unnamed
//! checkpoint replaces the previous unnamed one. Readers holding an `Arc`
//! to a replaced checkpoint keep reading it unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::errors::{CheckpointError, CheckpointResult};
use super::Checkpoint;

#[derive(Default)]
struct Registry {
    named: HashMap<String, Arc<Checkpoint>>,
    unnamed: Option<Arc<Checkpoint>>,
}

/// Named and unnamed checkpoints of one database.
#[derive(Default)]
pub struct CheckpointManager {
    registry: RwLock<Registry>,
}

impl CheckpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names are non-empty and use only ASCII letters, digits, `_`, `-` and `.`.
    pub fn validate_name(name: &str) -> CheckpointResult<()> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if valid {
            Ok(())
        } else {
            Err(CheckpointError::InvalidName(name.to_string()))
        }
    }

    /// Adds `checkpoint`, replacing any checkpoint with the same name.
    pub(crate) fn register(&self, checkpoint: Checkpoint) -> Arc<Checkpoint> {
        let checkpoint = Arc::new(checkpoint);
        let mut registry = self.registry.write();
        match checkpoint.name() {
            Some(name) => {
                registry
                    .named
                    .insert(name.to_string(), Arc::clone(&checkpoint));
            }
            None => registry.unnamed = Some(Arc::clone(&checkpoint)),
        }
        checkpoint
    }

    /// The checkpoint called `name`, or the latest unnamed checkpoint.
    pub fn get(&self, name: Option<&str>) -> CheckpointResult<Arc<Checkpoint>> {
        let registry = self.registry.read();
        let found = match name {
            Some(name) => registry.named.get(name).cloned(),
            None => registry.unnamed.clone(),
        };
        found.ok_or_else(|| CheckpointError::NotFound(name.unwrap_or("(unnamed)").to_string()))
    }

    /// Named checkpoints, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().named.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of checkpoints held, the unnamed one included.
    pub fn len(&self) -> usize {
        let registry = self.registry.read();
        registry.named.len() + usize::from(registry.unnamed.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::{CommitSeq, Timestamp};

    fn checkpoint(name: Option<&str>, stable: u64) -> Checkpoint {
        Checkpoint::new(
            name.map(str::to_string),
            Timestamp::new(stable),
            CommitSeq::ZERO,
            HashMap::new(),
        )
    }

    #[test]
    fn test_validate_name() {
        CheckpointManager::validate_name("ckpt1").unwrap();
        CheckpointManager::validate_name("nightly-2026.02_04").unwrap();
        for bad in ["", "has space", "a/b", "comma,name"] {
            assert!(matches!(
                CheckpointManager::validate_name(bad),
                Err(CheckpointError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_same_name_replaces() {
        let manager = CheckpointManager::new();
        let old = manager.register(checkpoint(Some("c"), 10));
        manager.register(checkpoint(Some("c"), 20));

        assert_eq!(manager.get(Some("c")).unwrap().stable_timestamp(), Timestamp::new(20));
        assert_eq!(old.stable_timestamp(), Timestamp::new(10));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_unnamed_is_latest() {
        let manager = CheckpointManager::new();
        assert!(matches!(manager.get(None), Err(CheckpointError::NotFound(_))));
        manager.register(checkpoint(None, 1));
        manager.register(checkpoint(None, 2));
        assert_eq!(manager.get(None).unwrap().stable_timestamp(), Timestamp::new(2));
        assert!(manager.names().is_empty());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let manager = CheckpointManager::new();
        assert!(manager.is_empty());
        manager.register(checkpoint(Some("b"), 1));
        manager.register(checkpoint(Some("a"), 1));
        manager.register(checkpoint(None, 1));
        assert_eq!(manager.names(), vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(
            manager.get(Some("missing")),
            Err(CheckpointError::NotFound(name)) if name == "missing"
        ));
    }
}
