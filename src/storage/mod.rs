//! Keyed persistent store.
//!
//! [`KeyedStore`] is the single JSON get/set surface the rest of the crate
//! persists through. The bytes themselves live in a [`StorageMedium`]:
//! an in-memory map, a directory of JSON files, or a SQLite key-value table.
//!
//! Reads never fail from the caller's point of view: a missing key or a
//! malformed value yields the caller's fallback. Writes report failure as a
//! [`StoreError`] so the autosave layer can decide on retries.

pub mod files;
pub mod memory;
pub mod sqlite;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

pub use files::FileMedium;
pub use memory::MemoryMedium;
pub use sqlite::SqliteMedium;

/// Persistence keys for the entity collections
pub mod keys {
    pub const TASKS: &str = "tasks";
    pub const PROJECTS: &str = "projects";
    pub const POMODORO_SETTINGS: &str = "pomodoro-settings";
    pub const POMODORO_TIMER: &str = "pomodoro-timer";
    pub const DAILY_LOGS: &str = "daily-logs";
    pub const GAMIFICATION: &str = "adhd-gamification";
}

#[derive(Debug, Error)]
pub enum MediumError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Value for '{key}' cannot be serialized: {source}")]
    Unserializable {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write '{key}': {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: MediumError,
    },
}

/// Raw string key-value substrate underneath a [`KeyedStore`]
pub trait StorageMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError>;
    fn set(&self, key: &str, value: &str) -> Result<(), MediumError>;
    fn remove(&self, key: &str) -> Result<(), MediumError>;
    fn keys(&self) -> Result<Vec<String>, MediumError>;
}

pub struct KeyedStore {
    medium: Box<dyn StorageMedium>,
}

impl KeyedStore {
    pub fn new(medium: impl StorageMedium + 'static) -> Self {
        Self {
            medium: Box::new(medium),
        }
    }

    /// Decode the value under `key`, or return `fallback` when it is missing,
    /// unreadable or malformed
    pub fn read<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let Some(raw) = self.read_raw(key) else {
            return fallback;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Malformed persisted value, using fallback");
                fallback
            }
        }
    }

    /// Raw JSON under `key`; medium errors are logged and read as missing
    pub fn read_raw(&self, key: &str) -> Option<String> {
        match self.medium.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted value");
                None
            }
        }
    }

    /// Serialize and persist `value`
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = Self::to_json(key, value)?;
        self.write_raw(key, &json)
    }

    /// Persist an already-encoded JSON document
    pub fn write_raw(&self, key: &str, json: &str) -> Result<(), StoreError> {
        self.medium
            .set(key, json)
            .map_err(|source| StoreError::WriteFailed {
                key: key.to_string(),
                source,
            })?;
        debug!(key, bytes = json.len(), "Persisted value");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.medium
            .remove(key)
            .map_err(|source| StoreError::WriteFailed {
                key: key.to_string(),
                source,
            })
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.medium.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(prefix)).collect(),
            Err(e) => {
                warn!(prefix, error = %e, "Failed to list persisted keys");
                Vec::new()
            }
        }
    }

    /// Encode `value` as JSON without touching the medium.
    ///
    /// Goes through `serde_json::Value` first so anything that is not plain
    /// JSON data (non-string map keys, failing `Serialize` impls) is rejected
    /// here rather than half-written.
    pub fn to_json<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String, StoreError> {
        let unserializable = |source| StoreError::Unserializable {
            key: key.to_string(),
            source,
        };
        let value = serde_json::to_value(value).map_err(unserializable)?;
        serde_json::to_string(&value).map_err(unserializable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, Task};
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    #[test]
    fn test_read_missing_key_returns_fallback() {
        let store = KeyedStore::new(MemoryMedium::new());
        let tasks: Vec<Task> = store.read(keys::TASKS, Vec::new());
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_read_malformed_json_returns_fallback() {
        let medium = MemoryMedium::new();
        medium.set(keys::TASKS, "{not json").unwrap();
        let store = KeyedStore::new(medium);

        let tasks: Vec<Task> = store.read(keys::TASKS, Vec::new());
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let store = KeyedStore::new(MemoryMedium::new());
        let mut task = Task::new("Buy milk".to_string());
        task.priority = Priority::A;
        task.description = Some("2 litres".to_string());
        let tasks = vec![task];

        store.write(keys::TASKS, &tasks).unwrap();
        let back: Vec<Task> = store.read(keys::TASKS, Vec::new());
        assert_eq!(back, tasks);
    }

    #[test]
    fn test_write_failure_is_a_status_not_a_panic() {
        let medium = MemoryMedium::new();
        medium.set_fail_writes(true);
        let store = KeyedStore::new(medium);

        let result = store.write(keys::TASKS, &vec![1, 2, 3]);
        assert_matches!(result, Err(StoreError::WriteFailed { .. }));
    }

    #[test]
    fn test_non_json_value_is_rejected_before_the_medium() {
        let medium = MemoryMedium::new();
        let store = KeyedStore::new(medium.clone());
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);

        let result = store.write("bad", &bad);
        assert_matches!(result, Err(StoreError::Unserializable { .. }));
        assert_eq!(medium.write_count(), 0);
        assert!(store.read_raw("bad").is_none());
    }

    #[test]
    fn test_keys_with_prefix() {
        let store = KeyedStore::new(MemoryMedium::new());
        store.write_raw("fallback:tasks", "[]").unwrap();
        store.write_raw("fallback:projects", "[]").unwrap();
        store.write_raw("tasks", "[]").unwrap();

        let mut keys = store.keys_with_prefix("fallback:");
        keys.sort();
        assert_eq!(keys, vec!["fallback:projects", "fallback:tasks"]);
    }
}
