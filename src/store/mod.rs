//! Durable key-value state store.
//!
//! Every stateful component persists its whole logical record (the full topic
//! table, the full fingerprint list, ...) under a single key. Writes replace
//! the serialized value atomically under the store's internal lock, so a
//! concurrent reader never observes a partially written collection.

use crate::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Abstraction over the process-wide durable store.
///
/// `update` runs the whole read-modify-write under the store lock; it is the
/// only safe way to mutate a record that another path may also be writing.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Option<Value>,
    ) -> Result<(), StoreError>;
}

/// Read a typed record. A missing or malformed value yields `None`; malformed
/// state is logged and treated as absent so callers fall back to defaults.
pub fn get_record<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Option<T> {
    let value = store.get(key)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(key, %err, "malformed persisted record, resetting to default");
            None
        }
    }
}

/// Replace a typed record wholesale.
pub fn set_record<T: Serialize>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let serialized = serde_json::to_value(value).map_err(|err| StoreError::Serde {
        key: key.to_string(),
        message: err.to_string(),
    })?;
    store.set(key, serialized)
}

/// Typed read-modify-write of a whole record under the store lock.
///
/// A missing or malformed record enters the closure as `T::default()`.
pub fn update_record<T, F>(store: &dyn StateStore, key: &str, apply: F) -> Result<(), StoreError>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(T) -> T,
{
    let mut apply = Some(apply);
    let mut serde_failure: Option<StoreError> = None;
    store.update(key, &mut |current| {
        let apply = apply.take()?;
        let parsed: T = current
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        match serde_json::to_value(apply(parsed)) {
            Ok(next) => Some(next),
            Err(err) => {
                serde_failure = Some(StoreError::Serde {
                    key: key.to_string(),
                    message: err.to_string(),
                });
                None
            }
        }
    })?;
    match serde_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ─── In-memory store ─────────────────────────────────────────────────────────

/// Volatile store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.records
            .lock()
            .expect("state store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.records
            .lock()
            .expect("state store lock poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Option<Value>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("state store lock poisoned");
        let current = records.get(key).cloned();
        if let Some(next) = apply(current) {
            records.insert(key.to_string(), next);
        }
        Ok(())
    }
}

// ─── JSON file store ─────────────────────────────────────────────────────────

/// File-backed store: a single JSON object at `path`, one member per record
/// key, rewritten wholesale on every set.
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<HashMap<String, Value>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = Self::load(&path);
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    fn load(path: &Path) -> HashMap<String, Value> {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return HashMap::new();
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(err) => {
                warn!(path = %path.display(), %err, "state file unreadable, starting fresh");
                HashMap::new()
            }
        }
    }

    fn persist(&self, records: &HashMap<String, Value>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records).map_err(|err| StoreError::Serde {
            key: "<all>".to_string(),
            message: err.to_string(),
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| StoreError::Write {
                key: "<all>".to_string(),
                message: err.to_string(),
            })?;
        }
        std::fs::write(&self.path, json).map_err(|err| StoreError::Write {
            key: "<all>".to_string(),
            message: err.to_string(),
        })
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.records
            .lock()
            .expect("state store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("state store lock poisoned");
        records.insert(key.to_string(), value);
        self.persist(&records)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Option<Value>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("state store lock poisoned");
        let current = records.get(key).cloned();
        if let Some(next) = apply(current) {
            records.insert(key.to_string(), next);
            self.persist(&records)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
    }

    #[test]
    fn memory_store_round_trips_records() {
        let store = MemoryStore::new();
        set_record(&store, "counter", &Counter { count: 3 }).unwrap();
        let loaded: Counter = get_record(&store, "counter").unwrap();
        assert_eq!(loaded.count, 3);
    }

    #[test]
    fn missing_record_reads_as_none() {
        let store = MemoryStore::new();
        assert!(get_record::<Counter>(&store, "absent").is_none());
    }

    #[test]
    fn malformed_record_resets_to_default_on_update() {
        let store = MemoryStore::new();
        store
            .set("counter", Value::String("not a counter".into()))
            .unwrap();

        update_record(&store, "counter", |counter: Counter| Counter {
            count: counter.count + 1,
        })
        .unwrap();

        let loaded: Counter = get_record(&store, "counter").unwrap();
        assert_eq!(loaded.count, 1);
    }

    #[test]
    fn update_record_applies_read_modify_write() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            update_record(&store, "counter", |counter: Counter| Counter {
                count: counter.count + 1,
            })
            .unwrap();
        }
        let loaded: Counter = get_record(&store, "counter").unwrap();
        assert_eq!(loaded.count, 5);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            set_record(&store, "counter", &Counter { count: 7 }).unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        let loaded: Counter = get_record(&reopened, "counter").unwrap();
        assert_eq!(loaded.count, 7);
    }

    #[test]
    fn file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(get_record::<Counter>(&store, "counter").is_none());
        set_record(&store, "counter", &Counter { count: 1 }).unwrap();
        let loaded: Counter = get_record(&store, "counter").unwrap();
        assert_eq!(loaded.count, 1);
    }
}
