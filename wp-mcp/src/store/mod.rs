// Option store module
//
// Persisted key/value state shared across calls: the notification log, the
// consent log and the subscription set. Backends only load and save whole
// values; callers serialize their read-modify-write sequences themselves.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::errors::StoreError;

/// Key used for the notification log
pub const NOTIFICATIONS_KEY: &str = "mcp_notifications";
/// Key used for the next notification sequence number
pub const NOTIFICATION_SEQ_KEY: &str = "mcp_notification_seq";
/// Key used for the consent audit log
pub const CONSENT_LOG_KEY: &str = "mcp_consent_log";
/// Key used for the subscription set
pub const SUBSCRIPTIONS_KEY: &str = "mcp_subscriptions";

/// Persisted key/value store
pub trait OptionStore: Send + Sync {
    /// Load the value stored under `key`
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value stored under `key`
    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Remove the value stored under `key`
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Volatile store, used by tests and when no state file is configured
#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionStore for MemoryOptionStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self
            .values
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        values.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON document on disk.
///
/// The whole document is rewritten on every save.
#[derive(Debug)]
pub struct FileOptionStore {
    path: PathBuf,
    values: RwLock<HashMap<String, Value>>,
}

impl FileOptionStore {
    /// Open the store at `path`, creating an empty one if the file is missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)?,
            Ok(_) => HashMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    fn flush(&self, values: &HashMap<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write-then-rename keeps the document whole
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl OptionStore for FileOptionStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self
            .values
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        values.insert(key.to_string(), value.clone());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

/// Create the option store described by an optional state file path
pub fn create_store(path: Option<&str>) -> Result<Arc<dyn OptionStore>, StoreError> {
    match path {
        Some(path) => Ok(Arc::new(FileOptionStore::open(path)?)),
        None => Ok(Arc::new(MemoryOptionStore::new())),
    }
}
