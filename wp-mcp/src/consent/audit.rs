// Consent audit log
//
// Records every consent-gated call that was allowed through. The log is
// informational only and never consulted for authorization.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::store::{OptionStore, CONSENT_LOG_KEY};

/// Maximum number of consent entries kept
pub const MAX_CONSENT_ENTRIES: usize = 1000;

/// A single approved consent-gated call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentLogEntry {
    pub tool: String,
    pub arguments: Map<String, Value>,
    pub user_id: String,
    pub session_id: String,
    /// RFC3339 time of the call
    pub timestamp: String,
    pub ip: String,
}

/// Capped, persisted audit trail of consented calls
pub struct ConsentLog {
    store: Arc<dyn OptionStore>,
    lock: Mutex<()>,
    capacity: usize,
}

impl ConsentLog {
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Self::with_capacity(store, MAX_CONSENT_ENTRIES)
    }

    pub fn with_capacity(store: Arc<dyn OptionStore>, capacity: usize) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest ones beyond capacity
    pub fn record(&self, entry: ConsentLogEntry) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;

        let mut entries = self.load()?;
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        self.store.save(CONSENT_LOG_KEY, &serde_json::to_value(&entries)?)
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Result<Vec<ConsentLogEntry>, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(self.load()?.into_iter().collect())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        self.store.remove(CONSENT_LOG_KEY)
    }

    fn load(&self) -> Result<VecDeque<ConsentLogEntry>, StoreError> {
        match self.store.load(CONSENT_LOG_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(VecDeque::new()),
        }
    }
}
