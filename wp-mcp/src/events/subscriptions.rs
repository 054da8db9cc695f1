// Subscription set
//
// Resource URIs somebody asked to hear about. Only subscribed URIs produce
// notification entries.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::errors::StoreError;
use crate::store::{OptionStore, SUBSCRIPTIONS_KEY};

pub struct SubscriptionSet {
    store: Arc<dyn OptionStore>,
    lock: Mutex<()>,
}

impl SubscriptionSet {
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Subscribe to `uri`; returns `true` if it was not subscribed before
    pub fn subscribe(&self, uri: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let mut uris = self.load()?;
        if !uris.insert(uri.to_string()) {
            return Ok(false);
        }
        self.save(&uris)?;
        Ok(true)
    }

    /// Unsubscribe from `uri`; returns `true` if it was subscribed
    pub fn unsubscribe(&self, uri: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let mut uris = self.load()?;
        if !uris.remove(uri) {
            return Ok(false);
        }
        self.save(&uris)?;
        Ok(true)
    }

    pub fn is_subscribed(&self, uri: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(self.load()?.contains(uri))
    }

    /// Subscribed URIs in lexical order
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(self.load()?.into_iter().collect())
    }

    fn load(&self) -> Result<BTreeSet<String>, StoreError> {
        match self.store.load(SUBSCRIPTIONS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeSet::new()),
        }
    }

    fn save(&self, uris: &BTreeSet<String>) -> Result<(), StoreError> {
        self.store.save(SUBSCRIPTIONS_KEY, &serde_json::to_value(uris)?)
    }
}
