// Events module for the MCP server
//
// This module implements the notification log for resource changes. Entries
// are only recorded for subscribed resource URIs, the log keeps the most
// recent entries up to a fixed capacity, and readers page through it with
// opaque cursors.

mod hook;
mod subscriptions;

pub use hook::NotificationHook;
pub use subscriptions::SubscriptionSet;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Clock;
use crate::content::ChangeAction;
use crate::errors::StoreError;
use crate::protocol::cursor::{self, Position};
use crate::store::{OptionStore, NOTIFICATIONS_KEY, NOTIFICATION_SEQ_KEY};

/// Maximum number of entries kept in the log
pub const MAX_NOTIFICATIONS: usize = 100;
/// Entries returned per listing page
pub const NOTIFICATIONS_PAGE_SIZE: usize = 20;

/// A recorded resource change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEntry {
    /// Sequence number, unique for the lifetime of the log
    pub id: u64,
    pub uri: String,
    pub action: ChangeAction,
    /// RFC3339 time the change was recorded
    pub timestamp: String,
    pub data: Value,
}

/// One page of the notification log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<NotificationEntry>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Bounded, persisted log of resource changes
pub struct NotificationLog {
    store: Arc<dyn OptionStore>,
    subscriptions: Arc<SubscriptionSet>,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
    capacity: usize,
}

impl NotificationLog {
    pub fn new(store: Arc<dyn OptionStore>, subscriptions: Arc<SubscriptionSet>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            subscriptions,
            clock,
            lock: Mutex::new(()),
            capacity: MAX_NOTIFICATIONS,
        }
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionSet> {
        &self.subscriptions
    }

    /// Record a change to `uri` if anyone is subscribed to it.
    ///
    /// Returns whether an entry was appended. Persistence failures are logged
    /// and swallowed so they never fail the mutation that caused the change.
    pub fn store(&self, uri: &str, action: ChangeAction, data: Value) -> bool {
        match self.subscriptions.is_subscribed(uri) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                log::warn!("Failed to read subscriptions for {}: {}", uri, e);
                return false;
            }
        }

        match self.append(uri, action, data) {
            Ok(id) => {
                log::debug!("Recorded notification {} for {} ({})", id, uri, action);
                true
            }
            Err(e) => {
                log::warn!("Failed to record notification for {}: {}", uri, e);
                false
            }
        }
    }

    fn append(&self, uri: &str, action: ChangeAction, data: Value) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;

        let mut entries = self.load()?;
        let id = self.next_sequence()?;
        entries.push_back(NotificationEntry {
            id,
            uri: uri.to_string(),
            action,
            timestamp: self.clock.now().to_rfc3339(),
            data,
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }

        self.store.save(NOTIFICATION_SEQ_KEY, &Value::from(id + 1))?;
        self.save(&entries)?;
        Ok(id)
    }

    /// Up to one page of entries starting at the cursor's position
    pub fn list(&self, cursor: Option<&str>) -> Result<NotificationPage, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let entries = self.load()?;

        let start = cursor::decode_opt(cursor).offset.min(entries.len());
        let end = start.saturating_add(NOTIFICATIONS_PAGE_SIZE).min(entries.len());
        let notifications: Vec<_> = entries.range(start..end).cloned().collect();

        let next_cursor = if end < entries.len() {
            Some(cursor::encode(Position::at(end)))
        } else {
            None
        };

        Ok(NotificationPage {
            notifications,
            next_cursor,
        })
    }

    /// Remove the entries with the given ids; returns how many were removed
    pub fn clear(&self, ids: &[u64]) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|entry| !ids.contains(&entry.id));
        let removed = before - entries.len();
        if removed > 0 {
            self.save(&entries)?;
        }
        Ok(removed)
    }

    /// Empty the log; returns how many entries were removed
    pub fn clear_all(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let removed = self.load()?.len();
        self.store.remove(NOTIFICATIONS_KEY)?;
        Ok(removed)
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Result<Vec<NotificationEntry>, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(self.load()?.into_iter().collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn next_sequence(&self) -> Result<u64, StoreError> {
        Ok(self
            .store
            .load(NOTIFICATION_SEQ_KEY)?
            .and_then(|value| value.as_u64())
            .unwrap_or(1))
    }

    fn load(&self) -> Result<VecDeque<NotificationEntry>, StoreError> {
        match self.store.load(NOTIFICATIONS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(VecDeque::new()),
        }
    }

    fn save(&self, entries: &VecDeque<NotificationEntry>) -> Result<(), StoreError> {
        self.store.save(NOTIFICATIONS_KEY, &serde_json::to_value(entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::MemoryOptionStore;
    use serde_json::json;

    const URI: &str = "wordpress://posts/1";

    fn log() -> NotificationLog {
        let store: Arc<dyn OptionStore> = Arc::new(MemoryOptionStore::new());
        let subscriptions = Arc::new(SubscriptionSet::new(store.clone()));
        NotificationLog::new(store, subscriptions, Arc::new(SystemClock))
    }

    #[test]
    fn test_store_requires_subscription() {
        let log = log();
        assert!(!log.store(URI, ChangeAction::Updated, json!({})));
        assert_eq!(log.len().unwrap(), 0);

        log.subscriptions().subscribe(URI).unwrap();
        assert!(log.store(URI, ChangeAction::Updated, json!({ "title": "x" })));
        assert_eq!(log.len().unwrap(), 1);

        // Other URIs stay gated
        assert!(!log.store("wordpress://posts/2", ChangeAction::Updated, json!({})));
        assert_eq!(log.len().unwrap(), 1);
    }

    #[test]
    fn test_cap_keeps_most_recent_oldest_first() {
        let log = log();
        log.subscriptions().subscribe(URI).unwrap();
        for n in 0..150 {
            assert!(log.store(URI, ChangeAction::Updated, json!({ "n": n })));
        }

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), MAX_NOTIFICATIONS);
        assert_eq!(entries.first().unwrap().data, json!({ "n": 50 }));
        assert_eq!(entries.last().unwrap().data, json!({ "n": 149 }));
        assert!(entries.windows(2).all(|pair| pair[0].id < pair[1].id));
    }

    #[test]
    fn test_list_pages_through_log() {
        let log = log();
        log.subscriptions().subscribe(URI).unwrap();
        for n in 0..45 {
            log.store(URI, ChangeAction::Created, json!({ "n": n }));
        }

        let first = log.list(None).unwrap();
        assert_eq!(first.notifications.len(), NOTIFICATIONS_PAGE_SIZE);
        let second = log.list(first.next_cursor.as_deref()).unwrap();
        assert_eq!(second.notifications[0].data, json!({ "n": 20 }));
        let third = log.list(second.next_cursor.as_deref()).unwrap();
        assert_eq!(third.notifications.len(), 5);
        assert!(third.next_cursor.is_none());
    }

    #[test]
    fn test_exact_page_has_no_next_cursor() {
        let log = log();
        log.subscriptions().subscribe(URI).unwrap();
        for n in 0..NOTIFICATIONS_PAGE_SIZE {
            log.store(URI, ChangeAction::Created, json!({ "n": n }));
        }
        assert!(log.list(None).unwrap().next_cursor.is_none());
    }

    #[test]
    fn test_garbage_cursor_lists_from_start() {
        let log = log();
        log.subscriptions().subscribe(URI).unwrap();
        log.store(URI, ChangeAction::Created, json!({}));

        assert_eq!(log.list(Some("garbage")).unwrap(), log.list(None).unwrap());
    }

    #[test]
    fn test_clear_by_id_keeps_ids_stable() {
        let log = log();
        log.subscriptions().subscribe(URI).unwrap();
        for n in 0..4 {
            log.store(URI, ChangeAction::Updated, json!({ "n": n }));
        }
        let ids: Vec<u64> = log.entries().unwrap().iter().map(|e| e.id).collect();

        assert_eq!(log.clear(&[ids[1], 9999]).unwrap(), 1);
        let remaining: Vec<u64> = log.entries().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2], ids[3]]);

        // New entries never reuse a cleared id
        log.store(URI, ChangeAction::Updated, json!({}));
        assert!(log.entries().unwrap().last().unwrap().id > ids[3]);

        assert_eq!(log.clear_all().unwrap(), 4);
        assert!(log.is_empty().unwrap());
    }

    #[test]
    fn test_concurrent_stores_lose_no_entries() {
        let log = Arc::new(log());
        log.subscriptions().subscribe(URI).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for n in 0..10 {
                        assert!(log.store(URI, ChangeAction::Updated, json!({ "thread": thread, "n": n })));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 80);
        assert!(entries.windows(2).all(|pair| pair[0].id < pair[1].id));

        // Past the cap, concurrent writers still leave exactly the newest entries
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        log.store(URI, ChangeAction::Deleted, json!({}));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), MAX_NOTIFICATIONS);
        assert!(entries.windows(2).all(|pair| pair[0].id < pair[1].id));
        assert_eq!(entries.last().unwrap().id - entries.first().unwrap().id, MAX_NOTIFICATIONS as u64 - 1);
    }
}
