// In-memory content store
//
// Keeps items per content type in id order and fires change hooks after each
// mutation. Used by the default binary and throughout the tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Attachment, ChangeAction, ChangeHook, ContentItem, ContentStore};
use crate::errors::ContentError;

#[derive(Default)]
pub struct InMemoryContentStore {
    items: RwLock<HashMap<String, BTreeMap<u64, ContentItem>>>,
    next_id: AtomicU64,
    hooks: RwLock<Vec<Arc<dyn ChangeHook>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Default::default()
        }
    }

    /// Seed an item without firing change hooks; returns its id
    pub fn insert(&self, content_type: &str, title: &str, fields: Map<String, Value>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let item = ContentItem {
            id: id.to_string(),
            title: title.to_string(),
            fields,
            attachment: None,
        };
        self.put(content_type, id, item);
        id.to_string()
    }

    /// Seed a media item with inline bytes; returns its id
    pub fn insert_media(&self, title: &str, mime_type: &str, bytes: Vec<u8>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let attachment = Attachment {
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
            url: format!("https://example.invalid/uploads/{}", id),
            bytes: Some(bytes),
        };
        let item = ContentItem::new(id.to_string(), title).with_attachment(attachment);
        self.put("media", id, item);
        id.to_string()
    }

    fn put(&self, content_type: &str, id: u64, item: ContentItem) {
        if let Ok(mut items) = self.items.write() {
            items.entry(content_type.to_string()).or_default().insert(id, item);
        }
    }

    fn notify(&self, content_type: &str, item: &ContentItem, action: ChangeAction) {
        let hooks = match self.hooks.read() {
            Ok(hooks) => hooks.clone(),
            Err(_) => return,
        };
        let data = item.to_json();
        for hook in hooks {
            hook.on_change(content_type, &item.id, action, &data);
        }
    }

    fn parse_id(id: &str) -> Option<u64> {
        id.parse().ok()
    }

    fn lock_error() -> ContentError {
        ContentError::new("internal_error", "Content store lock poisoned")
    }
}

fn title_from(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("title").or_else(|| fields.get("name")) {
        Some(Value::String(title)) => Some(title.clone()),
        Some(Value::Object(rendered)) => rendered.get("raw").or_else(|| rendered.get("rendered")).and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn list(&self, content_type: &str, offset: usize, limit: usize) -> Result<Vec<ContentItem>, ContentError> {
        let items = self.items.read().map_err(|_| Self::lock_error())?;
        Ok(items
            .get(content_type)
            .map(|items| items.values().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn read(&self, content_type: &str, id: &str) -> Result<Option<ContentItem>, ContentError> {
        let id = match Self::parse_id(id) {
            Some(id) => id,
            None => return Ok(None),
        };
        let items = self.items.read().map_err(|_| Self::lock_error())?;
        Ok(items.get(content_type).and_then(|items| items.get(&id)).cloned())
    }

    async fn create(&self, content_type: &str, mut fields: Map<String, Value>) -> Result<ContentItem, ContentError> {
        let title = title_from(&fields).ok_or_else(|| {
            ContentError::new("validation_failed", "A non-empty 'title' is required")
                .with_data(serde_json::json!({ "field": "title" }))
        })?;
        fields.remove("title");
        fields.remove("id");

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let item = ContentItem {
            id: id.to_string(),
            title,
            fields,
            attachment: None,
        };
        {
            let mut items = self.items.write().map_err(|_| Self::lock_error())?;
            items.entry(content_type.to_string()).or_default().insert(id, item.clone());
        }

        self.notify(content_type, &item, ChangeAction::Created);
        Ok(item)
    }

    async fn update(&self, content_type: &str, id: &str, mut fields: Map<String, Value>) -> Result<ContentItem, ContentError> {
        let key = Self::parse_id(id)
            .ok_or_else(|| ContentError::not_found(format!("No {} item with id {}", content_type, id)))?;

        let item = {
            let mut items = self.items.write().map_err(|_| Self::lock_error())?;
            let item = items
                .get_mut(content_type)
                .and_then(|items| items.get_mut(&key))
                .ok_or_else(|| ContentError::not_found(format!("No {} item with id {}", content_type, id)))?;

            if let Some(title) = title_from(&fields) {
                item.title = title;
            }
            fields.remove("title");
            fields.remove("id");
            item.fields.extend(fields);
            item.clone()
        };

        self.notify(content_type, &item, ChangeAction::Updated);
        Ok(item)
    }

    async fn delete(&self, content_type: &str, id: &str) -> Result<ContentItem, ContentError> {
        let key = Self::parse_id(id)
            .ok_or_else(|| ContentError::not_found(format!("No {} item with id {}", content_type, id)))?;

        let item = {
            let mut items = self.items.write().map_err(|_| Self::lock_error())?;
            items
                .get_mut(content_type)
                .and_then(|items| items.remove(&key))
                .ok_or_else(|| ContentError::not_found(format!("No {} item with id {}", content_type, id)))?
        };

        self.notify(content_type, &item, ChangeAction::Deleted);
        Ok(item)
    }

    fn add_change_hook(&self, hook: Arc<dyn ChangeHook>) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push(hook);
        }
    }
}
