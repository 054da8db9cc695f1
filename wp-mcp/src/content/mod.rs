// Content store module
//
// The content store holds the site's typed items (posts, pages, media, ...).
// It is consulted but not owned by the MCP server, so this module only
// defines the seam plus two backends: an in-memory store and a client for
// the WordPress REST API.

mod memory;
mod rest;

pub use memory::InMemoryContentStore;
pub use rest::RestContentStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::ContentSettings;
use crate::errors::{ContentError, ServerError};

/// Kind of change reported by a content store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Created => write!(f, "created"),
            ChangeAction::Updated => write!(f, "updated"),
            ChangeAction::Deleted => write!(f, "deleted"),
        }
    }
}

/// Binary payload attached to an item (media library entries)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
    /// Public URL of the file
    pub url: String,
    /// Inline bytes, when the backend already holds them
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
}

/// A typed item of the content store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    /// Remaining fields as returned by the backend
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            fields: Map::new(),
            attachment: None,
        }
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Flat JSON view used in tool results and notification payloads
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("id".to_string(), json!(self.id));
        object.insert("title".to_string(), json!(self.title));
        if let Some(attachment) = &self.attachment {
            object.insert("mime_type".to_string(), json!(attachment.mime_type));
            object.insert("size".to_string(), json!(attachment.size));
            object.insert("source_url".to_string(), json!(attachment.url));
        }
        Value::Object(object)
    }
}

/// Callback invoked by a content store after each successful mutation
pub trait ChangeHook: Send + Sync {
    fn on_change(&self, content_type: &str, id: &str, action: ChangeAction, data: &Value);
}

/// Query and mutation interface of the content store
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// One page of items of `content_type`, in the store's stable order
    async fn list(&self, content_type: &str, offset: usize, limit: usize) -> Result<Vec<ContentItem>, ContentError>;

    /// A single item, or `None` when it does not exist
    async fn read(&self, content_type: &str, id: &str) -> Result<Option<ContentItem>, ContentError>;

    async fn create(&self, content_type: &str, fields: Map<String, Value>) -> Result<ContentItem, ContentError>;

    async fn update(&self, content_type: &str, id: &str, fields: Map<String, Value>) -> Result<ContentItem, ContentError>;

    async fn delete(&self, content_type: &str, id: &str) -> Result<ContentItem, ContentError>;

    /// Register a callback for create/update/delete events
    fn add_change_hook(&self, hook: Arc<dyn ChangeHook>);

    /// Bytes of an attachment, fetching them if the item only carries a URL.
    /// `None` when the bytes are unavailable or larger than `max_bytes`; a
    /// backend never reads more than `max_bytes` to decide that.
    async fn attachment_bytes(&self, attachment: &Attachment, max_bytes: u64) -> Result<Option<Vec<u8>>, ContentError> {
        Ok(attachment
            .bytes
            .as_ref()
            .filter(|bytes| bytes.len() as u64 <= max_bytes)
            .cloned())
    }
}

/// Append `chunk` unless the buffer would grow past `max_bytes`
pub fn append_within_limit(buffer: &mut Vec<u8>, chunk: &[u8], max_bytes: u64) -> bool {
    if (buffer.len() + chunk.len()) as u64 > max_bytes {
        return false;
    }
    buffer.extend_from_slice(chunk);
    true
}

/// Create the content store selected in the settings
pub fn create_content_store(settings: &ContentSettings) -> Result<Arc<dyn ContentStore>, ServerError> {
    match settings.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryContentStore::new())),
        "rest" => {
            let store = RestContentStore::new(settings)?;
            Ok(Arc::new(store))
        }
        other => Err(ServerError::Config(format!("Unknown content backend '{}'", other))),
    }
}
