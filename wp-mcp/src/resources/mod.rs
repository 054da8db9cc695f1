// Resources module for the MCP server
//
// Canonical resource URIs (`{scheme}://{type}/{id}`), paginated listing of
// every allow-listed content type, and reading a single resource as a
// mime-typed payload.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::json;

use crate::config::ResourceSettings;
use crate::content::{ContentItem, ContentStore};
use crate::errors::McpError;
use crate::protocol::cursor::{self, Position};

/// Descriptors returned per listing page
pub const RESOURCES_PAGE_SIZE: usize = 20;

const JSON_MIME: &str = "application/json";

/// Parsed resource URI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUri {
    pub scheme: String,
    pub content_type: String,
    pub id: String,
}

impl ResourceUri {
    pub fn new(scheme: &str, content_type: &str, id: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            content_type: content_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Split a URI into its parts without checking scheme or type policy
    pub fn parse(uri: &str) -> Result<Self, McpError> {
        let invalid = || McpError::InvalidParams(format!("Malformed resource URI '{}'", uri));

        let (scheme, rest) = uri.split_once("://").ok_or_else(invalid)?;
        let (content_type, id) = rest.split_once('/').ok_or_else(invalid)?;

        let valid_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme || content_type.is_empty() || id.is_empty() || id.contains('/') {
            return Err(invalid());
        }

        Ok(Self::new(scheme, content_type, id))
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.content_type, self.id)
    }
}

/// Listing entry for a single resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// One page of the resource listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourcePage {
    pub resources: Vec<ResourceDescriptor>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Payload of a read resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceContents {
    Text {
        uri: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        text: String,
    },
    Blob {
        uri: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Base64-encoded bytes
        blob: String,
    },
}

/// Resource view over the content store
pub struct ResourceCatalog {
    content: Arc<dyn ContentStore>,
    scheme: String,
    types: Vec<String>,
    inline_limit: u64,
}

impl ResourceCatalog {
    pub fn new(content: Arc<dyn ContentStore>, settings: &ResourceSettings) -> Self {
        Self {
            content,
            scheme: settings.scheme.clone(),
            types: settings.types.clone(),
            inline_limit: settings.inline_media_limit,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Allow-listed content types in listing order
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn is_allowed(&self, content_type: &str) -> bool {
        self.types.iter().any(|t| t == content_type)
    }

    /// Parse a URI and check it against the configured scheme and allow-list
    pub fn parse_uri(&self, uri: &str) -> Result<ResourceUri, McpError> {
        let parsed = ResourceUri::parse(uri)?;
        if parsed.scheme != self.scheme {
            return Err(McpError::InvalidParams(format!(
                "Unsupported URI scheme '{}', expected '{}'",
                parsed.scheme, self.scheme
            )));
        }
        if !self.is_allowed(&parsed.content_type) {
            return Err(McpError::Forbidden(format!(
                "Resource type '{}' is not exposed",
                parsed.content_type
            )));
        }
        Ok(parsed)
    }

    pub fn uri_for(&self, content_type: &str, id: &str) -> ResourceUri {
        ResourceUri::new(&self.scheme, content_type, id)
    }

    /// One page of descriptors across every allow-listed type.
    ///
    /// Types are walked in order and each page is filled across type
    /// boundaries; the cursor records the type index and the offset in it.
    pub async fn list(&self, cursor: Option<&str>) -> Result<ResourcePage, McpError> {
        let mut position = cursor::decode_opt(cursor);
        if position.segment >= self.types.len() {
            position = Position::START;
        }

        let mut resources = Vec::with_capacity(RESOURCES_PAGE_SIZE);
        while resources.len() < RESOURCES_PAGE_SIZE && position.segment < self.types.len() {
            let content_type = &self.types[position.segment];
            let wanted = RESOURCES_PAGE_SIZE - resources.len();

            let items = self.content.list(content_type, position.offset, wanted).await?;
            let got = items.len();
            resources.extend(items.iter().map(|item| self.descriptor(content_type, item)));

            position = if got < wanted {
                Position::in_segment(position.segment + 1, 0)
            } else {
                Position::in_segment(position.segment, position.offset + got)
            };
        }

        let next_cursor = if position.segment < self.types.len() {
            Some(cursor::encode(position))
        } else {
            None
        };

        Ok(ResourcePage {
            resources,
            next_cursor,
        })
    }

    /// Read one resource as a mime-typed payload
    pub async fn read(&self, uri: &str) -> Result<ResourceContents, McpError> {
        let parsed = self.parse_uri(uri)?;
        let item = self
            .content
            .read(&parsed.content_type, &parsed.id)
            .await?
            .ok_or_else(|| McpError::ResourceNotFound(uri.to_string()))?;

        let uri = parsed.to_string();
        let attachment = match &item.attachment {
            Some(attachment) => attachment,
            None => {
                return Ok(ResourceContents::Text {
                    uri,
                    mime_type: JSON_MIME.to_string(),
                    text: to_pretty(&item.to_json())?,
                })
            }
        };

        // A reported size of 0 means unknown; the fetch itself is bounded
        if attachment.size <= self.inline_limit {
            if let Some(bytes) = self.content.attachment_bytes(attachment, self.inline_limit).await? {
                return Ok(ResourceContents::Blob {
                    uri,
                    mime_type: attachment.mime_type.clone(),
                    blob: STANDARD.encode(bytes),
                });
            }
        }

        // Too large to inline: describe the file instead
        let metadata = json!({
            "id": item.id,
            "title": item.title,
            "mimeType": attachment.mime_type,
            "size": attachment.size,
            "url": attachment.url,
            "inline": false,
        });
        Ok(ResourceContents::Text {
            uri,
            mime_type: JSON_MIME.to_string(),
            text: to_pretty(&metadata)?,
        })
    }

    fn descriptor(&self, content_type: &str, item: &ContentItem) -> ResourceDescriptor {
        let name = if item.title.trim().is_empty() {
            format!("{} #{}", content_type, item.id)
        } else {
            item.title.clone()
        };

        ResourceDescriptor {
            uri: self.uri_for(content_type, &item.id).to_string(),
            name,
            description: format!("Item {} of type {}", item.id, content_type),
            mime_type: item
                .attachment
                .as_ref()
                .map(|a| a.mime_type.clone())
                .unwrap_or_else(|| JSON_MIME.to_string()),
        }
    }
}

fn to_pretty(value: &serde_json::Value) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|e| McpError::internal(format!("Failed to render resource: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{append_within_limit, Attachment, ContentStore, InMemoryContentStore};
    use crate::errors::ContentError;
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(types: &[&str], inline_media_limit: u64) -> ResourceSettings {
        ResourceSettings {
            scheme: "wordpress".to_string(),
            types: types.iter().map(|t| t.to_string()).collect(),
            inline_media_limit,
        }
    }

    #[test]
    fn test_parse_uri() {
        let uri = ResourceUri::parse("wordpress://posts/12").unwrap();
        assert_eq!(uri.content_type, "posts");
        assert_eq!(uri.id, "12");
        assert_eq!(uri.to_string(), "wordpress://posts/12");

        for bad in ["", "posts/12", "wordpress://posts", "wordpress://posts/", "wordpress:///12", "://posts/1", "wordpress://posts/1/2"] {
            assert!(matches!(ResourceUri::parse(bad), Err(McpError::InvalidParams(_))), "{}", bad);
        }
    }

    #[test]
    fn test_catalog_enforces_scheme_and_allow_list() {
        let catalog = ResourceCatalog::new(Arc::new(InMemoryContentStore::new()), &settings(&["posts"], 1024));
        assert!(catalog.parse_uri("wordpress://posts/1").is_ok());
        assert!(matches!(catalog.parse_uri("other://posts/1"), Err(McpError::InvalidParams(_))));
        assert!(matches!(catalog.parse_uri("wordpress://users/1"), Err(McpError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_list_fills_pages_across_types() {
        let store = Arc::new(InMemoryContentStore::new());
        for n in 0..15 {
            store.insert("posts", &format!("Post {}", n), Map::new());
        }
        for n in 0..10 {
            store.insert("pages", &format!("Page {}", n), Map::new());
        }
        let catalog = ResourceCatalog::new(store, &settings(&["posts", "pages", "tags"], 1024));

        let first = catalog.list(None).await.unwrap();
        assert_eq!(first.resources.len(), RESOURCES_PAGE_SIZE);
        assert_eq!(first.resources[14].name, "Post 14");
        assert_eq!(first.resources[15].name, "Page 0");

        let second = catalog.list(first.next_cursor.as_deref()).await.unwrap();
        let names: Vec<_> = second.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Page 5", "Page 6", "Page 7", "Page 8", "Page 9"]);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_invalid_cursor_lists_first_page() {
        let store = Arc::new(InMemoryContentStore::new());
        for n in 0..30 {
            store.insert("posts", &format!("Post {}", n), Map::new());
        }
        let catalog = ResourceCatalog::new(store, &settings(&["posts"], 1024));

        let fresh = catalog.list(None).await.unwrap();
        assert_eq!(catalog.list(Some("definitely-not-a-cursor")).await.unwrap(), fresh);

        let out_of_range = cursor::encode(Position::in_segment(7, 3));
        assert_eq!(catalog.list(Some(&out_of_range)).await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_read_structured_item() {
        let store = Arc::new(InMemoryContentStore::new());
        let id = store.insert("posts", "Hello", Map::new());
        let catalog = ResourceCatalog::new(store, &settings(&["posts"], 1024));

        match catalog.read(&format!("wordpress://posts/{}", id)).await.unwrap() {
            ResourceContents::Text { mime_type, text, .. } => {
                assert_eq!(mime_type, "application/json");
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["title"], "Hello");
            }
            other => panic!("unexpected contents {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_media_inline_and_metadata_only() {
        let store = Arc::new(InMemoryContentStore::new());
        let small = store.insert_media("Icon", "image/png", vec![1, 2, 3]);
        let large = store.insert_media("Video", "video/mp4", vec![0; 64]);
        let catalog = ResourceCatalog::new(store, &settings(&["media"], 16));

        match catalog.read(&format!("wordpress://media/{}", small)).await.unwrap() {
            ResourceContents::Blob { mime_type, blob, .. } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(STANDARD.decode(blob).unwrap(), vec![1, 2, 3]);
            }
            other => panic!("expected inline blob, got {:?}", other),
        }

        match catalog.read(&format!("wordpress://media/{}", large)).await.unwrap() {
            ResourceContents::Text { text, .. } => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["size"], 64);
                assert_eq!(value["inline"], false);
            }
            other => panic!("expected metadata, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_missing_item() {
        let catalog = ResourceCatalog::new(Arc::new(InMemoryContentStore::new()), &settings(&["posts"], 1024));
        assert!(matches!(
            catalog.read("wordpress://posts/999999").await,
            Err(McpError::ResourceNotFound(_))
        ));
    }

    /// Media whose size the backend does not report, served in chunks
    struct UnsizedMediaStore {
        payload_len: usize,
        fetched: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ContentStore for UnsizedMediaStore {
        async fn list(&self, _: &str, _: usize, _: usize) -> Result<Vec<ContentItem>, ContentError> {
            Ok(Vec::new())
        }

        async fn read(&self, _: &str, id: &str) -> Result<Option<ContentItem>, ContentError> {
            let attachment = Attachment {
                mime_type: "video/mp4".to_string(),
                size: 0,
                url: "https://example.invalid/uploads/video.mp4".to_string(),
                bytes: None,
            };
            Ok(Some(ContentItem::new(id.to_string(), "Video").with_attachment(attachment)))
        }

        async fn create(&self, _: &str, _: Map<String, serde_json::Value>) -> Result<ContentItem, ContentError> {
            Err(ContentError::new("validation_failed", "read only"))
        }

        async fn update(&self, _: &str, _: &str, _: Map<String, serde_json::Value>) -> Result<ContentItem, ContentError> {
            Err(ContentError::new("validation_failed", "read only"))
        }

        async fn delete(&self, _: &str, _: &str) -> Result<ContentItem, ContentError> {
            Err(ContentError::new("validation_failed", "read only"))
        }

        fn add_change_hook(&self, _: Arc<dyn crate::content::ChangeHook>) {}

        async fn attachment_bytes(&self, _: &Attachment, max_bytes: u64) -> Result<Option<Vec<u8>>, ContentError> {
            let chunk = [0u8; 256];
            let mut bytes = Vec::new();
            let mut remaining = self.payload_len;
            while remaining > 0 {
                self.fetched.fetch_add(chunk.len(), Ordering::SeqCst);
                if !append_within_limit(&mut bytes, &chunk, max_bytes) {
                    return Ok(None);
                }
                remaining = remaining.saturating_sub(chunk.len());
            }
            Ok(Some(bytes))
        }
    }

    #[tokio::test]
    async fn test_unknown_size_media_fetch_is_bounded() {
        let store = Arc::new(UnsizedMediaStore {
            payload_len: 50 * 1024 * 1024,
            fetched: AtomicUsize::new(0),
        });
        let catalog = ResourceCatalog::new(store.clone(), &settings(&["media"], 1024));

        match catalog.read("wordpress://media/9").await.unwrap() {
            ResourceContents::Text { text, .. } => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["inline"], false);
            }
            other => panic!("expected metadata, got {:?}", other),
        }
        assert!(store.fetched.load(Ordering::SeqCst) <= 1024 + 256);
    }
}
