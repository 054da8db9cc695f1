// WordPress REST content store
//
// Talks to `{base_url}/wp-json/wp/v2/{type}` using application-password
// basic auth. Change hooks fire after each successful mutation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{Map, Value};

use super::{append_within_limit, Attachment, ChangeAction, ChangeHook, ContentItem, ContentStore};
use crate::config::ContentSettings;
use crate::errors::{ContentError, ServerError};

const REST_PREFIX: &str = "wp-json/wp/v2";

/// Content store backed by a remote WordPress site
pub struct RestContentStore {
    http_client: Client,
    base_url: String,
    username: Option<String>,
    application_password: Option<String>,
    hooks: RwLock<Vec<Arc<dyn ChangeHook>>>,
}

impl RestContentStore {
    pub fn new(settings: &ContentSettings) -> Result<Self, ServerError> {
        let base_url = settings
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ServerError::Config("content.base_url is required for the rest backend".to_string()))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout))
            .build()
            .map_err(|e| ServerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            application_password: settings.application_password.clone(),
            hooks: RwLock::new(Vec::new()),
        })
    }

    fn url(&self, content_type: &str, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/{}/{}/{}", self.base_url, REST_PREFIX, content_type, id),
            None => format!("{}/{}/{}", self.base_url, REST_PREFIX, content_type),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.username {
            Some(username) => builder.basic_auth(username, self.application_password.as_deref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, ContentError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ContentError::new("content_unavailable", format!("WordPress request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ContentError::new("content_unavailable", format!("Failed to read WordPress response: {}", e)))?;
        parse_response(status, &text)
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
}

/// Decode a response body, mapping error statuses before any JSON parsing
fn parse_response(status: StatusCode, text: &str) -> Result<Value, ContentError> {
    if !status.is_success() {
        let body = serde_json::from_str(text).unwrap_or(Value::Null);
        return Err(error_from_response(status, &body));
    }
    serde_json::from_str(text)
        .map_err(|e| ContentError::new("content_unavailable", format!("Failed to parse WordPress response: {}", e)))
}

/// Translate a WordPress REST error body into a content error
fn error_from_response(status: StatusCode, body: &Value) -> ContentError {
    let rest_code = body.get("code").and_then(Value::as_str).unwrap_or("rest_error");
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("WordPress returned an error")
        .to_string();

    let code = match status {
        StatusCode::NOT_FOUND => "resource_not_found",
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::BAD_REQUEST => "validation_failed",
        StatusCode::TOO_MANY_REQUESTS => "rate_limited",
        _ => rest_code,
    };

    ContentError::new(code, message).with_data(serde_json::json!({
        "status": status.as_u16(),
        "rest_code": rest_code,
    }))
}

/// Build an item from a WordPress REST object
fn item_from_rest(value: Value) -> Result<ContentItem, ContentError> {
    let mut fields = match value {
        Value::Object(fields) => fields,
        _ => return Err(ContentError::new("content_unavailable", "Expected a JSON object from WordPress")),
    };

    let id = match fields.remove("id") {
        Some(Value::Number(id)) => id.to_string(),
        Some(Value::String(id)) => id,
        _ => return Err(ContentError::new("content_unavailable", "WordPress object has no id")),
    };

    let title = fields
        .get("title")
        .and_then(|title| title.get("rendered").or(Some(title)))
        .and_then(Value::as_str)
        .or_else(|| fields.get("name").and_then(Value::as_str))
        .or_else(|| fields.get("slug").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let attachment = match (fields.get("mime_type"), fields.get("source_url")) {
        (Some(Value::String(mime_type)), Some(Value::String(url))) => Some(Attachment {
            mime_type: mime_type.clone(),
            size: fields
                .get("media_details")
                .and_then(|details| details.get("filesize"))
                .and_then(Value::as_u64)
                .unwrap_or(0),
            url: url.clone(),
            bytes: None,
        }),
        _ => None,
    };

    Ok(ContentItem {
        id,
        title,
        fields,
        attachment,
    })
}

#[async_trait]
impl ContentStore for RestContentStore {
    async fn list(&self, content_type: &str, offset: usize, limit: usize) -> Result<Vec<ContentItem>, ContentError> {
        // WordPress caps per_page at 100 and rejects 0
        let per_page = limit.clamp(1, 100);
        let request = self
            .request(Method::GET, &self.url(content_type, None))
            .query(&[("per_page", per_page), ("offset", offset)]);

        match self.send(request).await? {
            Value::Array(items) => items.into_iter().map(item_from_rest).collect(),
            _ => Err(ContentError::new("content_unavailable", "Expected a JSON array from WordPress")),
        }
    }

    async fn read(&self, content_type: &str, id: &str) -> Result<Option<ContentItem>, ContentError> {
        let request = self.request(Method::GET, &self.url(content_type, Some(id)));
        match self.send(request).await {
            Ok(value) => item_from_rest(value).map(Some),
            Err(err) if err.code == "resource_not_found" => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create(&self, content_type: &str, fields: Map<String, Value>) -> Result<ContentItem, ContentError> {
        let request = self
            .request(Method::POST, &self.url(content_type, None))
            .json(&fields);
        let item = item_from_rest(self.send(request).await?)?;
        self.notify(content_type, &item, ChangeAction::Created);
        Ok(item)
    }

    async fn update(&self, content_type: &str, id: &str, fields: Map<String, Value>) -> Result<ContentItem, ContentError> {
        let request = self
            .request(Method::POST, &self.url(content_type, Some(id)))
            .json(&fields);
        let item = item_from_rest(self.send(request).await?)?;
        self.notify(content_type, &item, ChangeAction::Updated);
        Ok(item)
    }

    async fn delete(&self, content_type: &str, id: &str) -> Result<ContentItem, ContentError> {
        let request = self
            .request(Method::DELETE, &self.url(content_type, Some(id)))
            .query(&[("force", "true")]);
        let body = self.send(request).await?;

        // Forced deletes wrap the removed object in `previous`
        let previous = match body {
            Value::Object(mut body) if body.contains_key("previous") => body.remove("previous").unwrap_or(Value::Null),
            other => other,
        };
        let item = item_from_rest(previous)?;
        self.notify(content_type, &item, ChangeAction::Deleted);
        Ok(item)
    }

    fn add_change_hook(&self, hook: Arc<dyn ChangeHook>) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push(hook);
        }
    }

    async fn attachment_bytes(&self, attachment: &Attachment, max_bytes: u64) -> Result<Option<Vec<u8>>, ContentError> {
        if let Some(bytes) = &attachment.bytes {
            return Ok(Some(bytes.clone()).filter(|bytes| bytes.len() as u64 <= max_bytes));
        }

        let mut response = self
            .http_client
            .get(&attachment.url)
            .send()
            .await
            .map_err(|e| ContentError::new("content_unavailable", format!("Failed to fetch attachment: {}", e)))?;

        if !response.status().is_success() {
            return Ok(None);
        }
        if response.content_length().map_or(false, |length| length > max_bytes) {
            return Ok(None);
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ContentError::new("content_unavailable", format!("Failed to read attachment: {}", e)))?
        {
            if !append_within_limit(&mut bytes, &chunk, max_bytes) {
                log::debug!("Attachment {} exceeds {} bytes, not inlining", attachment.url, max_bytes);
                return Ok(None);
            }
        }
        Ok(Some(bytes))
    }
}
