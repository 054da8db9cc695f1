use super::*;
use std::sync::Arc;

use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::{json, Map};

use crate::clock::ManualClock;
use crate::config::Settings;
use crate::content::{ContentStore, InMemoryContentStore};
use crate::errors::codes;
use crate::store::MemoryOptionStore;
use crate::McpServer;

struct Harness {
    server: McpServer,
    content: Arc<InMemoryContentStore>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    fn with_settings(mut settings: Settings) -> Self {
        settings.consent.secret = "dispatcher-test-secret".to_string();
        let content = Arc::new(InMemoryContentStore::new());
        let clock = Arc::new(ManualClock::default());
        let server = McpServer::with_parts(
            Arc::new(settings),
            content.clone(),
            Arc::new(MemoryOptionStore::new()),
            clock.clone(),
        )
        .unwrap();
        Self { server, content, clock }
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Response {
        self.server
            .dispatcher
            .handle(
                json!({ "kind": "invoke", "name": name, "arguments": arguments }),
                ToolContext::new("tester").with_session("session-1"),
            )
            .await
    }
}

#[tokio::test]
async fn test_discover_endpoints_returns_descriptors() {
    let harness = Harness::new();
    let response = harness.invoke("wp_discover_endpoints", json!({})).await;

    let endpoints = response.data().unwrap()["endpoints"].as_array().unwrap().clone();
    assert!(!endpoints.is_empty());
    for endpoint in endpoints {
        assert!(!endpoint["path"].as_str().unwrap().is_empty());
        assert!(!endpoint["methods"].as_array().unwrap().is_empty());
        assert!(!endpoint["namespace"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_mutation_requires_consent_then_succeeds_with_token() {
    let harness = Harness::new();
    let arguments = json!({
        "endpoint": "/wp/v2/posts",
        "method": "POST",
        "params": { "title": "Hello from an agent" }
    });

    let response = harness.invoke("wp_call_endpoint", arguments.clone()).await;
    assert_eq!(response.error_code(), Some(codes::CONSENT_REQUIRED));
    let data = response.error().unwrap().data.clone().unwrap();
    assert_eq!(data["description"], "Create a new item at /wp/v2/posts (POST request)");
    let token = data["token"].as_str().unwrap().to_string();

    // Nothing was created while consent was pending
    assert!(harness.content.list("posts", 0, 10).await.unwrap().is_empty());

    harness.clock.advance(Duration::seconds(299));
    let mut approved = arguments.clone();
    approved["consent_token"] = json!(token);
    let response = harness.invoke("wp_call_endpoint", approved.clone()).await;
    assert!(response.is_success(), "{:?}", response);
    assert_eq!(response.data().unwrap()["title"], "Hello from an agent");
    assert!(response.data().unwrap().get("consent_token").is_none());

    // The approval is recorded without the token
    let entries = harness.server.consent_log.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].user_id, "tester");
    assert_eq!(entries[0].session_id, "session-1");
    assert!(!entries[0].arguments.contains_key("consent_token"));

    // A consumed token cannot be replayed
    let response = harness.invoke("wp_call_endpoint", approved).await;
    assert_eq!(response.error_code(), Some(codes::CONSENT_REQUIRED));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let harness = Harness::new();
    let arguments = json!({ "endpoint": "/wp/v2/posts/1", "method": "DELETE" });

    let response = harness.invoke("wp_call_endpoint", arguments.clone()).await;
    let token = response.error().unwrap().data.as_ref().unwrap()["token"].clone();

    harness.clock.advance(Duration::seconds(301));
    let mut approved = arguments;
    approved["consent_token"] = token;
    let response = harness.invoke("wp_call_endpoint", approved).await;
    assert_eq!(response.error_code(), Some(codes::CONSENT_REQUIRED));
}

#[tokio::test]
async fn test_reads_skip_consent() {
    let harness = Harness::new();
    let id = harness.content.insert("posts", "Readable", Map::new());

    let response = harness
        .invoke("wp_call_endpoint", json!({ "endpoint": format!("/wp/v2/posts/{}", id) }))
        .await;
    assert!(response.is_success());
    assert!(harness.server.consent_log.entries().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_cursor_lists_first_page() {
    let harness = Harness::new();
    for n in 0..25 {
        harness.content.insert("posts", &format!("Post {}", n), Map::new());
    }

    let fresh = harness.invoke("resources/list", json!({})).await;
    let garbage = harness.invoke("resources/list", json!({ "cursor": "%%%not-a-cursor" })).await;
    assert!(fresh.is_success());
    assert_eq!(garbage, fresh);
    assert_eq!(fresh.data().unwrap()["resources"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_read_missing_resource() {
    let harness = Harness::new();
    let response = harness
        .invoke("resources/read", json!({ "uri": "wordpress://posts/999999" }))
        .await;
    assert_eq!(response.error_code(), Some(codes::RESOURCE_NOT_FOUND));
}

#[tokio::test]
async fn test_subscribed_changes_reach_notifications() {
    let harness = Harness::new();
    let id = harness.content.insert("posts", "Watched", Map::new());
    let uri = format!("wordpress://posts/{}", id);

    assert!(harness.invoke("resources/subscribe", json!({ "uri": uri })).await.is_success());

    let arguments = json!({
        "endpoint": format!("/wp/v2/posts/{}", id),
        "method": "PATCH",
        "params": { "status": "publish" }
    });
    let pending = harness.invoke("wp_call_endpoint", arguments.clone()).await;
    let mut approved = arguments;
    approved["consent_token"] = pending.error().unwrap().data.as_ref().unwrap()["token"].clone();
    assert!(harness.invoke("wp_call_endpoint", approved).await.is_success());

    let listed = harness.invoke("notifications/list", json!({})).await;
    let notifications = listed.data().unwrap()["notifications"].as_array().unwrap().clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["uri"], json!(uri));
    assert_eq!(notifications[0]["action"], "updated");

    // Clearing is consent gated as well
    let cleared = harness.invoke("notifications/clear", json!({})).await;
    assert_eq!(cleared.error_code(), Some(codes::CONSENT_REQUIRED));
    let token = cleared.error().unwrap().data.as_ref().unwrap()["token"].clone();
    let cleared = harness.invoke("notifications/clear", json!({ "consent_token": token })).await;
    assert_eq!(cleared.data().unwrap()["cleared"], 1);
}

#[tokio::test]
async fn test_consent_can_be_disabled() {
    let mut settings = Settings::default();
    settings.consent.enabled = false;
    let harness = Harness::with_settings(settings);

    let response = harness
        .invoke(
            "wp_call_endpoint",
            json!({ "endpoint": "/wp/v2/pages", "method": "POST", "params": { "title": "About" } }),
        )
        .await;
    assert!(response.is_success());
}

#[tokio::test]
async fn test_protocol_errors() {
    let harness = Harness::new();
    let dispatcher = &harness.server.dispatcher;

    let response = dispatcher.handle_str("{not json", ToolContext::default()).await;
    assert_eq!(response.error_code(), Some(codes::PARSE_ERROR));

    let response = dispatcher.handle(json!({ "kind": "invoke" }), ToolContext::default()).await;
    assert_eq!(response.error_code(), Some(codes::INVALID_REQUEST));

    let response = harness.invoke("wp_drop_tables", json!({})).await;
    assert_eq!(response.error_code(), Some(codes::METHOD_NOT_FOUND));

    let response = harness.invoke("resources/read", json!({})).await;
    assert_eq!(response.error_code(), Some(codes::INVALID_PARAMS));

    let response = harness.invoke("resources/read", json!({ "uri": "wordpress://users-secret/1" })).await;
    assert_eq!(response.error_code(), Some(codes::FORBIDDEN));
}

#[tokio::test]
async fn test_describe_lists_every_tool() {
    let harness = Harness::new();
    let response = harness
        .server
        .dispatcher
        .handle(json!({ "kind": "describe" }), ToolContext::default())
        .await;

    let data = response.data().unwrap();
    assert_eq!(data["protocolVersion"], crate::MCP_VERSION);
    let names: Vec<&str> = data["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), ToolName::ALL.len());
    assert!(names.contains(&"completion/complete"));

    // Consent flags follow the policy table
    for tool in data["tools"].as_array().unwrap() {
        let name = tool["name"].as_str().unwrap();
        let gated = name == "wp_call_endpoint" || name == "notifications/clear";
        assert_eq!(tool["requires_consent"], json!(gated), "{}", name);
    }
}

#[tokio::test]
async fn test_rate_limit() {
    let mut settings = Settings::default();
    settings.server.rate_limit_per_minute = 2;
    let harness = Harness::with_settings(settings);

    assert!(harness.invoke("prompts/list", json!({})).await.is_success());
    assert!(harness.invoke("prompts/list", json!({})).await.is_success());
    let limited = harness.invoke("prompts/list", json!({})).await;
    assert_eq!(limited.error_code(), Some(codes::RATE_LIMITED));
    assert_eq!(limited.error().unwrap().data, Some(json!({ "retry_after": 60 })));

    harness.clock.advance(Duration::seconds(60));
    assert!(harness.invoke("prompts/list", json!({})).await.is_success());
}

#[tokio::test]
async fn test_rate_limit_ignores_rotating_session_ids() {
    let mut settings = Settings::default();
    settings.server.rate_limit_per_minute = 2;
    let harness = Harness::with_settings(settings);

    let mut allowed = 0;
    for n in 0..10 {
        let context = ToolContext::new("tester")
            .with_session(format!("session-{}", n))
            .with_ip("10.0.0.1");
        let response = harness
            .server
            .dispatcher
            .handle(json!({ "kind": "invoke", "name": "prompts/list" }), context)
            .await;
        if response.is_success() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 2);
}
