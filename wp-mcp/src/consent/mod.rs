// Consent module for the MCP server
//
// This module decides which tool calls need a human's approval and issues
// and verifies the short-lived signed tokens that carry that approval.

pub mod audit;
mod token;

pub use audit::{ConsentLog, ConsentLogEntry, MAX_CONSENT_ENTRIES};
pub use token::ConsentToken;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ConsentSettings;
use crate::errors::McpError;

/// Maximum age for a consent token in seconds
pub const DEFAULT_WINDOW_SECS: i64 = 300; // 5 minutes

/// Consent requirement of a single tool
#[derive(Debug, Clone, Copy)]
enum ConsentRule {
    Always,
    /// Only for the listed (upper-case) HTTP methods
    Methods(&'static [&'static str]),
}

static POLICY: Lazy<HashMap<&'static str, ConsentRule>> = Lazy::new(|| {
    let mut policy = HashMap::new();
    policy.insert(
        "wp_call_endpoint",
        ConsentRule::Methods(&["POST", "PUT", "PATCH", "DELETE"]),
    );
    policy.insert("notifications/clear", ConsentRule::Always);
    policy
});

/// Whether any call of `tool` can be consent gated
pub fn may_require_consent(tool: &str) -> bool {
    POLICY.contains_key(tool)
}

/// Descriptor handed to a human approver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRequest {
    pub tool: String,
    pub arguments: Map<String, Value>,
    pub description: String,
    /// Fresh token to send back as `consent_token` once approved
    pub token: String,
    /// Seconds the token stays valid
    pub expires_in: i64,
}

/// Issues and verifies consent tokens
pub struct ConsentManager {
    enabled: bool,
    secret: Vec<u8>,
    window: Duration,
    single_use: bool,
    clock: Arc<dyn Clock>,
    /// Nonces issued and not yet consumed, with their issue time
    pending: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ConsentManager {
    pub fn new(settings: &ConsentSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: settings.enabled,
            secret: settings.secret.as_bytes().to_vec(),
            window: Duration::seconds(settings.window_secs),
            single_use: settings.single_use,
            clock,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether calling `tool` with `method` needs a valid consent token
    pub fn is_required(&self, tool: &str, method: Option<&str>) -> bool {
        if !self.enabled {
            return false;
        }

        match POLICY.get(tool) {
            Some(ConsentRule::Always) => true,
            Some(ConsentRule::Methods(methods)) => {
                let method = method.unwrap_or("GET").to_ascii_uppercase();
                methods.contains(&method.as_str())
            }
            None => false,
        }
    }

    /// Issue a signed token for `tool`
    pub fn issue(&self, tool: &str) -> Result<String, McpError> {
        let now = self.clock.now();
        let nonce = Uuid::new_v4().simple().to_string();

        let token = ConsentToken::sign(&self.secret, tool, &now.to_rfc3339(), &nonce)
            .map_err(|e| McpError::internal(format!("Failed to sign consent token: {}", e)))?;

        if self.single_use {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| McpError::internal("Consent nonce registry unavailable"))?;
            let window = self.window;
            pending.retain(|_, issued| now - *issued <= window);
            pending.insert(nonce, now);
        }

        Ok(token.encode())
    }

    /// Check a token presented for `tool`.
    ///
    /// Never fails: anything short of a valid, fresh, correctly signed token
    /// for this tool yields `false`. A valid single-use token is consumed.
    pub fn verify(&self, tool: &str, token: &str) -> bool {
        let token = match ConsentToken::decode(token) {
            Some(token) => token,
            None => return false,
        };

        if token.tool != tool {
            return false;
        }

        let issued = match DateTime::parse_from_rfc3339(&token.timestamp) {
            Ok(issued) => issued.with_timezone(&Utc),
            Err(_) => return false,
        };

        let age = self.clock.now() - issued;
        if age > self.window || age < -self.window {
            return false;
        }

        if !token.signature_matches(&self.secret) {
            return false;
        }

        if self.single_use {
            return match self.pending.lock() {
                Ok(mut pending) => pending.remove(&token.nonce).is_some(),
                Err(_) => false,
            };
        }

        true
    }

    /// Describe a pending call for an approver and attach a fresh token
    pub fn describe_request(&self, tool: &str, arguments: &Map<String, Value>) -> Result<ConsentRequest, McpError> {
        Ok(ConsentRequest {
            tool: tool.to_string(),
            arguments: arguments.clone(),
            description: describe_call(tool, arguments),
            token: self.issue(tool)?,
            expires_in: self.window.num_seconds(),
        })
    }
}

fn describe_call(tool: &str, arguments: &Map<String, Value>) -> String {
    match tool {
        "wp_call_endpoint" => {
            let endpoint = arguments
                .get("endpoint")
                .and_then(Value::as_str)
                .unwrap_or("<unknown endpoint>");
            let method = arguments
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or("GET")
                .to_ascii_uppercase();
            let action = match method.as_str() {
                "POST" if endpoint_has_id(endpoint) => "Update the item at",
                "POST" => "Create a new item at",
                "PUT" | "PATCH" => "Update the item at",
                "DELETE" => "Delete the item at",
                _ => "Call",
            };
            format!("{} {} ({} request)", action, endpoint, method)
        }
        "notifications/clear" => match arguments.get("ids").and_then(Value::as_array) {
            Some(ids) => format!("Clear {} notification(s)", ids.len()),
            None => "Clear all notifications".to_string(),
        },
        other => format!("Run tool '{}'", other),
    }
}

fn endpoint_has_id(endpoint: &str) -> bool {
    endpoint
        .trim_matches('/')
        .rsplit('/')
        .next()
        .map(|last| !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
