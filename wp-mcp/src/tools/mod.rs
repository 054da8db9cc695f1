// Tools module for the MCP server
//
// This module implements the tool registration and execution system
// for the MCP server. The set of tools is closed: every wire name maps to a
// `ToolName` variant and unknown names are rejected at the boundary.

pub mod completion;
pub mod endpoints;
pub mod notifications;
pub mod prompts;
pub mod resources;
mod registry;

pub use registry::{Tool, ToolDefinition, ToolParameter, ToolRegistry, ToolResult};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::content::ContentStore;
use crate::errors::McpError;
use crate::events::NotificationLog;
use crate::resources::ResourceCatalog;

/// ToolContext holds contextual information for tool execution
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// User ID of the requester
    pub user_id: String,
    /// Request ID for tracking
    pub request_id: String,
    /// Caller-supplied session identifier
    pub session_id: Option<String>,
    /// Peer address of the caller
    pub ip: Option<String>,
}

impl ToolContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Key used for rate limiting: peer address, then user. The session id is
    /// caller-chosen and never part of the key.
    pub fn caller_key(&self) -> &str {
        self.ip.as_deref().unwrap_or(&self.user_id)
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            request_id: Uuid::new_v4().to_string(),
            session_id: None,
            ip: None,
        }
    }
}

/// Every tool the server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolName {
    WpDiscoverEndpoints,
    WpCallEndpoint,
    ResourcesList,
    ResourcesRead,
    ResourcesSubscribe,
    ResourcesUnsubscribe,
    NotificationsList,
    NotificationsClear,
    PromptsList,
    PromptsGet,
    CompletionComplete,
}

impl ToolName {
    pub const ALL: [ToolName; 11] = [
        ToolName::WpDiscoverEndpoints,
        ToolName::WpCallEndpoint,
        ToolName::ResourcesList,
        ToolName::ResourcesRead,
        ToolName::ResourcesSubscribe,
        ToolName::ResourcesUnsubscribe,
        ToolName::NotificationsList,
        ToolName::NotificationsClear,
        ToolName::PromptsList,
        ToolName::PromptsGet,
        ToolName::CompletionComplete,
    ];

    /// Wire name of the tool
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::WpDiscoverEndpoints => "wp_discover_endpoints",
            ToolName::WpCallEndpoint => "wp_call_endpoint",
            ToolName::ResourcesList => "resources/list",
            ToolName::ResourcesRead => "resources/read",
            ToolName::ResourcesSubscribe => "resources/subscribe",
            ToolName::ResourcesUnsubscribe => "resources/unsubscribe",
            ToolName::NotificationsList => "notifications/list",
            ToolName::NotificationsClear => "notifications/clear",
            ToolName::PromptsList => "prompts/list",
            ToolName::PromptsGet => "prompts/get",
            ToolName::CompletionComplete => "completion/complete",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = McpError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .iter()
            .copied()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| McpError::MethodNotFound(name.to_string()))
    }
}

/// Initialize the tool registry
pub fn init_registry(
    content: Arc<dyn ContentStore>,
    catalog: Arc<ResourceCatalog>,
    notifications: Arc<NotificationLog>,
) -> Result<Arc<ToolRegistry>, McpError> {
    let registry = ToolRegistry::new();

    // Register generic endpoint tools
    endpoints::register_tools(&registry, content, catalog.types())?;

    // Register resource tools
    resources::register_tools(&registry, catalog.clone(), notifications.clone())?;

    // Register notification tools
    notifications::register_tools(&registry, notifications)?;

    // Register prompt and completion tools
    prompts::register_tools(&registry)?;
    completion::register_tools(&registry, catalog)?;

    Ok(Arc::new(registry))
}
