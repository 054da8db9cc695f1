// Resource tools
//
// Listing, reading and (un)subscribing to resources addressed by
// `{scheme}://{type}/{id}` URIs.

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::errors::McpError;
use crate::events::NotificationLog;
use crate::protocol::{optional_str, required_str};
use crate::resources::ResourceCatalog;
use crate::tools::{Tool, ToolContext, ToolDefinition, ToolName, ToolParameter, ToolRegistry, ToolResult};

fn uri_parameter() -> ToolParameter {
    ToolParameter::new("uri", "string", true, "Resource URI, e.g. wordpress://posts/12")
}

fn tags() -> Vec<String> {
    vec!["resources".to_string()]
}

/// Paginated resource listing
pub struct ListResourcesTool {
    catalog: Arc<ResourceCatalog>,
}

#[async_trait]
impl Tool for ListResourcesTool {
    fn name(&self) -> ToolName {
        ToolName::ResourcesList
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "List resources across all exposed content types".to_string(),
            parameters: vec![ToolParameter::new(
                "cursor",
                "string",
                false,
                "Opaque cursor from a previous page",
            )],
            return_type: "object".to_string(),
            tags: tags(),
        }
    }

    async fn execute(&self, params: Map<String, Value>, _context: ToolContext) -> ToolResult {
        let page = self.catalog.list(optional_str(&params, "cursor")?).await?;
        serde_json::to_value(page).map_err(|e| McpError::internal(e.to_string()))
    }
}

/// Single resource read
pub struct ReadResourceTool {
    catalog: Arc<ResourceCatalog>,
}

#[async_trait]
impl Tool for ReadResourceTool {
    fn name(&self) -> ToolName {
        ToolName::ResourcesRead
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Read a resource as JSON text or an inline base64 blob".to_string(),
            parameters: vec![uri_parameter()],
            return_type: "object".to_string(),
            tags: tags(),
        }
    }

    async fn execute(&self, params: Map<String, Value>, _context: ToolContext) -> ToolResult {
        let contents = self.catalog.read(required_str(&params, "uri")?).await?;
        Ok(json!({ "contents": [contents] }))
    }
}

/// Subscribe to change notifications for a resource
pub struct SubscribeTool {
    catalog: Arc<ResourceCatalog>,
    notifications: Arc<NotificationLog>,
}

#[async_trait]
impl Tool for SubscribeTool {
    fn name(&self) -> ToolName {
        ToolName::ResourcesSubscribe
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Record changes to a resource in the notification log".to_string(),
            parameters: vec![uri_parameter()],
            return_type: "object".to_string(),
            tags: tags(),
        }
    }

    async fn execute(&self, params: Map<String, Value>, context: ToolContext) -> ToolResult {
        let uri = self.catalog.parse_uri(required_str(&params, "uri")?)?.to_string();
        if self.notifications.subscriptions().subscribe(&uri)? {
            log::info!("{} subscribed to {}", context.user_id, uri);
        }
        Ok(json!({ "uri": uri, "subscribed": true }))
    }
}

/// Stop change notifications for a resource
pub struct UnsubscribeTool {
    catalog: Arc<ResourceCatalog>,
    notifications: Arc<NotificationLog>,
}

#[async_trait]
impl Tool for UnsubscribeTool {
    fn name(&self) -> ToolName {
        ToolName::ResourcesUnsubscribe
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Stop recording changes to a resource".to_string(),
            parameters: vec![uri_parameter()],
            return_type: "object".to_string(),
            tags: tags(),
        }
    }

    async fn execute(&self, params: Map<String, Value>, context: ToolContext) -> ToolResult {
        let uri = self.catalog.parse_uri(required_str(&params, "uri")?)?.to_string();
        if self.notifications.subscriptions().unsubscribe(&uri)? {
            log::info!("{} unsubscribed from {}", context.user_id, uri);
        }
        Ok(json!({ "uri": uri, "subscribed": false }))
    }
}

/// Register resource tools with the registry
pub fn register_tools(
    registry: &ToolRegistry,
    catalog: Arc<ResourceCatalog>,
    notifications: Arc<NotificationLog>,
) -> Result<(), McpError> {
    registry.register_tool(Arc::new(ListResourcesTool { catalog: catalog.clone() }))?;
    registry.register_tool(Arc::new(ReadResourceTool { catalog: catalog.clone() }))?;
    registry.register_tool(Arc::new(SubscribeTool {
        catalog: catalog.clone(),
        notifications: notifications.clone(),
    }))?;
    registry.register_tool(Arc::new(UnsubscribeTool { catalog, notifications }))?;
    Ok(())
}
