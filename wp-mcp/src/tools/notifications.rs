// Notification tools
//
// Paging through and clearing the resource change notification log.

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::errors::McpError;
use crate::events::NotificationLog;
use crate::protocol::optional_str;
use crate::tools::{Tool, ToolContext, ToolDefinition, ToolName, ToolParameter, ToolRegistry, ToolResult};

/// Notification log listing
pub struct ListNotificationsTool {
    log: Arc<NotificationLog>,
}

#[async_trait]
impl Tool for ListNotificationsTool {
    fn name(&self) -> ToolName {
        ToolName::NotificationsList
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "List recorded changes to subscribed resources, oldest first".to_string(),
            parameters: vec![ToolParameter::new(
                "cursor",
                "string",
                false,
                "Opaque cursor from a previous page",
            )],
            return_type: "object".to_string(),
            tags: vec!["notifications".to_string()],
        }
    }

    async fn execute(&self, params: Map<String, Value>, _context: ToolContext) -> ToolResult {
        let page = self.log.list(optional_str(&params, "cursor")?)?;
        serde_json::to_value(page).map_err(|e| McpError::internal(e.to_string()))
    }
}

/// Notification log clearing
pub struct ClearNotificationsTool {
    log: Arc<NotificationLog>,
}

#[async_trait]
impl Tool for ClearNotificationsTool {
    fn name(&self) -> ToolName {
        ToolName::NotificationsClear
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Remove notifications by id, or all of them. Requires user consent".to_string(),
            parameters: vec![ToolParameter::new(
                "ids",
                "array",
                false,
                "Notification ids to remove; omit to clear the whole log",
            )],
            return_type: "object".to_string(),
            tags: vec!["notifications".to_string()],
        }
    }

    async fn execute(&self, params: Map<String, Value>, context: ToolContext) -> ToolResult {
        let cleared = match params.get("ids") {
            None | Some(Value::Null) => self.log.clear_all()?,
            Some(Value::Array(ids)) => {
                let ids = ids
                    .iter()
                    .map(|id| {
                        id.as_u64().ok_or_else(|| {
                            McpError::InvalidParams(format!("Notification id {} is not a sequence number", id))
                        })
                    })
                    .collect::<Result<Vec<u64>, McpError>>()?;
                self.log.clear(&ids)?
            }
            Some(_) => return Err(McpError::InvalidParams("Argument 'ids' must be an array".to_string())),
        };

        log::info!("{} cleared {} notification(s)", context.user_id, cleared);
        Ok(json!({ "cleared": cleared }))
    }
}

/// Register notification tools with the registry
pub fn register_tools(registry: &ToolRegistry, log: Arc<NotificationLog>) -> Result<(), McpError> {
    registry.register_tool(Arc::new(ListNotificationsTool { log: log.clone() }))?;
    registry.register_tool(Arc::new(ClearNotificationsTool { log }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::content::ChangeAction;
    use crate::events::SubscriptionSet;
    use crate::store::{MemoryOptionStore, OptionStore};

    fn log_with(count: usize) -> Arc<NotificationLog> {
        let store: Arc<dyn OptionStore> = Arc::new(MemoryOptionStore::new());
        let subscriptions = Arc::new(SubscriptionSet::new(store.clone()));
        let log = Arc::new(NotificationLog::new(store, subscriptions, Arc::new(SystemClock)));
        log.subscriptions().subscribe("wordpress://posts/1").unwrap();
        for n in 0..count {
            log.store("wordpress://posts/1", ChangeAction::Updated, json!({ "n": n }));
        }
        log
    }

    #[tokio::test]
    async fn test_list_returns_page_and_cursor() {
        let tool = ListNotificationsTool { log: log_with(25) };
        let result = tool.execute(Map::new(), ToolContext::default()).await.unwrap();
        assert_eq!(result["notifications"].as_array().unwrap().len(), 20);
        assert!(result["nextCursor"].is_string());
    }

    #[tokio::test]
    async fn test_clear_selected_and_all() {
        let log = log_with(3);
        let tool = ClearNotificationsTool { log: log.clone() };
        let first = log.entries().unwrap()[0].id;

        let params = json!({ "ids": [first] }).as_object().cloned().unwrap();
        let result = tool.execute(params, ToolContext::default()).await.unwrap();
        assert_eq!(result["cleared"], 1);

        let result = tool.execute(Map::new(), ToolContext::default()).await.unwrap();
        assert_eq!(result["cleared"], 2);
        assert!(log.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_clear_rejects_bad_ids() {
        let tool = ClearNotificationsTool { log: log_with(1) };
        let params = json!({ "ids": ["abc"] }).as_object().cloned().unwrap();
        assert!(matches!(
            tool.execute(params, ToolContext::default()).await,
            Err(McpError::InvalidParams(_))
        ));
    }
}
