// Completion tool
//
// Suggests values for prompt arguments and resource URIs by prefix.

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::errors::McpError;
use crate::protocol::required_str;
use crate::resources::ResourceCatalog;
use crate::tools::prompts::find_prompt;
use crate::tools::{Tool, ToolContext, ToolDefinition, ToolName, ToolParameter, ToolRegistry, ToolResult};

/// Most values returned by one completion
pub const MAX_COMPLETION_VALUES: usize = 100;

pub struct CompleteTool {
    catalog: Arc<ResourceCatalog>,
}

impl CompleteTool {
    pub fn new(catalog: Arc<ResourceCatalog>) -> Self {
        Self { catalog }
    }

    fn resource_candidates(&self) -> Vec<String> {
        let types = self.catalog.types();
        let mut candidates: Vec<String> = types.to_vec();
        candidates.extend(types.iter().map(|t| format!("{}://{}/", self.catalog.scheme(), t)));
        candidates
    }
}

fn object_param<'a>(params: &'a Map<String, Value>, name: &str) -> Result<&'a Map<String, Value>, McpError> {
    match params.get(name) {
        Some(Value::Object(object)) => Ok(object),
        None | Some(Value::Null) => Err(McpError::MissingArgument(name.to_string())),
        Some(_) => Err(McpError::InvalidParams(format!("Argument '{}' must be an object", name))),
    }
}

#[async_trait]
impl Tool for CompleteTool {
    fn name(&self) -> ToolName {
        ToolName::CompletionComplete
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Suggest values for a prompt argument or resource URI".to_string(),
            parameters: vec![
                ToolParameter::new("ref", "object", true, "{ type: ref/prompt, name } or { type: ref/resource, uri }"),
                ToolParameter::new("argument", "object", true, "{ name, value } being completed"),
            ],
            return_type: "object".to_string(),
            tags: vec!["completion".to_string()],
        }
    }

    async fn execute(&self, params: Map<String, Value>, _context: ToolContext) -> ToolResult {
        let reference = object_param(&params, "ref")?;
        let argument = object_param(&params, "argument")?;
        let argument_name = required_str(argument, "name")?;
        let prefix = argument.get("value").and_then(Value::as_str).unwrap_or("").to_ascii_lowercase();

        let candidates: Vec<String> = match required_str(reference, "type")? {
            "ref/prompt" => {
                let name = required_str(reference, "name")?;
                let prompt = find_prompt(name)
                    .ok_or_else(|| McpError::InvalidParams(format!("Unknown prompt '{}'", name)))?;
                let argument = prompt.argument(argument_name).ok_or_else(|| {
                    McpError::InvalidParams(format!("Prompt '{}' has no argument '{}'", name, argument_name))
                })?;
                argument.suggestions.iter().map(|s| s.to_string()).collect()
            }
            "ref/resource" => self.resource_candidates(),
            other => return Err(McpError::InvalidParams(format!("Unsupported reference type '{}'", other))),
        };

        let matches: Vec<String> = candidates
            .into_iter()
            .filter(|candidate| candidate.to_ascii_lowercase().starts_with(&prefix))
            .collect();
        let total = matches.len();
        let values: Vec<String> = matches.into_iter().take(MAX_COMPLETION_VALUES).collect();

        Ok(json!({
            "completion": {
                "values": values,
                "total": total,
                "hasMore": total > MAX_COMPLETION_VALUES,
            }
        }))
    }
}

/// Register the completion tool with the registry
pub fn register_tools(registry: &ToolRegistry, catalog: Arc<ResourceCatalog>) -> Result<(), McpError> {
    registry.register_tool(Arc::new(CompleteTool::new(catalog)))
}
