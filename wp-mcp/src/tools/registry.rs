// Tool registry module
//
// This module defines the tool registry system which manages tool registration
// and discovery for the MCP server.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};

use crate::errors::McpError;
use crate::tools::{ToolContext, ToolName};

/// ToolParameter defines a parameter for a tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Name of the parameter
    pub name: String,
    /// Description of the parameter
    pub description: String,
    /// Whether the parameter is required
    pub required: bool,
    /// Type of the parameter (string, number, boolean, object, array)
    pub parameter_type: String,
    /// Default value for the parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Enum values for the parameter (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ToolParameter {
    pub fn new(name: &str, parameter_type: &str, required: bool, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required,
            parameter_type: parameter_type.to_string(),
            default: None,
            enum_values: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// ToolDefinition defines a tool available in the MCP server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Wire name of the tool
    pub name: String,
    /// Description of the tool
    pub description: String,
    /// Parameters for the tool
    pub parameters: Vec<ToolParameter>,
    /// Return type description
    pub return_type: String,
    /// Tags for categorizing the tool
    pub tags: Vec<String>,
}

/// Type alias for tool execution results
pub type ToolResult = Result<Value, McpError>;

/// Tool trait for implementing tool functionality
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the tool is registered under
    fn name(&self) -> ToolName;

    /// Get the tool definition
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given arguments and context
    async fn execute(&self, params: Map<String, Value>, context: ToolContext) -> ToolResult;

    /// Validate the arguments for the tool
    fn validate_params(&self, params: &Map<String, Value>) -> Result<(), McpError> {
        let definition = self.definition();

        // Check required parameters
        for param in definition.parameters.iter().filter(|p| p.required) {
            match params.get(&param.name) {
                None | Some(Value::Null) => return Err(McpError::MissingArgument(param.name.clone())),
                Some(Value::String(value)) if value.is_empty() => {
                    return Err(McpError::MissingArgument(param.name.clone()))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

/// ToolRegistry manages tool registration and discovery
pub struct ToolRegistry {
    tools: RwLock<HashMap<ToolName, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create a new tool registry
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool with the registry
    pub fn register_tool(&self, tool: Arc<dyn Tool>) -> Result<(), McpError> {
        let name = tool.name();

        let mut tools = self.tools.write().map_err(|_| {
            McpError::internal("Failed to acquire tool registry write lock")
        })?;

        if tools.contains_key(&name) {
            return Err(McpError::internal(
                format!("Tool with name '{}' already registered", name)
            ));
        }

        tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: ToolName) -> Option<Arc<dyn Tool>> {
        self.tools.read().ok()?.get(&name).cloned()
    }

    /// List all registered tools, ordered by wire name
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self.tools.read()
            .map(|tools| {
                tools.values()
                    .map(|tool| tool.definition())
                    .collect()
            })
            .unwrap_or_default();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Get tool categories (based on tool tags)
    pub fn get_categories(&self) -> Vec<String> {
        let mut categories = std::collections::BTreeSet::new();

        if let Ok(tools) = self.tools.read() {
            for tool in tools.values() {
                categories.extend(tool.definition().tags);
            }
        }

        categories.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().map(|tools| tools.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
