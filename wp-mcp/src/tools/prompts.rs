// Prompt tools
//
// A fixed catalogue of prompt templates for common editorial tasks.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::errors::McpError;
use crate::protocol::required_str;
use crate::tools::{Tool, ToolContext, ToolDefinition, ToolName, ToolParameter, ToolRegistry, ToolResult};

/// Argument accepted by a prompt
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    /// Values offered by completion
    #[serde(skip)]
    pub suggestions: &'static [&'static str],
    /// Substituted when an optional argument is omitted
    #[serde(skip)]
    pub default: Option<&'static str>,
}

/// A prompt template
#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Vec<PromptArgument>,
    /// Message text with `{argument}` placeholders
    #[serde(skip)]
    pub template: &'static str,
}

impl Prompt {
    pub fn argument(&self, name: &str) -> Option<&PromptArgument> {
        self.arguments.iter().find(|argument| argument.name == name)
    }

    /// Substitute arguments into the template in a single pass; substituted
    /// values are never scanned for placeholders
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, McpError> {
        let mut resolved = HashMap::new();
        for argument in &self.arguments {
            let value = match values.get(argument.name).filter(|v| !v.trim().is_empty()) {
                Some(value) => value.as_str(),
                None if argument.required => return Err(McpError::MissingArgument(argument.name.to_string())),
                None => argument.default.unwrap_or(""),
            };
            resolved.insert(argument.name, value);
        }

        let mut text = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(start) = rest.find('{') {
            text.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}').and_then(|end| resolved.get(&after[..end]).map(|value| (end, value))) {
                Some((end, value)) => {
                    text.push_str(value);
                    rest = &after[end + 1..];
                }
                None => {
                    text.push('{');
                    rest = after;
                }
            }
        }
        text.push_str(rest);
        Ok(text)
    }
}

static PROMPTS: Lazy<Vec<Prompt>> = Lazy::new(|| {
    vec![
        Prompt {
            name: "summarize_content",
            description: "Summarize a post, page or other resource",
            arguments: vec![PromptArgument {
                name: "uri",
                description: "Resource URI of the content to summarize",
                required: true,
                suggestions: &[],
                default: None,
            }],
            template: "Read the resource at {uri} and write a concise summary of its key points.",
        },
        Prompt {
            name: "draft_post",
            description: "Draft a new blog post",
            arguments: vec![
                PromptArgument {
                    name: "topic",
                    description: "What the post is about",
                    required: true,
                    suggestions: &[],
                    default: None,
                },
                PromptArgument {
                    name: "tone",
                    description: "Writing tone",
                    required: false,
                    suggestions: &["neutral", "friendly", "formal", "technical", "playful"],
                    default: Some("neutral"),
                },
            ],
            template: "Draft a blog post about {topic} in a {tone} tone. Start with a title and a short introduction.",
        },
        Prompt {
            name: "moderate_comments",
            description: "Review pending comments for spam and abuse",
            arguments: vec![PromptArgument {
                name: "post_id",
                description: "Post to review, e.g. post 42",
                required: false,
                suggestions: &[],
                default: Some("any post"),
            }],
            template: "List the pending comments on {post_id} and flag the ones that look like spam or abuse.",
        },
    ]
});

/// Look up a prompt by name
pub fn find_prompt(name: &str) -> Option<&'static Prompt> {
    PROMPTS.iter().find(|prompt| prompt.name == name)
}

/// Prompt catalogue listing
pub struct ListPromptsTool;

#[async_trait]
impl Tool for ListPromptsTool {
    fn name(&self) -> ToolName {
        ToolName::PromptsList
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "List available prompt templates".to_string(),
            parameters: vec![],
            return_type: "object".to_string(),
            tags: vec!["prompts".to_string()],
        }
    }

    async fn execute(&self, _params: Map<String, Value>, _context: ToolContext) -> ToolResult {
        Ok(json!({ "prompts": &*PROMPTS }))
    }
}

/// Prompt rendering
pub struct GetPromptTool;

#[async_trait]
impl Tool for GetPromptTool {
    fn name(&self) -> ToolName {
        ToolName::PromptsGet
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Render a prompt template with arguments".to_string(),
            parameters: vec![
                ToolParameter::new("name", "string", true, "Prompt name"),
                ToolParameter::new("arguments", "object", false, "Prompt arguments"),
            ],
            return_type: "object".to_string(),
            tags: vec!["prompts".to_string()],
        }
    }

    async fn execute(&self, params: Map<String, Value>, _context: ToolContext) -> ToolResult {
        let name = required_str(&params, "name")?;
        let prompt = find_prompt(name).ok_or_else(|| McpError::InvalidParams(format!("Unknown prompt '{}'", name)))?;

        let values: HashMap<String, String> = match params.get("arguments") {
            None | Some(Value::Null) => HashMap::new(),
            Some(Value::Object(arguments)) => arguments
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect(),
            Some(_) => return Err(McpError::InvalidParams("Argument 'arguments' must be an object".to_string())),
        };

        let text = prompt.render(&values)?;
        Ok(json!({
            "description": prompt.description,
            "messages": [{
                "role": "user",
                "content": { "type": "text", "text": text },
            }],
        }))
    }
}

/// Register prompt tools with the registry
pub fn register_tools(registry: &ToolRegistry) -> Result<(), McpError> {
    registry.register_tool(Arc::new(ListPromptsTool))?;
    registry.register_tool(Arc::new(GetPromptTool))?;
    Ok(())
}
