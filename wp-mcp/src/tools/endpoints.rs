// WordPress endpoint tools
//
// `wp_discover_endpoints` lists the REST routes reachable through the server
// and `wp_call_endpoint` routes a generic REST-style call onto the content
// store. Only `wp/v2` routes of allow-listed types are reachable.

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::content::ContentStore;
use crate::errors::McpError;
use crate::protocol::{optional_str, required_str};
use crate::tools::{Tool, ToolContext, ToolDefinition, ToolName, ToolParameter, ToolRegistry, ToolResult};

/// REST namespace served by the content store
pub const NAMESPACE: &str = "wp/v2";

/// Largest page a list call may request
pub const MAX_PER_PAGE: usize = 100;

const DEFAULT_PER_PAGE: usize = 10;

const COLLECTION_METHODS: [&str; 2] = ["GET", "POST"];
const ITEM_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// A parsed `/wp/v2/{type}[/{id}]` endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub content_type: String,
    pub id: Option<String>,
}

/// Operation an endpoint call resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    List,
    Read,
    Create,
    Update,
    Delete,
}

/// Parse an endpoint path and check it against the allow-list
pub fn parse_endpoint(endpoint: &str, types: &[String]) -> Result<Endpoint, McpError> {
    let path = endpoint.trim().trim_start_matches('/').trim_end_matches('/');
    let rest = path
        .strip_prefix(NAMESPACE)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| McpError::Forbidden(format!("Endpoint '{}' is outside {}", endpoint, NAMESPACE)))?;

    let mut segments = rest.split('/');
    let content_type = segments.next().filter(|s| !s.is_empty());
    let id = segments.next().filter(|s| !s.is_empty());
    if segments.next().is_some() {
        return Err(McpError::InvalidParams(format!("Unsupported endpoint '{}'", endpoint)));
    }

    let content_type = content_type
        .ok_or_else(|| McpError::InvalidParams(format!("Endpoint '{}' names no content type", endpoint)))?;
    if !types.iter().any(|t| t == content_type) {
        return Err(McpError::Forbidden(format!("Endpoint '{}' is not exposed", endpoint)));
    }

    Ok(Endpoint {
        content_type: content_type.to_string(),
        id: id.map(str::to_string),
    })
}

/// Pick the store operation for an HTTP method on an endpoint
pub fn route(method: &str, endpoint: &Endpoint) -> Result<Route, McpError> {
    let method = method.to_ascii_uppercase();
    match (method.as_str(), endpoint.id.is_some()) {
        ("GET", false) => Ok(Route::List),
        ("GET", true) => Ok(Route::Read),
        ("POST", false) => Ok(Route::Create),
        ("POST", true) | ("PUT", true) | ("PATCH", true) => Ok(Route::Update),
        ("DELETE", true) => Ok(Route::Delete),
        (method, has_id) => Err(McpError::InvalidParams(format!(
            "Method {} is not supported on {} endpoints",
            method,
            if has_id { "item" } else { "collection" }
        ))),
    }
}

/// Endpoint discovery tool
pub struct DiscoverEndpointsTool {
    types: Vec<String>,
}

impl DiscoverEndpointsTool {
    pub fn new(types: &[String]) -> Self {
        Self {
            types: types.to_vec(),
        }
    }
}

#[async_trait]
impl Tool for DiscoverEndpointsTool {
    fn name(&self) -> ToolName {
        ToolName::WpDiscoverEndpoints
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "List the WordPress REST endpoints available through this server".to_string(),
            parameters: vec![],
            return_type: "object".to_string(),
            tags: vec!["wordpress".to_string(), "discovery".to_string()],
        }
    }

    async fn execute(&self, _params: Map<String, Value>, _context: ToolContext) -> ToolResult {
        let endpoints: Vec<Value> = self
            .types
            .iter()
            .flat_map(|content_type| {
                vec![
                    json!({
                        "path": format!("/{}/{}", NAMESPACE, content_type),
                        "methods": COLLECTION_METHODS,
                        "namespace": NAMESPACE,
                    }),
                    json!({
                        "path": format!("/{}/{}/{{id}}", NAMESPACE, content_type),
                        "methods": ITEM_METHODS,
                        "namespace": NAMESPACE,
                    }),
                ]
            })
            .collect();

        Ok(json!({ "endpoints": endpoints }))
    }
}

/// Generic endpoint call tool
pub struct CallEndpointTool {
    content: Arc<dyn ContentStore>,
    types: Vec<String>,
}

impl CallEndpointTool {
    pub fn new(content: Arc<dyn ContentStore>, types: &[String]) -> Self {
        Self {
            content,
            types: types.to_vec(),
        }
    }
}

#[async_trait]
impl Tool for CallEndpointTool {
    fn name(&self) -> ToolName {
        ToolName::WpCallEndpoint
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Call a WordPress REST endpoint. Mutating methods require user consent".to_string(),
            parameters: vec![
                ToolParameter::new("endpoint", "string", true, "Endpoint path, e.g. /wp/v2/posts or /wp/v2/posts/12"),
                ToolParameter::new("method", "string", false, "HTTP method")
                    .with_default(json!("GET"))
                    .with_enum(ITEM_METHODS.iter().map(|m| json!(m)).collect()),
                ToolParameter::new("params", "object", false, "Query parameters or item fields"),
            ],
            return_type: "object".to_string(),
            tags: vec!["wordpress".to_string(), "content".to_string()],
        }
    }

    async fn execute(&self, params: Map<String, Value>, context: ToolContext) -> ToolResult {
        let endpoint = parse_endpoint(required_str(&params, "endpoint")?, &self.types)?;
        let method = optional_str(&params, "method")?.unwrap_or("GET");
        let fields = match params.get("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(fields)) => fields.clone(),
            Some(_) => return Err(McpError::InvalidParams("Argument 'params' must be an object".to_string())),
        };

        let route = route(method, &endpoint)?;
        log::debug!(
            "Request {}: {:?} {} {:?}",
            context.request_id,
            route,
            endpoint.content_type,
            endpoint.id
        );

        let content_type = endpoint.content_type.as_str();
        match (route, endpoint.id.as_deref()) {
            (Route::List, _) => {
                let page = number_param(&fields, "page")?.unwrap_or(1).max(1);
                let per_page = number_param(&fields, "per_page")?
                    .unwrap_or(DEFAULT_PER_PAGE)
                    .clamp(1, MAX_PER_PAGE);
                let offset = (page - 1).saturating_mul(per_page);

                let items = self.content.list(content_type, offset, per_page).await?;
                Ok(json!({
                    "items": items.iter().map(|item| item.to_json()).collect::<Vec<_>>(),
                    "page": page,
                    "per_page": per_page,
                }))
            }
            (Route::Read, Some(id)) => {
                let item = self
                    .content
                    .read(content_type, id)
                    .await?
                    .ok_or_else(|| McpError::ResourceNotFound(format!("/{}/{}/{}", NAMESPACE, content_type, id)))?;
                Ok(item.to_json())
            }
            (Route::Create, _) => Ok(self.content.create(content_type, fields).await?.to_json()),
            (Route::Update, Some(id)) => Ok(self.content.update(content_type, id, fields).await?.to_json()),
            (Route::Delete, Some(id)) => {
                let previous = self.content.delete(content_type, id).await?;
                Ok(json!({ "deleted": true, "previous": previous.to_json() }))
            }
            (route, None) => Err(McpError::internal(format!("Route {:?} resolved without an item id", route))),
        }
    }
}

/// Read a non-negative integer that may arrive as a number or a numeric string
fn number_param(fields: &Map<String, Value>, name: &str) -> Result<Option<usize>, McpError> {
    let invalid = || McpError::InvalidParams(format!("Parameter '{}' must be a positive integer", name));
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(|n| Some(n as usize)).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<usize>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Register endpoint tools with the registry
pub fn register_tools(registry: &ToolRegistry, content: Arc<dyn ContentStore>, types: &[String]) -> Result<(), McpError> {
    registry.register_tool(Arc::new(DiscoverEndpointsTool::new(types)))?;
    registry.register_tool(Arc::new(CallEndpointTool::new(content, types)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContentStore;

    fn types() -> Vec<String> {
        vec!["posts".to_string(), "media".to_string()]
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_endpoint() {
        let endpoint = parse_endpoint("/wp/v2/posts/12", &types()).unwrap();
        assert_eq!(endpoint.content_type, "posts");
        assert_eq!(endpoint.id.as_deref(), Some("12"));

        let endpoint = parse_endpoint("wp/v2/posts", &types()).unwrap();
        assert_eq!(endpoint.id, None);

        assert!(matches!(parse_endpoint("/wp/v2/users/1", &types()), Err(McpError::Forbidden(_))));
        assert!(matches!(parse_endpoint("/wc/v3/orders", &types()), Err(McpError::Forbidden(_))));
        assert!(matches!(parse_endpoint("/wp/v2/posts/1/revisions", &types()), Err(McpError::InvalidParams(_))));
    }

    #[test]
    fn test_routing_table() {
        let collection = Endpoint { content_type: "posts".into(), id: None };
        let item = Endpoint { content_type: "posts".into(), id: Some("1".into()) };

        assert_eq!(route("get", &collection).unwrap(), Route::List);
        assert_eq!(route("GET", &item).unwrap(), Route::Read);
        assert_eq!(route("POST", &collection).unwrap(), Route::Create);
        assert_eq!(route("PATCH", &item).unwrap(), Route::Update);
        assert_eq!(route("DELETE", &item).unwrap(), Route::Delete);
        assert!(route("DELETE", &collection).is_err());
        assert!(route("PUT", &collection).is_err());
        assert!(route("HEAD", &item).is_err());
    }

    #[tokio::test]
    async fn test_discover_lists_allowed_types() {
        let result = DiscoverEndpointsTool::new(&types())
            .execute(Map::new(), ToolContext::default())
            .await
            .unwrap();
        let endpoints = result["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 4);
        assert_eq!(endpoints[0]["path"], "/wp/v2/posts");
        assert_eq!(endpoints[3]["path"], "/wp/v2/media/{id}");
    }

    #[tokio::test]
    async fn test_call_endpoint_crud() {
        let store = Arc::new(InMemoryContentStore::new());
        let tool = CallEndpointTool::new(store.clone(), &types());
        let context = ToolContext::default();

        let created = tool
            .execute(
                args(json!({ "endpoint": "/wp/v2/posts", "method": "POST", "params": { "title": "First" } })),
                context.clone(),
            )
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let listed = tool
            .execute(args(json!({ "endpoint": "/wp/v2/posts", "params": { "per_page": "500" } })), context.clone())
            .await
            .unwrap();
        assert_eq!(listed["per_page"], 100);
        assert_eq!(listed["items"][0]["title"], "First");

        let endpoint = format!("/wp/v2/posts/{}", id);
        tool.execute(
            args(json!({ "endpoint": endpoint, "method": "PUT", "params": { "title": "Renamed" } })),
            context.clone(),
        )
        .await
        .unwrap();
        let read = tool.execute(args(json!({ "endpoint": endpoint })), context.clone()).await.unwrap();
        assert_eq!(read["title"], "Renamed");

        let deleted = tool
            .execute(args(json!({ "endpoint": endpoint, "method": "DELETE" })), context.clone())
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], true);

        let missing = tool.execute(args(json!({ "endpoint": endpoint })), context).await;
        assert!(matches!(missing, Err(McpError::ResourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_call_endpoint_requires_endpoint() {
        let tool = CallEndpointTool::new(Arc::new(InMemoryContentStore::new()), &types());
        let result = tool.execute(Map::new(), ToolContext::default()).await;
        assert!(matches!(result, Err(McpError::MissingArgument(name)) if name == "endpoint"));
    }
}
