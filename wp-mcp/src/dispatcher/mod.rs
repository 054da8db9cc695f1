// Request dispatcher
//
// Every inbound envelope goes through the same sequence: validation, rate
// limiting, capability description or tool resolution, the consent gate,
// execution, and normalization of the outcome into a response envelope.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::auth::{RateLimitCheckResult, RateLimiter};
use crate::clock::Clock;
use crate::consent::{may_require_consent, ConsentLog, ConsentLogEntry, ConsentManager};
use crate::errors::McpError;
use crate::protocol::{Request, Response};
use crate::tools::{ToolContext, ToolDefinition, ToolName, ToolRegistry};

/// Argument carrying an approved consent token
pub const CONSENT_TOKEN_ARG: &str = "consent_token";

/// Tool definition as listed by `describe`; the consent flag comes from the policy table
#[derive(Serialize)]
struct ToolDescription {
    #[serde(flatten)]
    definition: ToolDefinition,
    requires_consent: bool,
}

impl From<ToolDefinition> for ToolDescription {
    fn from(definition: ToolDefinition) -> Self {
        let requires_consent = may_require_consent(&definition.name);
        Self {
            definition,
            requires_consent,
        }
    }
}

/// Routes envelopes to tools
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    consent: Arc<ConsentManager>,
    consent_log: Arc<ConsentLog>,
    rate_limiter: Option<Arc<RateLimiter>>,
    clock: Arc<dyn Clock>,
    production: bool,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        consent: Arc<ConsentManager>,
        consent_log: Arc<ConsentLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            consent,
            consent_log,
            rate_limiter: None,
            clock,
            production: false,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Strip internal error detail from responses
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Handle a raw request body
    pub async fn handle_str(&self, body: &str, context: ToolContext) -> Response {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => self.handle(value, context).await,
            Err(e) => {
                log::debug!("Request {}: unparseable body: {}", context.request_id, e);
                Response::from_error(&McpError::Parse(e.to_string()), self.production)
            }
        }
    }

    /// Handle a parsed request envelope
    pub async fn handle(&self, envelope: Value, context: ToolContext) -> Response {
        match self.process(envelope, &context).await {
            Ok(data) => Response::success(data),
            Err(err) => {
                match &err {
                    McpError::Internal { .. } => {
                        log::error!("Request {} failed: {}", context.request_id, err)
                    }
                    McpError::ConsentRequired { tool, .. } => {
                        log::info!("Request {}: consent required for {}", context.request_id, tool)
                    }
                    _ => log::warn!("Request {} rejected: {}", context.request_id, err),
                }
                Response::from_error(&err, self.production)
            }
        }
    }

    async fn process(&self, envelope: Value, context: &ToolContext) -> Result<Value, McpError> {
        let request = Request::from_value(envelope)?;

        if let Some(limiter) = &self.rate_limiter {
            if let RateLimitCheckResult::Exceeded { reset_after, .. } = limiter.check(context.caller_key()) {
                return Err(McpError::RateLimited { retry_after: reset_after });
            }
        }

        let (name, mut arguments) = match request {
            Request::Describe => return Ok(self.describe()),
            Request::Invoke { name, arguments } => (name, arguments),
        };

        let tool_name: ToolName = name.parse()?;
        let tool = self
            .registry
            .get_tool(tool_name)
            .ok_or_else(|| McpError::MethodNotFound(name.clone()))?;

        let token = match arguments.remove(CONSENT_TOKEN_ARG) {
            Some(Value::String(token)) => Some(token),
            _ => None,
        };
        self.check_consent(tool_name, &arguments, token.as_deref(), context)?;

        log::debug!("Request {}: invoking {} for {}", context.request_id, tool_name, context.user_id);
        tool.validate_params(&arguments)?;
        tool.execute(arguments, context.clone()).await
    }

    /// Reject gated calls without a valid token; record the ones let through
    fn check_consent(
        &self,
        tool: ToolName,
        arguments: &Map<String, Value>,
        token: Option<&str>,
        context: &ToolContext,
    ) -> Result<(), McpError> {
        let method = arguments.get("method").and_then(Value::as_str);
        if !self.consent.is_required(tool.as_str(), method) {
            return Ok(());
        }

        let approved = token
            .map(|token| self.consent.verify(tool.as_str(), token))
            .unwrap_or(false);
        if !approved {
            let request = self.consent.describe_request(tool.as_str(), arguments)?;
            let request = serde_json::to_value(request)
                .map_err(|e| McpError::internal(format!("Failed to encode consent request: {}", e)))?;
            return Err(McpError::ConsentRequired {
                tool: tool.to_string(),
                request,
            });
        }

        let entry = ConsentLogEntry {
            tool: tool.to_string(),
            arguments: arguments.clone(),
            user_id: context.user_id.clone(),
            session_id: context.session_id.clone().unwrap_or_default(),
            timestamp: self.clock.now().to_rfc3339(),
            ip: context.ip.clone().unwrap_or_default(),
        };
        if let Err(e) = self.consent_log.record(entry) {
            log::warn!("Failed to record consent for {}: {}", tool, e);
        }
        Ok(())
    }

    /// Capability document returned for `describe`
    fn describe(&self) -> Value {
        json!({
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "protocolVersion": crate::MCP_VERSION,
            "capabilities": {
                "tools": { "categories": self.registry.get_categories() },
                "resources": { "subscribe": true, "listChanged": false },
                "prompts": {},
                "completion": {},
                "consent": { "enabled": self.consent.is_enabled() },
            },
            "tools": self
                .registry
                .list_tools()
                .into_iter()
                .map(ToolDescription::from)
                .collect::<Vec<_>>(),
        })
    }
}
