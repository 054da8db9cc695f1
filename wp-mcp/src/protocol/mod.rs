// Protocol module for the MCP server
//
// This module defines the request and response envelopes exchanged at the
// protocol boundary and the validation applied to inbound envelopes.

pub mod cursor;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{normalize, ErrorBody, McpError};

/// Kind of an inbound envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Invoke,
    Describe,
}

/// A validated inbound envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Capability discovery
    Describe,
    /// Tool invocation
    Invoke {
        name: String,
        arguments: Map<String, Value>,
    },
}

impl Request {
    /// Validate a raw JSON value as a request envelope
    pub fn from_value(value: Value) -> Result<Self, McpError> {
        let mut envelope = match value {
            Value::Object(map) => map,
            other => {
                return Err(McpError::InvalidRequest(format!(
                    "Envelope must be a JSON object, got {}",
                    json_type(&other)
                )))
            }
        };

        let kind = match envelope.get("kind") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => {
                return Err(McpError::InvalidRequest(format!(
                    "Field 'kind' must be a string, got {}",
                    json_type(other)
                )))
            }
            None => return Err(McpError::InvalidRequest("Missing field 'kind'".to_string())),
        };

        let kind = match kind {
            "invoke" => RequestKind::Invoke,
            "describe" => RequestKind::Describe,
            other => {
                return Err(McpError::InvalidRequest(format!(
                    "Unsupported kind '{}', expected 'invoke' or 'describe'",
                    other
                )))
            }
        };

        let arguments = match envelope.remove("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(other) => {
                return Err(McpError::InvalidRequest(format!(
                    "Field 'arguments' must be an object, got {}",
                    json_type(&other)
                )))
            }
        };

        match kind {
            RequestKind::Describe => Ok(Request::Describe),
            RequestKind::Invoke => match envelope.remove("name") {
                Some(Value::String(name)) if !name.trim().is_empty() => {
                    Ok(Request::Invoke { name, arguments })
                }
                Some(Value::String(_)) => {
                    Err(McpError::InvalidRequest("Field 'name' must not be empty".to_string()))
                }
                Some(other) => Err(McpError::InvalidRequest(format!(
                    "Field 'name' must be a string, got {}",
                    json_type(&other)
                ))),
                None => Err(McpError::InvalidRequest(
                    "Envelope of kind 'invoke' requires 'name'".to_string(),
                )),
            },
        }
    }
}

/// Outbound envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Response {
    Success { data: Value },
    Error { error: ErrorBody },
}

impl Response {
    pub fn success(data: Value) -> Self {
        Response::Success { data }
    }

    /// Normalize a failure into an error envelope
    pub fn from_error(error: &McpError, production: bool) -> Self {
        Response::Error {
            error: normalize(error, production),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    /// Numeric error code, if this is an error envelope
    pub fn error_code(&self) -> Option<i32> {
        match self {
            Response::Error { error } => Some(error.code),
            Response::Success { .. } => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Response::Success { data } => Some(data),
            Response::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Response::Error { error } => Some(error),
            Response::Success { .. } => None,
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read an optional string argument
pub fn optional_str<'a>(arguments: &'a Map<String, Value>, name: &str) -> Result<Option<&'a str>, McpError> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(McpError::InvalidParams(format!(
            "Argument '{}' must be a string, got {}",
            name,
            json_type(other)
        ))),
    }
}

/// Read a required string argument
pub fn required_str<'a>(arguments: &'a Map<String, Value>, name: &str) -> Result<&'a str, McpError> {
    optional_str(arguments, name)?
        .filter(|value| !value.is_empty())
        .ok_or_else(|| McpError::MissingArgument(name.to_string()))
}
