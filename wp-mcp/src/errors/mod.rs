// Error handling module for the MCP server
//
// This module defines the error taxonomy used at the protocol boundary and
// the error types used by the storage, content and configuration layers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Numeric error codes carried in error envelopes.
///
/// Protocol-level failures use the JSON-RPC band, domain failures use the
/// server band starting at -32001.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const UNAUTHORIZED: i32 = -32001;
    pub const FORBIDDEN: i32 = -32002;
    pub const RESOURCE_NOT_FOUND: i32 = -32003;
    pub const RATE_LIMITED: i32 = -32004;
    pub const VALIDATION_FAILED: i32 = -32005;
    pub const CONSENT_REQUIRED: i32 = -32006;
}

/// Error payload of an error envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Failures surfaced to protocol callers
#[derive(Error, Debug, Clone)]
pub enum McpError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        data: Option<Value>,
    },

    /// Carries the consent request descriptor a caller needs to retry
    #[error("User consent required for tool '{tool}'")]
    ConsentRequired { tool: String, request: Value },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        detail: Option<Value>,
    },
}

impl McpError {
    /// Shorthand for an internal error without diagnostics
    pub fn internal(message: impl Into<String>) -> Self {
        McpError::Internal {
            message: message.into(),
            detail: None,
        }
    }

    /// Stable domain code of this failure
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::Parse(_) => "parse_error",
            McpError::InvalidRequest(_) => "invalid_request",
            McpError::MethodNotFound(_) => "method_not_found",
            McpError::InvalidParams(_) => "invalid_params",
            McpError::MissingArgument(_) => "missing_argument",
            McpError::Unauthorized => "unauthorized",
            McpError::Forbidden(_) => "forbidden",
            McpError::ResourceNotFound(_) => "resource_not_found",
            McpError::RateLimited { .. } => "rate_limited",
            McpError::Validation { .. } => "validation_failed",
            McpError::ConsentRequired { .. } => "consent_required",
            McpError::Internal { .. } => "internal_error",
        }
    }

    /// Numeric code for the error envelope
    pub fn code(&self) -> i32 {
        code_for_domain(self.kind())
    }

    /// Structured detail attached to the error, if any
    pub fn data(&self) -> Option<Value> {
        match self {
            McpError::RateLimited { retry_after } => {
                Some(serde_json::json!({ "retry_after": retry_after }))
            }
            McpError::Validation { data, .. } => data.clone(),
            McpError::ConsentRequired { request, .. } => Some(request.clone()),
            McpError::Internal { detail, .. } => detail.clone(),
            _ => None,
        }
    }

    /// Build an error from a free-form domain code reported by a collaborator.
    ///
    /// Codes outside the taxonomy become internal errors.
    pub fn from_domain(code: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let message = message.into();
        match code {
            "parse_error" => McpError::Parse(message),
            "invalid_request" => McpError::InvalidRequest(message),
            "method_not_found" => McpError::MethodNotFound(message),
            "invalid_params" | "invalid_argument" => McpError::InvalidParams(message),
            "missing_argument" => McpError::MissingArgument(message),
            "unauthorized" => McpError::Unauthorized,
            "forbidden" | "forbidden_endpoint" => McpError::Forbidden(message),
            "resource_not_found" | "not_found" => McpError::ResourceNotFound(message),
            "validation_failed" => McpError::Validation { message, data },
            "rate_limited" => McpError::RateLimited {
                retry_after: data
                    .as_ref()
                    .and_then(|d| d.get("retry_after"))
                    .and_then(Value::as_u64)
                    .unwrap_or(60),
            },
            _ => McpError::Internal {
                message,
                detail: Some(serde_json::json!({ "domain_code": code, "data": data })),
            },
        }
    }
}

/// Map a domain code to its numeric error code.
///
/// Unknown codes map to [`codes::INTERNAL_ERROR`].
pub fn code_for_domain(kind: &str) -> i32 {
    match kind {
        "parse_error" => codes::PARSE_ERROR,
        "invalid_request" => codes::INVALID_REQUEST,
        "method_not_found" => codes::METHOD_NOT_FOUND,
        "invalid_params" | "invalid_argument" | "missing_argument" => codes::INVALID_PARAMS,
        "unauthorized" => codes::UNAUTHORIZED,
        "forbidden" | "forbidden_endpoint" => codes::FORBIDDEN,
        "resource_not_found" | "not_found" => codes::RESOURCE_NOT_FOUND,
        "rate_limited" => codes::RATE_LIMITED,
        "validation_failed" => codes::VALIDATION_FAILED,
        "consent_required" => codes::CONSENT_REQUIRED,
        _ => codes::INTERNAL_ERROR,
    }
}

/// Convert a failure into the error payload of a response envelope.
///
/// Internal diagnostics are withheld when `production` is set.
pub fn normalize(error: &McpError, production: bool) -> ErrorBody {
    let data = match error {
        McpError::Internal { .. } if production => None,
        _ => error.data(),
    };

    ErrorBody {
        code: error.code(),
        message: error.to_string(),
        data,
    }
}

/// Common error types for the MCP server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Content store error: {0}")]
    Content(#[from] ContentError),

    #[error("Tool registration failed: {0}")]
    Registry(#[from] McpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the persisted option store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned: {0}")]
    Poisoned(String),
}

impl From<StoreError> for McpError {
    fn from(err: StoreError) -> Self {
        McpError::Internal {
            message: "Persisted state unavailable".to_string(),
            detail: Some(serde_json::json!({ "cause": err.to_string() })),
        }
    }
}

/// Errors reported by a content store backend.
///
/// `code` is the backend's own domain code (for example a REST error code).
#[derive(Error, Debug, Clone)]
#[error("{message} ({code})")]
pub struct ContentError {
    pub code: String,
    pub message: String,
    pub data: Option<Value>,
}

impl ContentError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("resource_not_found", message)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<ContentError> for McpError {
    fn from(err: ContentError) -> Self {
        McpError::from_domain(&err.code, err.message, err.data)
    }
}
