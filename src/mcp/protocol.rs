//! MCP Protocol Types (JSON-RPC 2.0)
//!
//! This module defines the wire envelopes for the Model Context Protocol (MCP).
//! MCP is built on top of JSON-RPC 2.0, which is a simple stateless RPC protocol.
//!
//! # Protocol Specification
//!
//! - JSON-RPC 2.0: <https://www.jsonrpc.org/specification>
//! - MCP Spec: <https://modelcontextprotocol.io/specification/2025-06-18>
//!
//! # Architecture
//!
//! The protocol layer is responsible only for building and describing messages.
//! Transport concerns (stdio, HTTP) live in the transport layer, and shape
//! checking of server replies lives in [`crate::mcp::validators`].

use crate::mcp::error::ClientError;
use crate::mcp::validators::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version advertised during `initialize`
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// A JSON-RPC request identifier
///
/// The wire format allows either an integer or a string. Both are kept as-is
/// so that a server echoing the id back sees exactly what was sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer identifier
    Number(i64),

    /// String identifier
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

/// A JSON-RPC 2.0 request or notification message
///
/// Requests carry an `id` and expect a reply; notifications omit it.
///
/// # Example
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "id": 1,
///   "method": "tools/list",
///   "params": {}
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Request identifier (absent for notifications)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Method name to invoke
    pub method: String,

    /// Method parameters (optional, depends on method)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl McpRequest {
    /// Create a new MCP request
    ///
    /// # Arguments
    ///
    /// * `id` - Request identifier, if the caller supplied one
    /// * `method` - Method to invoke
    /// * `params` - Optional method parameters
    pub fn new(id: Option<RequestId>, method: McpMethod, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.as_str().to_string(),
            params,
        }
    }

    /// Create a notification (no `id`, no reply expected)
    pub fn notification(method: McpMethod, params: Option<serde_json::Value>) -> Self {
        Self::new(None, method, params)
    }

    /// Whether this message is a notification
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A JSON-RPC 2.0 response message
///
/// Responses are sent from the MCP server back to the client.
/// A response either contains a `result` or an `error`, but never both.
///
/// # Example (Success)
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "id": 1,
///   "result": {"tools": [...]}
/// }
/// ```
///
/// # Example (Error)
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "id": 1,
///   "error": {"code": -32601, "message": "Method not found"}
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Request identifier (null only for errors the server could not attribute)
    pub id: Option<RequestId>,

    /// Result payload (present on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Error information (present on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    /// Split a decoded reply into its result or the server's error
    ///
    /// A reply carrying both or neither is not a JSON-RPC response.
    pub fn into_result(self) -> Result<serde_json::Value, ClientError> {
        match (self.result, self.error) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => Err(ClientError::Server(error)),
            _ => Err(ClientError::InvalidResponse),
        }
    }
}

/// A JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpError {
    /// Error code (JSON-RPC defined or server-specific)
    pub code: i64,

    /// Human-readable error message
    pub message: String,

    /// Additional error data (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl McpError {
    /// Invalid JSON was received by the server
    pub const PARSE_ERROR: i64 = -32700;

    /// The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i64 = -32600;

    pub const METHOD_NOT_FOUND: i64 = -32601;

    pub const INVALID_PARAMS: i64 = -32602;

    pub const INTERNAL_ERROR: i64 = -32603;

    /// Create a new error
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Whether the server does not implement the method
    pub fn is_method_not_found(&self) -> bool {
        self.code == Self::METHOD_NOT_FOUND
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Error {}] {}", self.code, self.message)
    }
}

impl std::error::Error for McpError {}

/// MCP methods supported by this client
///
/// The set is closed: strings arriving from outside are parsed with
/// [`FromStr`] and anything unknown is rejected at that boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum McpMethod {
    /// Initialize the connection (must be called first)
    Initialize,

    /// Liveness check
    Ping,

    /// Adjust server-side log verbosity
    LoggingSetLevel,

    /// Argument completion
    CompletionComplete,

    /// List available tools
    ToolsList,

    /// Call a specific tool
    ToolsCall,

    /// List available prompts
    PromptsList,

    /// Get a prompt
    PromptsGet,

    /// List available resources
    ResourcesList,

    /// Read a resource
    ResourcesRead,

    /// Subscribe to resource updates
    ResourcesSubscribe,

    /// Unsubscribe from resource updates
    ResourcesUnsubscribe,

    /// List resource templates
    ResourcesTemplatesList,

    /// Client finished initialization
    InitializedNotification,

    /// Client roots changed
    RootsListChangedNotification,

    /// Client cancelled an in-flight request
    CancelledNotification,
}

impl McpMethod {
    /// Every supported method, in declaration order
    pub const ALL: [McpMethod; 16] = [
        Self::Initialize,
        Self::Ping,
        Self::LoggingSetLevel,
        Self::CompletionComplete,
        Self::ToolsList,
        Self::ToolsCall,
        Self::PromptsList,
        Self::PromptsGet,
        Self::ResourcesList,
        Self::ResourcesRead,
        Self::ResourcesSubscribe,
        Self::ResourcesUnsubscribe,
        Self::ResourcesTemplatesList,
        Self::InitializedNotification,
        Self::RootsListChangedNotification,
        Self::CancelledNotification,
    ];

    /// Convert to string for JSON-RPC method field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Ping => "ping",
            Self::LoggingSetLevel => "logging/setLevel",
            Self::CompletionComplete => "completion/complete",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::PromptsList => "prompts/list",
            Self::PromptsGet => "prompts/get",
            Self::ResourcesList => "resources/list",
            Self::ResourcesRead => "resources/read",
            Self::ResourcesSubscribe => "resources/subscribe",
            Self::ResourcesUnsubscribe => "resources/unsubscribe",
            Self::ResourcesTemplatesList => "resources/templates/list",
            Self::InitializedNotification => "notifications/initialized",
            Self::RootsListChangedNotification => "notifications/roots/list_changed",
            Self::CancelledNotification => "notifications/cancelled",
        }
    }

    /// Schema the `result` of this method must satisfy
    ///
    /// Returns `None` for notifications, which have no reply.
    pub fn result_schema(&self) -> Option<Schema> {
        match self {
            Self::Initialize => Some(Schema::InitializeResult),
            Self::Ping
            | Self::LoggingSetLevel
            | Self::ResourcesSubscribe
            | Self::ResourcesUnsubscribe => Some(Schema::EmptyResult),
            Self::CompletionComplete => Some(Schema::CompleteResult),
            Self::ToolsList => Some(Schema::ListToolsResult),
            Self::ToolsCall => Some(Schema::CallToolResult),
            Self::PromptsList => Some(Schema::ListPromptsResult),
            Self::PromptsGet => Some(Schema::GetPromptResult),
            Self::ResourcesList => Some(Schema::ListResourcesResult),
            Self::ResourcesRead => Some(Schema::ReadResourceResult),
            Self::ResourcesTemplatesList => Some(Schema::ListResourceTemplatesResult),
            Self::InitializedNotification
            | Self::RootsListChangedNotification
            | Self::CancelledNotification => None,
        }
    }

    /// Whether this method is a fire-and-forget notification
    pub fn is_notification(&self) -> bool {
        self.result_schema().is_none()
    }
}

impl fmt::Display for McpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for McpMethod {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| ClientError::UnknownMethod(s.to_string()))
    }
}
