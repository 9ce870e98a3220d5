//! MCP Error Types
//!
//! Two layers of failure are kept apart so callers can branch on them:
//!
//! - [`TransportError`]: the channel itself failed (HTTP decoding, auth
//!   challenge, child process I/O).
//! - [`ClientError`]: the channel worked but the protocol exchange did not
//!   (malformed envelope, server-reported error, wrong result shape, session
//!   used out of order).

use crate::mcp::protocol::McpError;
use crate::mcp::validators::Schema;

/// Failures raised by a [`Transport`](crate::mcp::transport::Transport)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP response carried no `content-type` header
    #[error("Missing content-type header")]
    MissingContentType,

    /// The HTTP response used a content type other than JSON or SSE
    #[error("Unsupported content-type: {0}")]
    UnsupportedContentType(String),

    /// The HTTP response had no body
    #[error("Missing response body")]
    MissingBody,

    /// The payload was not valid JSON
    #[error("Failed to parse response JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The event stream contained no `data:` line
    #[error("Data not found in event")]
    MissingEventData,

    /// The server answered 401; `resource_metadata_url` points at the
    /// protected-resource metadata when the challenge advertised one
    #[error("Unauthorized")]
    Unauthorized {
        resource_metadata_url: Option<String>,
    },

    /// Non-success HTTP status where no payload is decoded
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    /// `send` was called before `start`
    #[error("Process not started")]
    NotStarted,

    /// `start` was called twice
    #[error("Process already started")]
    AlreadyStarted,

    /// The child closed its stdout
    #[error("MCP server closed connection (EOF)")]
    Closed,

    /// The child process could not be spawned
    #[error("Failed to spawn MCP server process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Pipe read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP adapter itself failed (connect, TLS, timeout, ...)
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl TransportError {
    /// Remediation URL for an auth challenge, if this is one
    pub fn resource_metadata_url(&self) -> Option<&str> {
        match self {
            Self::Unauthorized {
                resource_metadata_url,
            } => resource_metadata_url.as_deref(),
            _ => None,
        }
    }
}

/// Failures raised by [`Client`](crate::mcp::client::Client) and
/// [`Session`](crate::mcp::session::Session)
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Reply matched neither the success nor the error envelope
    #[error("Invalid JSON-RPC response")]
    InvalidResponse,

    /// Envelope was fine but `result` does not conform to the method's schema
    #[error("Invalid JSON-RPC response: result does not match {schema}")]
    InvalidResult { schema: Schema },

    /// Well-formed JSON-RPC error envelope from the server
    #[error("Server error: {}", .0.message)]
    Server(McpError),

    /// Channel failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A session operation was attempted before `initialize` succeeded
    #[error("Session not initialized. Call initialize() first.")]
    NotInitialized,

    /// `initialize` succeeded but the transport needs a session id and none came back
    #[error("Server did not return a session id")]
    MissingSessionId,

    /// Method name outside the supported set
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Request params could not be serialized
    #[error("Failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// The server's error object, if this is a server-reported failure
    pub fn server_error(&self) -> Option<&McpError> {
        match self {
            Self::Server(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the failure came from the transport's 401 handling
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Unauthorized { .. }))
    }
}
