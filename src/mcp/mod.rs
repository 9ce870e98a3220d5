//! MCP (Model Context Protocol) Client Implementation
//!
//! This module provides a pure Rust implementation of an MCP client,
//! built on Tokio, Serde and reqwest.
//!
//! # Architecture
//!
//! The implementation is organized into four layers:
//!
//! 1. **Protocol Layer** (`protocol`, `types`): JSON-RPC 2.0 envelopes and MCP payloads
//! 2. **Transport Layer** (`transport`, `http_transport`, `sse`): stdio and HTTP transports
//! 3. **Client Layer** (`client`, `validators`): one method per operation, double validation
//! 4. **Session Layer** (`session`): request ids, session id, initialization gate
//!
//! Calls flow Session → Client → Transport → wire; replies flow back and are
//! validated in the Client.

// Protocol layer: JSON-RPC 2.0 message types
pub mod protocol;

// Typed MCP params and results
pub mod types;

// Schema predicates for replies
pub mod validators;

// Error taxonomy
pub mod error;

// Transport layer: trait and stdio transport
pub mod transport;

// HTTP transport for remote MCP servers
pub mod http_transport;

// Server-Sent Events decoding
pub mod sse;

// Client layer: RPC methods
pub mod client;

// Session layer: stateful wrapper
pub mod session;

// Re-export commonly used types for convenience
pub use protocol::{
    McpError, McpMethod, McpRequest, McpResponse, RequestId, JSONRPC_VERSION,
    LATEST_PROTOCOL_VERSION,
};
pub use types::*;

pub use error::{ClientError, TransportError};
pub use validators::{ResultValidator, Schema, SchemaValidators};

// Re-export transport types
pub use http_transport::{
    HttpAdapter, HttpRequest, HttpResponse, HttpTransport, HttpTransportOptions, ReqwestAdapter,
};
pub use transport::{
    StdioTransport, StdioTransportOptions, Transport, TransportRequest, TransportRequestMeta,
    TransportResponse, TransportResponseMeta,
};

// Re-export client and session types
pub use client::{Client, ClientOptions, ClientResponse};
pub use session::Session;

// Property-based tests module
#[cfg(test)]
mod proptests;
