//! MCP Client SDK
//!
//! This library provides a client for the Model Context Protocol: JSON-RPC 2.0
//! over stdio or HTTP, typed request/response validation, and a session layer
//! that owns request ids and the server-assigned session id.
//!
//! The `mcp-client` binary is a thin CLI over [`mcp_command`].

pub mod config;
pub mod mcp;
pub mod mcp_command;
