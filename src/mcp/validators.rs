//! Response Validators
//!
//! A family of pure predicates, one per result shape, answering "does this
//! value conform to schema X". The [`Client`](crate::mcp::client::Client)
//! treats them as an opaque oracle through [`ResultValidator`], so a caller
//! can inject predicates generated from the protocol's JSON Schema instead of
//! the hand-written defaults here.
//!
//! The default table is built once on first use and never changes.

use crate::mcp::types::{
    CallToolResult, CompleteResult, GetPromptResult, InitializeResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, ReadResourceResult,
};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Names of the schemas a reply can be checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    /// Success envelope: `{jsonrpc: "2.0", id, result: {...}}`
    JsonRpcResponse,

    /// Error envelope: `{jsonrpc: "2.0", id, error: {code, message, data?}}`
    JsonRpcError,

    EmptyResult,
    InitializeResult,
    ListToolsResult,
    CallToolResult,
    ListPromptsResult,
    GetPromptResult,
    ListResourcesResult,
    ListResourceTemplatesResult,
    ReadResourceResult,
    CompleteResult,
}

impl Schema {
    /// Every schema, in declaration order
    pub const ALL: [Schema; 12] = [
        Self::JsonRpcResponse,
        Self::JsonRpcError,
        Self::EmptyResult,
        Self::InitializeResult,
        Self::ListToolsResult,
        Self::CallToolResult,
        Self::ListPromptsResult,
        Self::GetPromptResult,
        Self::ListResourcesResult,
        Self::ListResourceTemplatesResult,
        Self::ReadResourceResult,
        Self::CompleteResult,
    ];

    /// Schema definition name as it appears in the MCP JSON Schema
    pub fn name(&self) -> &'static str {
        match self {
            Self::JsonRpcResponse => "JSONRPCResponse",
            Self::JsonRpcError => "JSONRPCError",
            Self::EmptyResult => "EmptyResult",
            Self::InitializeResult => "InitializeResult",
            Self::ListToolsResult => "ListToolsResult",
            Self::CallToolResult => "CallToolResult",
            Self::ListPromptsResult => "ListPromptsResult",
            Self::GetPromptResult => "GetPromptResult",
            Self::ListResourcesResult => "ListResourcesResult",
            Self::ListResourceTemplatesResult => "ListResourceTemplatesResult",
            Self::ReadResourceResult => "ReadResourceResult",
            Self::CompleteResult => "CompleteResult",
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Schema oracle consumed by the client
pub trait ResultValidator: Send + Sync {
    /// Whether `value` conforms to `schema`
    fn is_valid(&self, schema: Schema, value: &Value) -> bool;
}

/// Predicate signature stored in the default table
pub type Predicate = fn(&Value) -> bool;

lazy_static! {
    static ref PREDICATES: HashMap<Schema, Predicate> = {
        let mut table: HashMap<Schema, Predicate> = HashMap::new();
        table.insert(Schema::JsonRpcResponse, is_jsonrpc_response);
        table.insert(Schema::JsonRpcError, is_jsonrpc_error);
        table.insert(Schema::EmptyResult, Value::is_object);
        table.insert(Schema::InitializeResult, conforms::<InitializeResult>);
        table.insert(Schema::ListToolsResult, is_list_tools_result);
        table.insert(Schema::CallToolResult, conforms::<CallToolResult>);
        table.insert(Schema::ListPromptsResult, conforms::<ListPromptsResult>);
        table.insert(Schema::GetPromptResult, conforms::<GetPromptResult>);
        table.insert(Schema::ListResourcesResult, conforms::<ListResourcesResult>);
        table.insert(
            Schema::ListResourceTemplatesResult,
            conforms::<ListResourceTemplatesResult>,
        );
        table.insert(Schema::ReadResourceResult, conforms::<ReadResourceResult>);
        table.insert(Schema::CompleteResult, conforms::<CompleteResult>);
        table
    };
}

/// Built-in validators mirroring the MCP schema definitions
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidators;

impl SchemaValidators {
    /// Look up the predicate for a schema
    pub fn predicate(schema: Schema) -> Option<Predicate> {
        PREDICATES.get(&schema).copied()
    }
}

impl ResultValidator for SchemaValidators {
    fn is_valid(&self, schema: Schema, value: &Value) -> bool {
        Self::predicate(schema).is_some_and(|predicate| predicate(value))
    }
}

fn conforms<T: DeserializeOwned>(value: &Value) -> bool {
    value.is_object() && T::deserialize(value).is_ok()
}

fn is_request_id(value: &Value) -> bool {
    value.is_string() || value.is_i64() || value.is_u64()
}

fn has_jsonrpc_version(envelope: &serde_json::Map<String, Value>) -> bool {
    envelope.get("jsonrpc").and_then(Value::as_str) == Some(crate::mcp::JSONRPC_VERSION)
}

fn is_jsonrpc_response(value: &Value) -> bool {
    let Some(envelope) = value.as_object() else {
        return false;
    };

    has_jsonrpc_version(envelope)
        && envelope.get("id").is_some_and(is_request_id)
        && envelope.get("result").is_some_and(Value::is_object)
        && !envelope.contains_key("error")
}

// Servers answer unparseable requests with a null id, so null is tolerated here.
fn is_jsonrpc_error(value: &Value) -> bool {
    let Some(envelope) = value.as_object() else {
        return false;
    };
    let Some(error) = envelope.get("error").and_then(Value::as_object) else {
        return false;
    };

    has_jsonrpc_version(envelope)
        && envelope
            .get("id")
            .is_some_and(|id| id.is_null() || is_request_id(id))
        && !envelope.contains_key("result")
        && error.get("code").is_some_and(|c| c.is_i64())
        && error.get("message").is_some_and(Value::is_string)
}

fn is_list_tools_result(value: &Value) -> bool {
    conforms::<ListToolsResult>(value)
        && value["tools"].as_array().is_some_and(|tools| {
            tools
                .iter()
                .all(|tool| tool["inputSchema"]["type"].as_str() == Some("object"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid(schema: Schema, value: Value) -> bool {
        SchemaValidators.is_valid(schema, &value)
    }

    #[test]
    fn test_every_schema_has_a_predicate() {
        for schema in Schema::ALL {
            assert!(
                SchemaValidators::predicate(schema).is_some(),
                "missing predicate for {}",
                schema
            );
        }
    }

    #[test]
    fn test_jsonrpc_response_envelope() {
        assert!(valid(
            Schema::JsonRpcResponse,
            json!({"jsonrpc": "2.0", "id": 1, "result": {}})
        ));
        assert!(valid(
            Schema::JsonRpcResponse,
            json!({"jsonrpc": "2.0", "id": "req-1", "result": {"tools": []}})
        ));

        assert!(!valid(
            Schema::JsonRpcResponse,
            json!({"message": "this is not a valid jsonrpc response"})
        ));
        assert!(!valid(
            Schema::JsonRpcResponse,
            json!({"jsonrpc": "1.0", "id": 1, "result": {}})
        ));
        assert!(!valid(
            Schema::JsonRpcResponse,
            json!({"jsonrpc": "2.0", "id": 1.5, "result": {}})
        ));
        assert!(!valid(
            Schema::JsonRpcResponse,
            json!({"jsonrpc": "2.0", "id": 1, "result": "ok"})
        ));
        assert!(!valid(Schema::JsonRpcResponse, json!([1, 2, 3])));
    }

    #[test]
    fn test_jsonrpc_error_envelope() {
        assert!(valid(
            Schema::JsonRpcError,
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "Method not found"}})
        ));
        assert!(valid(
            Schema::JsonRpcError,
            json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "Parse error", "data": "x"}})
        ));

        assert!(!valid(
            Schema::JsonRpcError,
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": "bad", "message": "m"}})
        ));
        assert!(!valid(
            Schema::JsonRpcError,
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": 1}})
        ));
        assert!(!valid(
            Schema::JsonRpcError,
            json!({"jsonrpc": "2.0", "id": 1, "result": {}, "error": {"code": 1, "message": "m"}})
        ));
    }

    #[test]
    fn test_success_and_error_are_exclusive() {
        let both = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {},
            "error": {"code": -32603, "message": "boom"}
        });

        assert!(!valid(Schema::JsonRpcResponse, both.clone()));
        assert!(!valid(Schema::JsonRpcError, both));
    }

    #[test]
    fn test_empty_result_accepts_any_object() {
        assert!(valid(Schema::EmptyResult, json!({})));
        assert!(valid(Schema::EmptyResult, json!({"_meta": {"x": 1}})));
        assert!(!valid(Schema::EmptyResult, json!(null)));
    }

    #[test]
    fn test_list_tools_result() {
        assert!(valid(
            Schema::ListToolsResult,
            json!({"tools": [{"name": "add", "inputSchema": {"type": "object"}}]})
        ));
        assert!(!valid(
            Schema::ListToolsResult,
            json!({"tools": [{"foo": "bar"}]})
        ));
        assert!(!valid(Schema::ListToolsResult, json!({"foo": "bar"})));
        assert!(!valid(
            Schema::ListToolsResult,
            json!({"tools": [{"name": "add", "inputSchema": {"type": "string"}}]})
        ));
    }

    #[test]
    fn test_result_shapes() {
        assert!(!valid(Schema::InitializeResult, json!({})));
        assert!(!valid(Schema::CallToolResult, json!({})));
        assert!(!valid(Schema::ListPromptsResult, json!({})));
        assert!(!valid(
            Schema::CompleteResult,
            json!({"values": [1, 2, 3], "total": 10, "hasMore": true})
        ));
        assert!(valid(
            Schema::CompleteResult,
            json!({"completion": {"values": ["one"], "hasMore": false}})
        ));
        assert!(valid(
            Schema::ReadResourceResult,
            json!({"contents": [{"uri": "file:///a", "text": "hello"}]})
        ));
        assert!(!valid(
            Schema::ReadResourceResult,
            json!({"contents": [{"text": "no uri"}]})
        ));
        assert!(valid(
            Schema::ListResourceTemplatesResult,
            json!({"resourceTemplates": [{"uriTemplate": "file:///{path}", "name": "files"}]})
        ));
    }

    #[test]
    fn test_schema_names() {
        assert_eq!(Schema::JsonRpcResponse.to_string(), "JSONRPCResponse");
        assert_eq!(Schema::CompleteResult.to_string(), "CompleteResult");
    }
}
