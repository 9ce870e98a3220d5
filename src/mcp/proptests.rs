//! Property-Based Tests for MCP Client
//!
//! This module contains property-based tests using proptest to verify invariants
//! hold for random inputs across the MCP client implementation.
//!
//! # Test Strategies
//!
//! - **Envelopes**: request ids round-trip exactly, notifications never carry one
//! - **Validation**: success/error envelopes are mutually exclusive, results
//!   come back unchanged
//! - **Session**: request ids grow by exactly one per outgoing message
//! - **SSE**: a single-line JSON payload survives event framing
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib mcp::proptests
//! ```

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::sync::Arc;

use crate::mcp::client::{Client, ClientOptions, ClientResponse};
use crate::mcp::error::{ClientError, TransportError};
use crate::mcp::protocol::{McpMethod, McpRequest, McpResponse, RequestId};
use crate::mcp::session::Session;
use crate::mcp::sse::parse_first_json_event;
use crate::mcp::transport::{
    Transport, TransportRequest, TransportRequestMeta, TransportResponse,
};
use crate::mcp::types::{ClientCapabilities, Implementation};
use crate::mcp::validators::{ResultValidator, Schema, SchemaValidators};
use async_trait::async_trait;

// Helper: Generate arbitrary JSON values
fn arb_json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z_]{1,8}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

// Helper: Generate arbitrary JSON objects
fn arb_json_object() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-zA-Z_]{1,8}", arb_json_value(), 0..4)
        .prop_map(|map| map.into_iter().collect())
}

fn arb_request_id() -> impl Strategy<Value = RequestId> {
    prop_oneof![
        any::<i64>().prop_map(RequestId::Number),
        ".*".prop_map(RequestId::String),
    ]
}

fn arb_method() -> impl Strategy<Value = McpMethod> {
    prop::sample::select(McpMethod::ALL.to_vec())
}

/// Transport echoing `{"jsonrpc":"2.0","id":<id>,"result":<fixed>}`
struct EchoTransport {
    result: Value,
}

#[async_trait]
impl Transport for EchoTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let envelope: Value = serde_json::from_str(&request.data).map_err(TransportError::InvalidJson)?;
        Ok(TransportResponse::new(json!({
            "jsonrpc": "2.0",
            "id": envelope["id"],
            "result": self.result,
        })))
    }
}

fn echo_client(result: Value) -> Client<EchoTransport> {
    Client::new(ClientOptions {
        client_info: Implementation::new("proptest", "0.0.0"),
        capabilities: ClientCapabilities::default(),
        transport: EchoTransport { result },
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Property 1: Envelope Shape
// ============================================================================

proptest! {
    /// Request ids are serialized exactly as given, with no coercion
    #[test]
    fn prop_request_id_roundtrip(id in arb_request_id(), method in arb_method()) {
        let request = McpRequest::new(Some(id.clone()), method, None);
        let serialized = serde_json::to_value(&request).unwrap();

        match &id {
            RequestId::Number(n) => prop_assert_eq!(&serialized["id"], &json!(n)),
            RequestId::String(s) => prop_assert_eq!(&serialized["id"], &json!(s)),
        }

        let deserialized: McpRequest = serde_json::from_value(serialized).unwrap();
        prop_assert_eq!(deserialized.id, Some(id));
    }

    /// Notifications never carry an id, whatever the params
    #[test]
    fn prop_notifications_have_no_id(
        method in arb_method(),
        params in prop::option::of(arb_json_object())
    ) {
        let notification = McpRequest::notification(method, params.map(Value::Object));
        let serialized = serde_json::to_value(&notification).unwrap();

        prop_assert!(serialized.get("id").is_none());
        prop_assert_eq!(&serialized["jsonrpc"], "2.0");
        prop_assert_eq!(&serialized["method"], method.as_str());
    }

    /// Method names parse back to the same variant; anything else is rejected
    #[test]
    fn prop_method_names_are_closed(method in arb_method(), junk in "[a-z]{1,12}") {
        prop_assert_eq!(McpMethod::from_str(method.as_str()).unwrap(), method);

        let unknown = format!("x-{}", junk);
        let is_unknown = matches!(
            McpMethod::from_str(&unknown),
            Err(ClientError::UnknownMethod(ref name)) if name == &unknown
        );
        prop_assert!(is_unknown);
    }
}

// ============================================================================
// Property 2: Validation
// ============================================================================

proptest! {
    /// No envelope is ever both a success and an error
    #[test]
    fn prop_success_and_error_are_exclusive(
        id in arb_request_id(),
        result in arb_json_object(),
        code in any::<i64>(),
        message in ".*"
    ) {
        let both = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
            "error": {"code": code, "message": message}
        });

        prop_assert!(!SchemaValidators.is_valid(Schema::JsonRpcResponse, &both));
        prop_assert!(!SchemaValidators.is_valid(Schema::JsonRpcError, &both));
    }

    /// Envelopes the validators accept always decode into the matching outcome
    #[test]
    fn prop_validated_envelopes_decode(
        id in arb_request_id(),
        result in arb_json_object(),
        code in any::<i64>(),
        message in ".*"
    ) {
        let ok = json!({"jsonrpc": "2.0", "id": id, "result": result});
        prop_assert!(SchemaValidators.is_valid(Schema::JsonRpcResponse, &ok));
        let decoded: McpResponse = serde_json::from_value(ok).unwrap();
        prop_assert_eq!(decoded.id.as_ref(), Some(&id));
        prop_assert_eq!(decoded.into_result().unwrap(), Value::Object(result));

        let err = json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}});
        prop_assert!(SchemaValidators.is_valid(Schema::JsonRpcError, &err));
        let decoded: McpResponse = serde_json::from_value(err).unwrap();
        let is_server_error = matches!(
            decoded.into_result(),
            Err(ClientError::Server(ref e)) if e.code == code && e.message == message
        );
        prop_assert!(is_server_error);
    }

    /// An object result comes back from the client unchanged
    #[test]
    fn prop_empty_result_identity(result in arb_json_object()) {
        let client = echo_client(Value::Object(result.clone()));
        let meta = TransportRequestMeta { request_id: Some(1.into()), session_id: None };

        let response = runtime().block_on(client.ping(meta)).unwrap();
        prop_assert_eq!(response.data, result);
    }

    /// A non-object result is never accepted
    #[test]
    fn prop_non_object_result_rejected(
        result in arb_json_value().prop_filter("non-object", |v| !v.is_object()),
        method in arb_method().prop_filter("request", |m| !m.is_notification())
    ) {
        let client = echo_client(result);
        let meta = TransportRequestMeta { request_id: Some(1.into()), session_id: None };

        let outcome: Result<ClientResponse<Value>, ClientError> =
            runtime().block_on(client.request(method, None, meta));
        prop_assert!(matches!(outcome, Err(ClientError::InvalidResponse)));
    }
}

// ============================================================================
// Property 3: Session Sequencing
// ============================================================================

proptest! {
    /// Each outgoing message takes exactly the next id
    #[test]
    fn prop_session_ids_increase_by_one(pings in 0usize..20, notifications in 0usize..5) {
        let result = json!({
            "protocolVersion": "2025-06-18",
            "serverInfo": {"name": "echo", "version": "1"},
            "capabilities": {}
        });
        let session = Session::new(echo_client(result));

        runtime().block_on(async {
            session.initialize(None).await.unwrap();
            for _ in 0..notifications {
                session.send_initialized_notification().await.unwrap();
            }
        });
        prop_assert_eq!(session.last_request_id(), 1 + notifications as i64);

        // EchoTransport answers pings with the initialize payload, which is still an object
        runtime().block_on(async {
            for _ in 0..pings {
                session.ping().await.unwrap();
            }
        });
        prop_assert_eq!(
            session.last_request_id(),
            1 + notifications as i64 + pings as i64
        );
    }
}

// ============================================================================
// Property 4: Event Stream Framing
// ============================================================================

proptest! {
    /// Any compact JSON value framed as one SSE event decodes to itself
    #[test]
    fn prop_sse_single_event_roundtrip(value in arb_json_value(), event in prop::option::of("[a-z]{1,8}")) {
        let mut body = String::new();
        if let Some(event) = event {
            body.push_str(&format!("event: {}\n", event));
        }
        body.push_str(&format!("data: {}\n\n", serde_json::to_string(&value).unwrap()));

        prop_assert_eq!(parse_first_json_event(&body).unwrap(), value);
    }
}

#[test]
fn test_echo_transport_is_shareable() {
    fn assert_transport<T: Transport>() {}
    assert_transport::<EchoTransport>();
    assert_transport::<Arc<dyn Transport>>();
}
