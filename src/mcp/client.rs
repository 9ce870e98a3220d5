//! MCP Client Layer
//!
//! This module provides the RPC client: one method per MCP operation, each
//! building a JSON-RPC envelope, delegating to a [`Transport`] and checking the
//! reply twice before handing it back.
//!
//! # Architecture
//!
//! The client is generic over the transport layer, allowing it to work
//! with different transport mechanisms (stdio, HTTP, etc.) through the
//! [`Transport`] trait.
//!
//! # Validation
//!
//! 1. The raw reply must be a JSON-RPC success or error envelope, otherwise
//!    [`ClientError::InvalidResponse`]. An error envelope becomes
//!    [`ClientError::Server`].
//! 2. The unwrapped `result` must conform to the operation's [`Schema`],
//!    otherwise [`ClientError::InvalidResult`].
//!
//! The client keeps no per-connection state. Request ids and session ids come
//! in through [`TransportRequestMeta`]; see [`Session`](crate::mcp::session::Session)
//! for the stateful wrapper.
//!
//! # Usage
//!
//! ```ignore
//! use mcp_client_sdk::mcp::{Client, ClientOptions, Implementation, TransportRequestMeta};
//!
//! let client = Client::new(ClientOptions {
//!     client_info: Implementation::new("my-client", "1.0.0"),
//!     capabilities: Default::default(),
//!     transport,
//! });
//!
//! let meta = TransportRequestMeta { request_id: Some(1.into()), session_id: None };
//! let response = client.initialize(None, meta).await?;
//! println!("connected to {}", response.data.server_info.name);
//! ```

use crate::mcp::error::ClientError;
use crate::mcp::protocol::{McpMethod, McpRequest, McpResponse, LATEST_PROTOCOL_VERSION};
use crate::mcp::transport::{Transport, TransportRequest, TransportRequestMeta, TransportResponseMeta};
use crate::mcp::types::{
    CallToolParams, CallToolResult, CancelledParams, ClientCapabilities, CompleteParams,
    CompleteResult, EmptyResult, GetPromptParams, GetPromptResult, Implementation,
    InitializeResult, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, PaginatedParams, ReadResourceParams, ReadResourceResult, SetLevelParams,
    SubscribeParams,
};
use crate::mcp::validators::{ResultValidator, Schema, SchemaValidators};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Construction options for [`Client`]
pub struct ClientOptions<T> {
    /// Identity advertised during `initialize`
    pub client_info: Implementation,

    /// Capabilities advertised during `initialize`
    pub capabilities: ClientCapabilities,

    pub transport: T,
}

/// A validated result plus whatever the transport learned on the way
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse<R> {
    pub data: R,
    pub meta: TransportResponseMeta,
}

/// MCP RPC client
///
/// # Type Parameters
///
/// * `T` - The transport type (e.g., `StdioTransport`, `HttpTransport`)
pub struct Client<T>
where
    T: Transport,
{
    /// Underlying transport for sending/receiving messages
    transport: T,

    client_info: Implementation,

    capabilities: ClientCapabilities,

    /// Schema oracle for replies
    validators: Arc<dyn ResultValidator>,
}

impl<T> Client<T>
where
    T: Transport,
{
    /// Create a client using the built-in [`SchemaValidators`]
    pub fn new(options: ClientOptions<T>) -> Self {
        Self {
            transport: options.transport,
            client_info: options.client_info,
            capabilities: options.capabilities,
            validators: Arc::new(SchemaValidators),
        }
    }

    /// Replace the schema oracle (e.g. with predicates generated from the
    /// protocol's JSON Schema)
    pub fn with_validators(mut self, validators: Arc<dyn ResultValidator>) -> Self {
        self.validators = validators;
        self
    }

    /// Get a reference to the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn client_info(&self) -> &Implementation {
        &self.client_info
    }

    pub fn capabilities(&self) -> &ClientCapabilities {
        &self.capabilities
    }

    /// Send an arbitrary request and validate the reply against the method's
    /// result schema
    ///
    /// The typed methods below are thin wrappers around this. `R = Value`
    /// returns the validated `result` exactly as the server sent it.
    pub async fn request<R>(
        &self,
        method: McpMethod,
        params: Option<Value>,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<R>, ClientError>
    where
        R: DeserializeOwned,
    {
        let envelope = McpRequest::new(meta.request_id.clone(), method, params);
        let request = TransportRequest {
            data: serde_json::to_string(&envelope)?,
            meta,
        };

        let response = self.transport.send(request).await?;
        let result = self.unwrap_envelope(response.data)?;

        let schema = method.result_schema().unwrap_or(Schema::EmptyResult);
        if !self.validators.is_valid(schema, &result) {
            tracing::debug!("Result of {} does not match {}: {}", method, schema, result);
            return Err(ClientError::InvalidResult { schema });
        }

        let data = serde_json::from_value(result).map_err(|e| {
            tracing::debug!("Result of {} failed to deserialize: {}", method, e);
            ClientError::InvalidResult { schema }
        })?;

        Ok(ClientResponse {
            data,
            meta: response.meta,
        })
    }

    /// Send a notification (an envelope without `id`)
    pub async fn notify(
        &self,
        method: McpMethod,
        params: Option<Value>,
        meta: TransportRequestMeta,
    ) -> Result<TransportResponseMeta, ClientError> {
        let envelope = McpRequest::notification(method, params);
        let request = TransportRequest {
            data: serde_json::to_string(&envelope)?,
            meta,
        };

        Ok(self.transport.notify(request).await?)
    }

    /// Check the JSON-RPC envelope and pull out `result`
    ///
    /// The validators decide whether `data` is an envelope at all; only then
    /// is it decoded into an [`McpResponse`].
    fn unwrap_envelope(&self, data: Value) -> Result<Value, ClientError> {
        let is_envelope = self.validators.is_valid(Schema::JsonRpcResponse, &data)
            || self.validators.is_valid(Schema::JsonRpcError, &data);
        if !is_envelope {
            tracing::debug!("Invalid JSON-RPC response: {}", data);
            return Err(ClientError::InvalidResponse);
        }

        let response: McpResponse =
            serde_json::from_value(data).map_err(|_| ClientError::InvalidResponse)?;
        response.into_result().inspect_err(|e| {
            if let ClientError::Server(error) = e {
                tracing::debug!("MCP server returned error: {}", error);
            }
        })
    }

    fn to_params<P: Serialize>(params: &P) -> Result<Option<Value>, ClientError> {
        Ok(Some(serde_json::to_value(params)?))
    }

    fn to_optional_params<P: Serialize>(
        params: Option<&P>,
    ) -> Result<Option<Value>, ClientError> {
        params.map(serde_json::to_value).transpose().map_err(Into::into)
    }

    /// Perform the `initialize` handshake
    ///
    /// `protocolVersion`, `clientInfo` and `capabilities` are filled in from
    /// the client's options; any key in `params` overrides them.
    ///
    /// # Returns
    ///
    /// The server's [`InitializeResult`] plus response metadata, which carries
    /// the session id on HTTP transports.
    pub async fn initialize(
        &self,
        params: Option<Map<String, Value>>,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<InitializeResult>, ClientError> {
        let mut merged = Map::new();
        merged.insert(
            "protocolVersion".to_string(),
            json!(LATEST_PROTOCOL_VERSION),
        );
        merged.insert(
            "clientInfo".to_string(),
            serde_json::to_value(&self.client_info)?,
        );
        merged.insert(
            "capabilities".to_string(),
            serde_json::to_value(&self.capabilities)?,
        );
        merged.extend(params.unwrap_or_default());

        tracing::info!(
            "Initializing MCP connection as {} {}",
            self.client_info.name,
            self.client_info.version
        );

        self.request(McpMethod::Initialize, Some(Value::Object(merged)), meta)
            .await
    }

    /// Liveness check
    pub async fn ping(
        &self,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<EmptyResult>, ClientError> {
        self.request(McpMethod::Ping, None, meta).await
    }

    /// Ask the server to send log messages at `params.level` and above
    pub async fn set_logging_level(
        &self,
        params: SetLevelParams,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<EmptyResult>, ClientError> {
        self.request(McpMethod::LoggingSetLevel, Self::to_params(&params)?, meta)
            .await
    }

    /// Argument autocompletion for a prompt or resource template
    pub async fn complete(
        &self,
        params: CompleteParams,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<CompleteResult>, ClientError> {
        self.request(McpMethod::CompletionComplete, Self::to_params(&params)?, meta)
            .await
    }

    /// List available tools (one page)
    pub async fn list_tools(
        &self,
        params: Option<PaginatedParams>,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<ListToolsResult>, ClientError> {
        self.request(
            McpMethod::ToolsList,
            Self::to_optional_params(params.as_ref())?,
            meta,
        )
        .await
    }

    /// Invoke a tool
    ///
    /// A tool that ran but failed is reported in-band through
    /// `CallToolResult::is_error`, not as a `ClientError`.
    pub async fn call_tool(
        &self,
        params: CallToolParams,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<CallToolResult>, ClientError> {
        tracing::debug!("Calling tool: {}", params.name);
        self.request(McpMethod::ToolsCall, Self::to_params(&params)?, meta)
            .await
    }

    pub async fn list_prompts(
        &self,
        params: Option<PaginatedParams>,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<ListPromptsResult>, ClientError> {
        self.request(
            McpMethod::PromptsList,
            Self::to_optional_params(params.as_ref())?,
            meta,
        )
        .await
    }

    pub async fn get_prompt(
        &self,
        params: GetPromptParams,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<GetPromptResult>, ClientError> {
        self.request(McpMethod::PromptsGet, Self::to_params(&params)?, meta)
            .await
    }

    pub async fn list_resources(
        &self,
        params: Option<PaginatedParams>,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<ListResourcesResult>, ClientError> {
        self.request(
            McpMethod::ResourcesList,
            Self::to_optional_params(params.as_ref())?,
            meta,
        )
        .await
    }

    pub async fn read_resource(
        &self,
        params: ReadResourceParams,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<ReadResourceResult>, ClientError> {
        self.request(McpMethod::ResourcesRead, Self::to_params(&params)?, meta)
            .await
    }

    pub async fn subscribe_resource(
        &self,
        params: SubscribeParams,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<EmptyResult>, ClientError> {
        self.request(McpMethod::ResourcesSubscribe, Self::to_params(&params)?, meta)
            .await
    }

    pub async fn unsubscribe_resource(
        &self,
        params: SubscribeParams,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<EmptyResult>, ClientError> {
        self.request(
            McpMethod::ResourcesUnsubscribe,
            Self::to_params(&params)?,
            meta,
        )
        .await
    }

    pub async fn list_resource_templates(
        &self,
        params: Option<PaginatedParams>,
        meta: TransportRequestMeta,
    ) -> Result<ClientResponse<ListResourceTemplatesResult>, ClientError> {
        self.request(
            McpMethod::ResourcesTemplatesList,
            Self::to_optional_params(params.as_ref())?,
            meta,
        )
        .await
    }

    /// Tell the server the handshake is complete
    pub async fn send_initialized_notification(
        &self,
        meta: TransportRequestMeta,
    ) -> Result<TransportResponseMeta, ClientError> {
        self.notify(McpMethod::InitializedNotification, None, meta)
            .await
    }

    /// Tell the server the client's roots changed
    pub async fn send_roots_list_changed_notification(
        &self,
        meta: TransportRequestMeta,
    ) -> Result<TransportResponseMeta, ClientError> {
        self.notify(McpMethod::RootsListChangedNotification, None, meta)
            .await
    }

    /// Tell the server to abandon an in-flight request
    pub async fn send_cancelled_notification(
        &self,
        params: CancelledParams,
        meta: TransportRequestMeta,
    ) -> Result<TransportResponseMeta, ClientError> {
        self.notify(
            McpMethod::CancelledNotification,
            Self::to_params(&params)?,
            meta,
        )
        .await
    }
}
