//! MCP Session
//!
//! [`Session`] wraps a [`Client`] and owns the state of one logical
//! connection:
//!
//! - **Request ids**: a monotonic counter starting at 0; every outgoing
//!   request or notification takes the next value, so the first id is 1.
//! - **Session id**: captured from the `initialize` reply and attached to
//!   every later call.
//! - **Initialization gate**: nothing but `initialize` is allowed until the
//!   handshake has succeeded.
//!
//! # Lifecycle
//!
//! ```ignore
//! let session = Session::new(client);
//! let server = session.initialize(None).await?;
//! session.send_initialized_notification().await?;
//! let tools = session.list_tools(None).await?;
//! ```

use crate::mcp::client::{Client, ClientResponse};
use crate::mcp::error::ClientError;
use crate::mcp::protocol::RequestId;
use crate::mcp::transport::{Transport, TransportRequestMeta, TransportResponseMeta};
use crate::mcp::types::{
    CallToolParams, CallToolResult, CancelledParams, CompleteParams, CompleteResult,
    EmptyResult, GetPromptParams, GetPromptResult, InitializeResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, LoggingLevel,
    PaginatedParams, ReadResourceParams, ReadResourceResult, SetLevelParams, SubscribeParams,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Stateful wrapper around [`Client`]
///
/// All methods take `&self`; the session can be shared behind an `Arc`.
/// Concurrent calls get unique, increasing ids, but their order on the wire
/// is up to the transport.
pub struct Session<T>
where
    T: Transport,
{
    client: Client<T>,

    /// Server-assigned session id
    session_id: Mutex<Option<String>>,

    /// Last id handed out (0 = none yet)
    last_request_id: AtomicI64,

    /// Set once `initialize` succeeds
    initialized: AtomicBool,
}

impl<T> Session<T>
where
    T: Transport,
{
    /// Create an uninitialized session
    pub fn new(client: Client<T>) -> Self {
        Self {
            client,
            session_id: Mutex::new(None),
            last_request_id: AtomicI64::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Reattach to a session the server already knows
    ///
    /// The handshake is assumed to have happened in an earlier session, so
    /// the gate starts open.
    pub fn resume(client: Client<T>, session_id: impl Into<String>) -> Self {
        let session = Self::new(client);
        session.set_session_id(Some(session_id.into()));
        session.initialized.store(true, Ordering::SeqCst);
        session
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    /// Current session id, if the server assigned one
    pub fn session_id(&self) -> Option<String> {
        self.lock_session_id().clone()
    }

    /// Override the session id
    pub fn set_session_id(&self, session_id: Option<String>) {
        *self.lock_session_id() = session_id;
    }

    /// Id of the most recent outgoing message (0 before the first one)
    pub fn last_request_id(&self) -> i64 {
        self.last_request_id.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn lock_session_id(&self) -> MutexGuard<'_, Option<String>> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.last_request_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Metadata for a post-handshake call; allocates an id only once the gate is open
    fn request_meta(&self) -> Result<TransportRequestMeta, ClientError> {
        if !self.is_initialized() {
            return Err(ClientError::NotInitialized);
        }

        Ok(TransportRequestMeta {
            request_id: Some(self.next_request_id()),
            session_id: self.session_id(),
        })
    }

    /// Keep the initialize-time session id, but flag a server that changes it
    fn observe(&self, meta: &TransportResponseMeta) {
        let Some(announced) = meta.session_id.as_deref() else {
            return;
        };

        let current = self.lock_session_id();
        if current.as_deref() != Some(announced) {
            tracing::warn!(
                "MCP server announced session id {} but session is bound to {:?}; keeping the original",
                announced,
                *current
            );
        }
    }

    fn take_data<R>(&self, response: ClientResponse<R>) -> R {
        self.observe(&response.meta);
        response.data
    }

    /// Perform the `initialize` handshake
    ///
    /// Uses the next request id and no session id. On transports with session
    /// affinity (HTTP) the reply must carry a session id, otherwise this fails
    /// with [`ClientError::MissingSessionId`] and the session stays closed.
    pub async fn initialize(
        &self,
        params: Option<Map<String, Value>>,
    ) -> Result<InitializeResult, ClientError> {
        let meta = TransportRequestMeta {
            request_id: Some(self.next_request_id()),
            session_id: None,
        };

        let response = self.client.initialize(params, meta).await?;

        match response.meta.session_id {
            Some(session_id) => {
                tracing::info!("MCP session established: {}", session_id);
                self.set_session_id(Some(session_id));
            }
            None if self.client.transport().uses_session_affinity() => {
                return Err(ClientError::MissingSessionId);
            }
            None => {
                tracing::debug!("MCP server did not assign a session id");
            }
        }

        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!(
            "Initialized MCP session with {} {} (protocol {})",
            response.data.server_info.name,
            response.data.server_info.version,
            response.data.protocol_version
        );

        Ok(response.data)
    }

    pub async fn ping(&self) -> Result<EmptyResult, ClientError> {
        let response = self.client.ping(self.request_meta()?).await?;
        Ok(self.take_data(response))
    }

    pub async fn set_logging_level(&self, level: LoggingLevel) -> Result<EmptyResult, ClientError> {
        let response = self
            .client
            .set_logging_level(SetLevelParams { level }, self.request_meta()?)
            .await?;
        Ok(self.take_data(response))
    }

    pub async fn complete(&self, params: CompleteParams) -> Result<CompleteResult, ClientError> {
        let response = self.client.complete(params, self.request_meta()?).await?;
        Ok(self.take_data(response))
    }

    pub async fn list_tools(
        &self,
        params: Option<PaginatedParams>,
    ) -> Result<ListToolsResult, ClientError> {
        let response = self.client.list_tools(params, self.request_meta()?).await?;
        Ok(self.take_data(response))
    }

    pub async fn call_tool(&self, params: CallToolParams) -> Result<CallToolResult, ClientError> {
        let response = self.client.call_tool(params, self.request_meta()?).await?;
        Ok(self.take_data(response))
    }

    pub async fn list_prompts(
        &self,
        params: Option<PaginatedParams>,
    ) -> Result<ListPromptsResult, ClientError> {
        let response = self
            .client
            .list_prompts(params, self.request_meta()?)
            .await?;
        Ok(self.take_data(response))
    }

    pub async fn get_prompt(&self, params: GetPromptParams) -> Result<GetPromptResult, ClientError> {
        let response = self.client.get_prompt(params, self.request_meta()?).await?;
        Ok(self.take_data(response))
    }

    pub async fn list_resources(
        &self,
        params: Option<PaginatedParams>,
    ) -> Result<ListResourcesResult, ClientError> {
        let response = self
            .client
            .list_resources(params, self.request_meta()?)
            .await?;
        Ok(self.take_data(response))
    }

    pub async fn read_resource(
        &self,
        params: ReadResourceParams,
    ) -> Result<ReadResourceResult, ClientError> {
        let response = self
            .client
            .read_resource(params, self.request_meta()?)
            .await?;
        Ok(self.take_data(response))
    }

    pub async fn subscribe_resource(
        &self,
        params: SubscribeParams,
    ) -> Result<EmptyResult, ClientError> {
        let response = self
            .client
            .subscribe_resource(params, self.request_meta()?)
            .await?;
        Ok(self.take_data(response))
    }

    pub async fn unsubscribe_resource(
        &self,
        params: SubscribeParams,
    ) -> Result<EmptyResult, ClientError> {
        let response = self
            .client
            .unsubscribe_resource(params, self.request_meta()?)
            .await?;
        Ok(self.take_data(response))
    }

    pub async fn list_resource_templates(
        &self,
        params: Option<PaginatedParams>,
    ) -> Result<ListResourceTemplatesResult, ClientError> {
        let response = self
            .client
            .list_resource_templates(params, self.request_meta()?)
            .await?;
        Ok(self.take_data(response))
    }

    pub async fn send_initialized_notification(&self) -> Result<(), ClientError> {
        let meta = self
            .client
            .send_initialized_notification(self.request_meta()?)
            .await?;
        self.observe(&meta);
        Ok(())
    }

    pub async fn send_roots_list_changed_notification(&self) -> Result<(), ClientError> {
        let meta = self
            .client
            .send_roots_list_changed_notification(self.request_meta()?)
            .await?;
        self.observe(&meta);
        Ok(())
    }

    pub async fn send_cancelled_notification(
        &self,
        params: CancelledParams,
    ) -> Result<(), ClientError> {
        let meta = self
            .client
            .send_cancelled_notification(params, self.request_meta()?)
            .await?;
        self.observe(&meta);
        Ok(())
    }
}
