//! MCP HTTP Transport Layer
//!
//! This module implements HTTP-based transport for communicating with MCP servers.
//!
//! # Architecture
//!
//! Every message is one HTTP POST. The server may answer with either:
//!
//! 1. **JSON**: `content-type: application/json`, body is the reply
//! 2. **Event stream**: `content-type: text/event-stream`, the first event's
//!    `data:` payload is the reply
//!
//! The actual HTTP I/O is delegated to an [`HttpAdapter`], so the transport's
//! decoding rules can be exercised without a network. [`ReqwestAdapter`] is the
//! production adapter.
//!
//! # Sessions
//!
//! A session id handed to [`Transport::send`] is forwarded as the
//! `Mcp-Session-Id` request header; an `mcp-session-id` response header is
//! surfaced in the response metadata.
//!
//! # Authorization
//!
//! A 401 answer becomes [`TransportError::Unauthorized`]. When the
//! `www-authenticate` challenge carries `resource_metadata="..."`, its value is
//! kept so the caller can start an authorization flow.
//!
//! # Example
//!
//! ```ignore
//! use mcp_client_sdk::mcp::{HttpTransport, HttpTransportOptions, ReqwestAdapter};
//!
//! let adapter = Arc::new(ReqwestAdapter::new(Duration::from_secs(30))?);
//! let transport = HttpTransport::new(
//!     HttpTransportOptions::new("https://mcp.example.com/mcp", adapter)
//!         .header("Authorization", "Bearer token"),
//! );
//! ```

use crate::mcp::error::TransportError;
use crate::mcp::sse::parse_first_json_event;
use crate::mcp::transport::{
    Transport, TransportRequest, TransportResponse, TransportResponseMeta,
};
use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const CONTENT_TYPE: &str = "Content-Type";
const ACCEPT: &str = "Accept";
const JSON_MEDIA_TYPE: &str = "application/json";
const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";
const ACCEPT_VALUE: &str = "application/json,text/event-stream";

/// Request header carrying the session id
pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

lazy_static! {
    static ref RESOURCE_METADATA_REGEX: Regex = Regex::new(r#"resource_metadata="([^"]*)""#)
        .expect("Invalid regex for resource metadata");
}

/// An HTTP request handed to an [`HttpAdapter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

/// An HTTP response produced by an [`HttpAdapter`]
///
/// [`with_header`](Self::with_header) stores names lowercased, but adapters may
/// fill `headers` directly; lookups never depend on the stored case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs the raw HTTP exchange for [`HttpTransport`]
///
/// Adapters report connection-level failures only. Status codes, including
/// errors, are returned as ordinary responses.
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    async fn request_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Options for [`HttpTransport`]
#[derive(Clone)]
pub struct HttpTransportOptions {
    /// MCP server endpoint URL
    pub url: String,

    /// Extra headers sent with every request (e.g. authentication)
    pub headers: HashMap<String, String>,

    pub adapter: Arc<dyn HttpAdapter>,
}

impl HttpTransportOptions {
    pub fn new(url: impl Into<String>, adapter: Arc<dyn HttpAdapter>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            adapter,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// HTTP transport for remote MCP servers
///
/// Stateless apart from its options: the session id travels in each
/// request's metadata, so one transport can be shared freely.
pub struct HttpTransport {
    options: HttpTransportOptions,
}

impl HttpTransport {
    pub fn new(options: HttpTransportOptions) -> Self {
        Self { options }
    }

    /// Get the server URL
    pub fn url(&self) -> &str {
        &self.options.url
    }

    /// Headers for one POST
    ///
    /// Caller headers go first; `Content-Type` and `Accept` always carry the
    /// protocol values regardless of what the caller configured.
    fn build_headers(&self, session_id: Option<&str>) -> HashMap<String, String> {
        let mut headers: HashMap<String, String> = self
            .options
            .headers
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case(CONTENT_TYPE) && !name.eq_ignore_ascii_case(ACCEPT)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        headers.insert(CONTENT_TYPE.to_string(), JSON_MEDIA_TYPE.to_string());
        headers.insert(ACCEPT.to_string(), ACCEPT_VALUE.to_string());

        if let Some(session_id) = session_id {
            headers.retain(|name, _| !name.eq_ignore_ascii_case(SESSION_ID_HEADER));
            headers.insert(SESSION_ID_HEADER.to_string(), session_id.to_string());
        }

        headers
    }

    async fn post(&self, request: TransportRequest) -> Result<HttpResponse, TransportError> {
        tracing::debug!("Sending HTTP POST to {}: {}", self.options.url, request.data);

        let http_request = HttpRequest {
            url: self.options.url.clone(),
            method: "POST".to_string(),
            headers: self.build_headers(request.meta.session_id.as_deref()),
            body: Some(request.data),
        };

        let response = self.options.adapter.request_json(http_request).await?;
        tracing::debug!("Received HTTP response with status {}", response.status);

        if response.status == 401 {
            let resource_metadata_url = response
                .header("www-authenticate")
                .and_then(parse_resource_metadata_url);
            tracing::warn!(
                "MCP server at {} requires authorization (resource metadata: {:?})",
                self.options.url,
                resource_metadata_url
            );
            return Err(TransportError::Unauthorized {
                resource_metadata_url,
            });
        }

        Ok(response)
    }

    fn response_meta(response: &HttpResponse) -> TransportResponseMeta {
        TransportResponseMeta {
            session_id: response.header("mcp-session-id").map(str::to_string),
        }
    }

    fn decode_body(response: &HttpResponse) -> Result<Value, TransportError> {
        let content_type = response
            .header("content-type")
            .ok_or(TransportError::MissingContentType)?;
        let body = response.body.as_ref().ok_or(TransportError::MissingBody)?;

        match media_type(content_type).as_str() {
            JSON_MEDIA_TYPE => serde_json::from_slice(body).map_err(TransportError::InvalidJson),
            EVENT_STREAM_MEDIA_TYPE => parse_first_json_event(&String::from_utf8_lossy(body)),
            _ => Err(TransportError::UnsupportedContentType(
                content_type.to_string(),
            )),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let response = self.post(request).await?;
        let data = Self::decode_body(&response)?;

        Ok(TransportResponse {
            data,
            meta: Self::response_meta(&response),
        })
    }

    async fn notify(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponseMeta, TransportError> {
        let response = self.post(request).await?;
        if !response.is_success() {
            return Err(TransportError::UnexpectedStatus(response.status));
        }

        Ok(Self::response_meta(&response))
    }

    fn uses_session_affinity(&self) -> bool {
        true
    }
}

/// Extract the `resource_metadata` parameter of a `www-authenticate` challenge
pub fn parse_resource_metadata_url(challenge: &str) -> Option<String> {
    RESOURCE_METADATA_REGEX
        .captures(challenge)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// `"Application/JSON; charset=utf-8"` -> `"application/json"`
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// [`HttpAdapter`] backed by `reqwest`
pub struct ReqwestAdapter {
    client: reqwest::Client,
}

impl ReqwestAdapter {
    /// Build an adapter whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap a preconfigured client (proxies, TLS roots, ...)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpAdapter for ReqwestAdapter {
    async fn request_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body: (!body.is_empty()).then_some(body),
        })
    }
}
