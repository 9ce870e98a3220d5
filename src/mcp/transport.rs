//! MCP Transport Layer
//!
//! This module defines the transport abstraction for communicating with MCP servers.
//! Two transports are provided:
//!
//! - **stdio**: newline-delimited JSON over a child process's stdin/stdout
//! - **HTTP**: one POST per call, see [`crate::mcp::http_transport`]
//!
//! # Architecture
//!
//! The transport layer moves serialized messages and nothing else. It never
//! inspects JSON-RPC semantics; envelope and result validation happen in the
//! client layer.

use crate::mcp::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// Metadata attached to an outgoing message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportRequestMeta {
    /// The JSON-RPC id of the request
    pub request_id: Option<crate::mcp::RequestId>,

    /// The session id to present to the server
    pub session_id: Option<String>,
}

/// A serialized message plus its metadata
///
/// Built fresh by the client for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Serialized JSON-RPC envelope
    pub data: String,

    pub meta: TransportRequestMeta,
}

/// Metadata discovered by the transport while receiving a reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponseMeta {
    /// Session id announced by the server
    pub session_id: Option<String>,
}

/// A parsed reply plus its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// Parsed JSON payload (not yet validated)
    pub data: Value,

    pub meta: TransportResponseMeta,
}

impl TransportResponse {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            meta: TransportResponseMeta::default(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.meta.session_id = Some(session_id.into());
        self
    }
}

/// Transport trait for MCP communication
///
/// All transports implement this trait, enabling the client to work with
/// different channels. Each `send` is one request and one reply; callers wait
/// for the reply before reusing a channel that cannot multiplex.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a request and wait for its reply
    ///
    /// Failures are reported through the `Err` side, never as a malformed
    /// success.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Deliver a notification; no reply payload is expected
    async fn notify(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponseMeta, TransportError> {
        Ok(self.send(request).await?.meta)
    }

    /// Whether the server must hand out a session id during `initialize`
    fn uses_session_affinity(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }

    async fn notify(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponseMeta, TransportError> {
        (**self).notify(request).await
    }

    fn uses_session_affinity(&self) -> bool {
        (**self).uses_session_affinity()
    }
}

/// Options for [`StdioTransport`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StdioTransportOptions {
    /// The executable to run to start the server
    pub command: String,

    /// Command line arguments
    pub args: Vec<String>,

    /// Working directory; inherited from this process when unset
    pub cwd: Option<PathBuf>,
}

impl StdioTransportOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Open pipes to a running server
struct StdioChannel {
    /// Child process handle (absent when built from raw streams)
    child: Option<Child>,

    /// Server's stdin
    writer: BoxedWriter,

    /// Server's stdout
    reader: BufReader<BoxedReader>,

    /// Reusable buffer for reading lines
    line_buffer: String,
}

/// stdio transport for local MCP servers
///
/// `start()` spawns the server with piped stdin/stdout and inherited stderr so
/// server logs stay visible. Each `send()` writes one JSON line and reads the
/// next line back.
///
/// The pipe lock is held from the write until the reply line is read, so
/// overlapping `send()` calls are serialized instead of cross-wired.
///
/// # Example
///
/// ```ignore
/// let transport = StdioTransport::new(
///     StdioTransportOptions::new("npx").args(["-y", "@modelcontextprotocol/server-everything"]),
/// );
/// transport.start().await?;
/// let response = transport.send(request).await?;
/// transport.stop().await?;
/// ```
pub struct StdioTransport {
    options: StdioTransportOptions,
    channel: Mutex<Option<StdioChannel>>,
}

impl StdioTransport {
    /// Create a transport; nothing is spawned until [`start`](Self::start)
    pub fn new(options: StdioTransportOptions) -> Self {
        Self {
            options,
            channel: Mutex::new(None),
        }
    }

    /// Create an already-connected transport over arbitrary streams
    ///
    /// `reader` yields the server's output, `writer` receives the client's
    /// messages. Useful for in-process servers and tests.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            options: StdioTransportOptions::default(),
            channel: Mutex::new(Some(StdioChannel {
                child: None,
                writer: Box::new(writer),
                reader: BufReader::new(Box::new(reader)),
                line_buffer: String::with_capacity(4096),
            })),
        }
    }

    /// Get the server command string (for diagnostics)
    pub fn command(&self) -> String {
        if self.options.args.is_empty() {
            self.options.command.clone()
        } else {
            format!("{} {}", self.options.command, self.options.args.join(" "))
        }
    }

    pub fn options(&self) -> &StdioTransportOptions {
        &self.options
    }

    /// Whether pipes to a server are open
    pub async fn is_running(&self) -> bool {
        self.channel.lock().await.is_some()
    }

    /// Spawn the server process
    pub async fn start(&self) -> Result<(), TransportError> {
        let mut guard = self.channel.lock().await;
        if guard.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        tracing::info!("Spawning MCP server: {}", self.command());

        let mut command = Command::new(&self.options.command);
        command
            .args(&self.options.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &self.options.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(TransportError::Spawn)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(TransportError::NotStarted);
        };

        *guard = Some(StdioChannel {
            child: Some(child),
            writer: Box::new(stdin),
            reader: BufReader::new(Box::new(stdout)),
            line_buffer: String::with_capacity(4096),
        });

        Ok(())
    }

    /// Terminate the server process and drop the pipes
    ///
    /// Calling `stop` on a transport that is not running is a no-op.
    pub async fn stop(&self) -> Result<(), TransportError> {
        let Some(channel) = self.channel.lock().await.take() else {
            return Ok(());
        };

        if let Some(mut child) = channel.child {
            tracing::info!("Killing MCP server: {}", self.command());
            child.kill().await?;
        }

        Ok(())
    }

    async fn write_line(channel: &mut StdioChannel, data: &str) -> Result<(), TransportError> {
        tracing::debug!("Sending to MCP server: {}", data);

        channel.writer.write_all(data.as_bytes()).await?;
        channel.writer.write_all(b"\n").await?;
        channel.writer.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(TransportError::NotStarted)?;

        Self::write_line(channel, &request.data).await?;

        channel.line_buffer.clear();
        let bytes_read = channel.reader.read_line(&mut channel.line_buffer).await?;
        if bytes_read == 0 {
            return Err(TransportError::Closed);
        }

        let line = channel.line_buffer.trim_end();
        tracing::debug!("Received from MCP server: {}", line);

        let data: Value = serde_json::from_str(line).map_err(|e| {
            tracing::warn!("MCP server wrote a non-JSON line: {}", line);
            TransportError::InvalidJson(e)
        })?;

        Ok(TransportResponse::new(data))
    }

    async fn notify(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponseMeta, TransportError> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(TransportError::NotStarted)?;

        Self::write_line(channel, &request.data).await?;

        Ok(TransportResponseMeta::default())
    }
}
