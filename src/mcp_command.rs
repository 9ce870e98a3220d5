//! MCP Command Module
//!
//! This module encapsulates the MCP operations behind the CLI.
//! It provides a clean abstraction layer between the CLI (main.rs)
//! and the session/transport stack.
//!
//! # Design
//!
//! - Separation of concerns: CLI logic in main.rs, connection handling here
//! - One code path for every server: stdio and HTTP servers both end up as a
//!   `Session<Arc<dyn Transport>>`
//! - Structured results: every operation returns the server's JSON result

use crate::config::{Config, ServerConfig, TransportKind};
use crate::mcp::{
    CallToolParams, Client, ClientCapabilities, ClientOptions, HttpTransport,
    HttpTransportOptions, Implementation, PaginatedParams, ReadResourceParams, ReqwestAdapter,
    Session, StdioTransport, StdioTransportOptions, Tool, Transport,
};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Operations the CLI can run against a server
#[derive(Debug, Clone, PartialEq)]
pub enum McpOperation {
    /// Liveness check
    Ping,

    /// List every tool (all pages)
    ListTools,

    /// Invoke one tool
    CallTool {
        name: String,
        arguments: Option<Map<String, Value>>,
    },

    ListPrompts,

    ListResources,

    ReadResource { uri: String },
}

/// An initialized session plus the process backing it, if any
pub struct Connection {
    session: Session<Arc<dyn Transport>>,

    /// Set for stdio servers so the child can be stopped
    process: Option<Arc<StdioTransport>>,
}

impl Connection {
    /// Open a connection to a configured server
    ///
    /// Spawns the process for stdio servers, then performs the `initialize`
    /// handshake and sends `notifications/initialized`.
    pub async fn open(config: &Config, server_name: &str) -> Result<Self> {
        let server = config.server(server_name)?;
        let (transport, process) = build_transport(config, server)?;

        if let Some(process) = &process {
            process
                .start()
                .await
                .with_context(|| format!("Failed to start MCP server '{}'", server_name))?;
        }

        let client = Client::new(ClientOptions {
            client_info: Implementation::new(&config.client.name, &config.client.version),
            capabilities: ClientCapabilities::default(),
            transport,
        });

        let connection = Self {
            session: Session::new(client),
            process,
        };

        if let Err(e) = connection.handshake(server_name).await {
            connection.close_quietly().await;
            return Err(e);
        }

        Ok(connection)
    }

    async fn handshake(&self, server_name: &str) -> Result<()> {
        info!("Connecting to MCP server '{}'...", server_name);

        let result = self
            .session
            .initialize(None)
            .await
            .with_context(|| format!("Failed to initialize MCP server '{}'", server_name))?;

        self.session
            .send_initialized_notification()
            .await
            .context("Failed to send initialized notification")?;

        info!(
            "Connected to {} {}",
            result.server_info.name, result.server_info.version
        );
        Ok(())
    }

    pub fn session(&self) -> &Session<Arc<dyn Transport>> {
        &self.session
    }

    /// Run one operation and return its result as JSON
    pub async fn run(&self, operation: McpOperation) -> Result<Value> {
        let value = match operation {
            McpOperation::Ping => serde_json::to_value(self.session.ping().await?)?,
            McpOperation::ListTools => serde_json::to_value(self.list_all_tools().await?)?,
            McpOperation::CallTool { name, arguments } => {
                let mut params = CallToolParams::new(&name);
                params.arguments = arguments;

                let result = self
                    .session
                    .call_tool(params)
                    .await
                    .with_context(|| format!("Failed to call tool '{}'", name))?;
                if result.is_error == Some(true) {
                    warn!("Tool '{}' reported an error", name);
                }
                serde_json::to_value(result)?
            }
            McpOperation::ListPrompts => serde_json::to_value(self.session.list_prompts(None).await?)?,
            McpOperation::ListResources => {
                serde_json::to_value(self.session.list_resources(None).await?)?
            }
            McpOperation::ReadResource { uri } => serde_json::to_value(
                self.session
                    .read_resource(ReadResourceParams { uri: uri.clone() })
                    .await
                    .with_context(|| format!("Failed to read resource '{}'", uri))?,
            )?,
        };

        Ok(value)
    }

    /// Follow `nextCursor` until the server stops paginating
    ///
    /// A cursor the server already handed out ends the walk, so a server that
    /// keeps returning the same page cannot loop forever.
    pub async fn list_all_tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut seen_cursors = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .session
                .list_tools(cursor.take().map(PaginatedParams::cursor))
                .await
                .context("Failed to list tools")?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                Some(next) => {
                    warn!("MCP server repeated cursor '{}', stopping pagination", next);
                    break;
                }
                None => break,
            }
        }

        info!("Discovered {} tools", tools.len());
        Ok(tools)
    }

    /// Stop the server process, if this connection owns one
    pub async fn close(self) -> Result<()> {
        if let Some(process) = self.process {
            process
                .stop()
                .await
                .context("Failed to stop MCP server")?;
        }
        Ok(())
    }

    /// Close after a failure; the original error matters more than this one
    async fn close_quietly(self) {
        if let Err(e) = self.close().await {
            warn!("Failed to stop MCP server: {:#}", e);
        }
    }
}

fn build_transport(
    config: &Config,
    server: &ServerConfig,
) -> Result<(Arc<dyn Transport>, Option<Arc<StdioTransport>>)> {
    match server.transport {
        TransportKind::Stdio => {
            let mut options = StdioTransportOptions::new(&server.command).args(server.args.clone());
            options.cwd = server.cwd.clone();

            let process = Arc::new(StdioTransport::new(options));
            let transport: Arc<dyn Transport> = process.clone();
            Ok((transport, Some(process)))
        }
        TransportKind::Http => {
            let url = server
                .url
                .clone()
                .context("HTTP server has no URL configured")?;
            let adapter = Arc::new(
                ReqwestAdapter::new(config.timeout()).context("Failed to build HTTP client")?,
            );
            let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
                HttpTransportOptions::new(url, adapter).headers(server.headers.clone()),
            ));
            Ok((transport, None))
        }
    }
}

/// Connect, run one operation, disconnect
///
/// The server process is stopped even when the operation fails.
///
/// # Example
///
/// ```ignore
/// let config = Config::load()?;
/// let tools = execute(&config, "everything", McpOperation::ListTools).await?;
/// println!("{}", serde_json::to_string_pretty(&tools)?);
/// ```
pub async fn execute(config: &Config, server_name: &str, operation: McpOperation) -> Result<Value> {
    let connection = Connection::open(config, server_name).await?;
    match connection.run(operation).await {
        Ok(value) => {
            connection.close().await?;
            Ok(value)
        }
        Err(e) => {
            connection.close_quietly().await;
            Err(e)
        }
    }
}

/// One line per configured server: `name  transport  target`
pub fn describe_servers(config: &Config) -> Vec<String> {
    config
        .servers
        .iter()
        .map(|(name, server)| match server.transport {
            TransportKind::Stdio => {
                let mut target = server.command.clone();
                for arg in &server.args {
                    target.push(' ');
                    target.push_str(arg);
                }
                format!("{}\tstdio\t{}", name, target)
            }
            TransportKind::Http => format!(
                "{}\thttp\t{}",
                name,
                server.url.as_deref().unwrap_or_default()
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http_config(url: String) -> Config {
        let mut config = Config::default();
        config.servers.insert(
            "remote".to_string(),
            ServerConfig {
                transport: TransportKind::Http,
                url: Some(url),
                headers: [("Authorization".to_string(), "Bearer t".to_string())].into(),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn test_describe_servers() {
        let mut config = http_config("https://mcp.example.com/mcp".to_string());
        config.servers.insert(
            "local".to_string(),
            ServerConfig {
                command: "npx".to_string(),
                args: vec!["-y".to_string(), "server-everything".to_string()],
                ..Default::default()
            },
        );

        assert_eq!(
            describe_servers(&config),
            vec![
                "local\tstdio\tnpx -y server-everything".to_string(),
                "remote\thttp\thttps://mcp.example.com/mcp".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_server() {
        let err = execute(&Config::default(), "missing", McpOperation::Ping)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdio_server_round_trip() {
        // initialize (id 1), notifications/initialized (id 2, no reply), tools/list (id 3)
        let script = r#"
read line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-06-18","capabilities":{"tools":{}},"serverInfo":{"name":"sh-server","version":"1.0.0"}}}'
read line
read line
printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"tools":[{"name":"echo","inputSchema":{"type":"object"}}]}}'
sleep 5
"#;
        let mut config = Config::default();
        config.servers.insert(
            "sh".to_string(),
            ServerConfig {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
                ..Default::default()
            },
        );

        let tools = execute(&config, "sh", McpOperation::ListTools)
            .await
            .unwrap();

        assert_eq!(
            tools,
            json!([{"name": "echo", "inputSchema": {"type": "object"}}])
        );
    }

    #[tokio::test]
    async fn test_http_server_round_trip() {
        use wiremock::matchers::{body_partial_json, header, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("mcp-session-id", "session-42")
                    .set_body_json(json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "result": {
                            "protocolVersion": "2025-06-18",
                            "capabilities": {},
                            "serverInfo": {"name": "remote", "version": "1.0.0"}
                        }
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "notifications/initialized"})))
            .and(header("Mcp-Session-Id", "session-42"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "ping", "id": 3})))
            .and(header("Mcp-Session-Id", "session-42"))
            .and(header("Authorization", "Bearer t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 3,
                "result": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = http_config(format!("{}/mcp", server.uri()));
        let result = execute(&config, "remote", McpOperation::Ping).await.unwrap();

        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn test_http_server_without_session_id_is_rejected() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "protocolVersion": "2025-06-18",
                    "capabilities": {},
                    "serverInfo": {"name": "remote", "version": "1.0.0"}
                }
            })))
            .mount(&server)
            .await;

        let config = http_config(format!("{}/mcp", server.uri()));
        let err = execute(&config, "remote", McpOperation::Ping)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("did not return a session id"));
    }

    async fn mount_handshake(server: &wiremock::MockServer) {
        use wiremock::matchers::{body_partial_json, method};
        use wiremock::{Mock, ResponseTemplate};

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("mcp-session-id", "session-7")
                    .set_body_json(json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "result": {
                            "protocolVersion": "2025-06-18",
                            "capabilities": {"tools": {}},
                            "serverInfo": {"name": "remote", "version": "1.0.0"}
                        }
                    })),
            )
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "notifications/initialized"})))
            .respond_with(ResponseTemplate::new(202))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_repeated_cursor_stops_pagination() {
        use wiremock::matchers::{body_partial_json, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        mount_handshake(&server).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 3,
                "result": {
                    "tools": [{"name": "echo", "inputSchema": {"type": "object"}}],
                    "nextCursor": "same"
                }
            })))
            .expect(2)
            .mount(&server)
            .await;

        let config = http_config(format!("{}/mcp", server.uri()));
        let tools = execute(&config, "remote", McpOperation::ListTools)
            .await
            .unwrap();

        assert_eq!(tools.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_failed_operation_keeps_its_error() {
        use wiremock::matchers::{body_partial_json, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        mount_handshake(&server).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/call"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 3,
                "error": {"code": -32602, "message": "Unknown tool: frobnicate"}
            })))
            .mount(&server)
            .await;

        let config = http_config(format!("{}/mcp", server.uri()));
        let err = execute(
            &config,
            "remote",
            McpOperation::CallTool {
                name: "frobnicate".to_string(),
                arguments: None,
            },
        )
        .await
        .unwrap_err();

        let message = format!("{:#}", err);
        assert!(message.contains("Failed to call tool 'frobnicate'"));
        assert!(message.contains("Unknown tool: frobnicate"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_handshake_keeps_its_error() {
        let mut config = Config::default();
        config.servers.insert(
            "quits".to_string(),
            ServerConfig {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), "read line; exit 0".to_string()],
                ..Default::default()
            },
        );

        let err = execute(&config, "quits", McpOperation::Ping)
            .await
            .unwrap_err();

        let message = format!("{:#}", err);
        assert!(message.contains("Failed to initialize MCP server 'quits'"));
    }
}
