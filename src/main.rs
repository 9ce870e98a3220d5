// mcp-client - Main Entry Point
//
// Command-line front end for the MCP client SDK:
// - CLI interface
// - Logging setup (stderr, so stdout stays pure JSON)
// - One-shot probes against configured MCP servers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcp_client_sdk::config::Config;
use mcp_client_sdk::mcp_command::{self, McpOperation};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// mcp-client: talk to Model Context Protocol servers
#[derive(Parser, Debug)]
#[command(name = "mcp-client")]
#[command(version)]
#[command(about = "Inspect and call MCP servers over stdio or HTTP", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: ~/.config/mcp-client/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured servers
    Servers,
    /// Check that a server answers
    Ping {
        /// Server name from the configuration
        server: String,
    },
    /// List a server's tools
    Tools { server: String },
    /// Call a tool
    Call {
        server: String,

        /// Tool name
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
    },
    /// List a server's prompts
    Prompts { server: String },
    /// List a server's resources
    Resources { server: String },
    /// Read a resource
    Read {
        server: String,

        /// Resource URI
        uri: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config, args.verbose)?;
    debug!("mcp-client v{} starting...", env!("CARGO_PKG_VERSION"));

    let (server, operation) = match args.command {
        Commands::Servers => {
            let servers = mcp_command::describe_servers(&config);
            if servers.is_empty() {
                eprintln!(
                    "No MCP servers configured. Add [servers.<name>] to {}",
                    args.config
                        .unwrap_or_else(Config::config_path)
                        .display()
                );
            }
            for line in servers {
                println!("{}", line);
            }
            return Ok(());
        }
        Commands::Ping { server } => (server, McpOperation::Ping),
        Commands::Tools { server } => (server, McpOperation::ListTools),
        Commands::Call { server, tool, args } => {
            let arguments = args.as_deref().map(parse_arguments).transpose()?;
            (
                server,
                McpOperation::CallTool {
                    name: tool,
                    arguments,
                },
            )
        }
        Commands::Prompts { server } => (server, McpOperation::ListPrompts),
        Commands::Resources { server } => (server, McpOperation::ListResources),
        Commands::Read { server, uri } => (server, McpOperation::ReadResource { uri }),
    };

    let result = mcp_command::execute(&config, &server, operation).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

/// Install the tracing subscriber
///
/// `--verbose` forces debug; otherwise the configured level applies.
/// `RUST_LOG` directives take precedence over both.
fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}

/// Parse `--args` into a JSON object
fn parse_arguments(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("--args must be valid JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("--args must be a JSON object, got: {}", other),
    }
}
