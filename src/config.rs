// Configuration File Support
//
// This module provides configuration file parsing for the mcp-client CLI.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from XDG config directory: ~/.config/mcp-client/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Client identity and request limits
    pub client: ClientConfig,

    /// MCP servers by name
    pub servers: BTreeMap<String, ServerConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Name advertised in `clientInfo`
    pub name: String,

    /// Version advertised in `clientInfo`
    pub version: String,

    /// Timeout in seconds for HTTP requests
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "mcp-client".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timeout_secs: 30,
        }
    }
}

/// How to reach a server
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Spawn a local process and talk over stdin/stdout
    #[default]
    Stdio,

    /// POST to a remote endpoint
    Http,
}

/// MCP server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Transport type (stdio, http)
    pub transport: TransportKind,

    /// Command to spawn the MCP server (e.g., "npx"), stdio only
    pub command: String,

    /// Arguments for the MCP server, stdio only
    pub args: Vec<String>,

    /// Working directory for the MCP server, stdio only
    pub cwd: Option<PathBuf>,

    /// Endpoint URL, http only
    pub url: Option<String>,

    /// Extra request headers (e.g. `Authorization`), http only
    pub headers: HashMap<String, String>,
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the result fails validation.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the defaults. Environment overrides are applied
    /// and the result is validated either way.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        // Apply environment variable overrides
        let config = config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/mcp-client/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "mcp-client") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("mcp-client")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - MCP_CLIENT_LOG_LEVEL
    /// - MCP_CLIENT_LOG_FORMAT
    /// - MCP_CLIENT_NAME
    /// - MCP_CLIENT_TIMEOUT_SECS (ignored unless a positive integer)
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("MCP_CLIENT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("MCP_CLIENT_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(name) = std::env::var("MCP_CLIENT_NAME") {
            self.client.name = name;
        }
        if let Ok(timeout) = std::env::var("MCP_CLIENT_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.client.timeout_secs = timeout;
                }
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.client.name.is_empty() {
            anyhow::bail!("Client name must not be empty");
        }
        if self.client.timeout_secs == 0 {
            anyhow::bail!("Client timeout must be > 0");
        }

        for (name, server) in &self.servers {
            match server.transport {
                TransportKind::Stdio => {
                    if server.command.is_empty() {
                        anyhow::bail!("MCP server '{}' has empty command", name);
                    }
                }
                TransportKind::Http => {
                    let Some(url) = &server.url else {
                        anyhow::bail!(
                            "MCP server '{}' uses HTTP transport but has no URL configured",
                            name
                        );
                    };
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!(
                            "MCP server '{}' has invalid URL: {}. Must start with http:// or https://",
                            name,
                            url
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Look up a server by name
    pub fn server(&self, name: &str) -> Result<&ServerConfig> {
        self.servers.get(name).with_context(|| {
            let known: Vec<&str> = self.servers.keys().map(String::as_str).collect();
            format!(
                "Unknown MCP server '{}'. Configured servers: [{}]",
                name,
                known.join(", ")
            )
        })
    }

    /// HTTP request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::NamedTempFile;

    const ENV_VARS: [&str; 4] = [
        "MCP_CLIENT_LOG_LEVEL",
        "MCP_CLIENT_LOG_FORMAT",
        "MCP_CLIENT_NAME",
        "MCP_CLIENT_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn write_config(content: &str) -> NamedTempFile {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), content).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.client.name, "mcp-client");
        assert_eq!(config.client.timeout_secs, 30);
        assert!(config.servers.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.client.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_from_nonexistent_file() {
        clear_env();
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_load_valid_toml_config() {
        clear_env();
        let temp_file = write_config(
            r#"
[logging]
level = "debug"
format = "json"

[client]
name = "inspector"
version = "2.0.0"
timeout_secs = 5

[servers.everything]
command = "npx"
args = ["-y", "@modelcontextprotocol/server-everything"]
cwd = "/tmp"

[servers.remote]
transport = "http"
url = "https://mcp.example.com/mcp"
headers = { Authorization = "Bearer secret" }
"#,
        );

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.client.name, "inspector");
        assert_eq!(config.timeout(), Duration::from_secs(5));

        let everything = config.server("everything").unwrap();
        assert_eq!(everything.transport, TransportKind::Stdio);
        assert_eq!(everything.command, "npx");
        assert_eq!(everything.args.len(), 2);
        assert_eq!(everything.cwd.as_deref(), Some(Path::new("/tmp")));

        let remote = config.server("remote").unwrap();
        assert_eq!(remote.transport, TransportKind::Http);
        assert_eq!(remote.url.as_deref(), Some("https://mcp.example.com/mcp"));
        assert_eq!(remote.headers["Authorization"], "Bearer secret");
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = write_config(
            r#"
[logging
level = "debug"
"#,
        );

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_unknown_transport_is_rejected() {
        let temp_file = write_config(
            r#"
[servers.test]
transport = "websocket"
command = "x"
"#,
        );

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("MCP_CLIENT_LOG_LEVEL", "debug");
        std::env::set_var("MCP_CLIENT_LOG_FORMAT", "json");
        std::env::set_var("MCP_CLIENT_NAME", "from-env");
        std::env::set_var("MCP_CLIENT_TIMEOUT_SECS", "90");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.client.name, "from-env");
        assert_eq!(config.client.timeout_secs, 90);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_invalid_values() {
        clear_env();
        std::env::set_var("MCP_CLIENT_TIMEOUT_SECS", "0");

        let config = Config::default().apply_env_overrides();
        assert_eq!(config.client.timeout_secs, 30);

        std::env::set_var("MCP_CLIENT_TIMEOUT_SECS", "soon");
        let config = Config::default().apply_env_overrides();
        assert_eq!(config.client.timeout_secs, 30);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_are_validated() {
        clear_env();
        std::env::set_var("MCP_CLIENT_LOG_LEVEL", "loud");

        let temp_file = NamedTempFile::new().unwrap();
        let result = Config::load_from_path(temp_file.path().with_extension("missing"));
        assert!(result.is_err());

        clear_env();
    }

    #[test]
    fn test_config_validation_stdio_server_empty_command() {
        let mut config = Config::default();
        config
            .servers
            .insert("test".to_string(), ServerConfig::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_http_server_url() {
        let mut config = Config::default();
        config.servers.insert(
            "test".to_string(),
            ServerConfig {
                transport: TransportKind::Http,
                ..Default::default()
            },
        );
        assert!(config.validate().is_err());

        config.servers.insert(
            "test".to_string(),
            ServerConfig {
                transport: TransportKind::Http,
                url: Some("ftp://example.com".to_string()),
                ..Default::default()
            },
        );
        assert!(config.validate().is_err());

        config.servers.insert(
            "test".to_string(),
            ServerConfig {
                transport: TransportKind::Http,
                url: Some("http://localhost:3000/mcp".to_string()),
                ..Default::default()
            },
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_server_lists_known_ones() {
        let mut config = Config::default();
        config.servers.insert(
            "filesystem".to_string(),
            ServerConfig {
                command: "npx".to_string(),
                ..Default::default()
            },
        );

        let err = config.server("github").unwrap_err();
        assert!(err.to_string().contains("github"));
        assert!(err.to_string().contains("filesystem"));
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = Config::default();
            config.logging.level = level.to_string();
            assert!(
                config.validate().is_ok(),
                "Log level {} should be valid",
                level
            );
        }
    }
}
