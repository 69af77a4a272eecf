//! Configuration for the decoy listeners.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values, and the
//! protocol's standard decoy port is used when neither names one.

use crate::protocols::ProtocolType;
use crate::server::ServerOptions;
use crate::session::DEFAULT_READ_CHUNK;
use clap::{CommandFactory, FromArgMatches, Parser};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments shared by every decoy binary
#[derive(Parser, Debug)]
#[command(version, long_about = None)]
pub struct CliArgs {
    /// Port to listen on (defaults to the protocol's usual decoy port)
    pub port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: Option<u16>,
    /// Cap on simultaneous connections (unlimited when absent)
    pub max_connections: Option<usize>,
    /// Largest number of bytes taken from the socket per read
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Seconds open connections may run after shutdown begins
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            max_connections: None,
            read_chunk_size: default_read_chunk_size(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Largest accepted `read_chunk_size` (1 MiB).
const MAX_READ_CHUNK: usize = 1024 * 1024;

fn default_read_chunk_size() -> usize {
    DEFAULT_READ_CHUNK
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub protocol: ProtocolType,
    /// Always loopback; decoys are not meant to face the network.
    pub host: IpAddr,
    pub port: u16,
    pub max_connections: Option<usize>,
    pub read_chunk_size: usize,
    pub shutdown_grace: Duration,
    pub log_level: String,
}

impl Config {
    /// Load configuration for `protocol` from the process arguments and
    /// the optional TOML file they name.
    ///
    /// Exits the process with usage information on bad arguments.
    pub fn load(protocol: ProtocolType) -> Result<Self, ConfigError> {
        let matches = CliArgs::command()
            .name(protocol.binary_name())
            .about(format!("Decoy {} listener", protocol.display_name()))
            .get_matches();
        let cli = CliArgs::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

        Self::resolve(protocol, cli)
    }

    /// Resolve already-parsed CLI arguments, reading the TOML file if any.
    pub fn resolve(protocol: ProtocolType, cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(protocol, cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(protocol: ProtocolType, cli: CliArgs, toml: TomlConfig) -> Result<Self, ConfigError> {
        if !(1..=MAX_READ_CHUNK).contains(&toml.server.read_chunk_size) {
            return Err(ConfigError::Invalid(format!(
                "server.read_chunk_size must be between 1 and {}",
                MAX_READ_CHUNK
            )));
        }
        if toml.server.max_connections == Some(0) {
            return Err(ConfigError::Invalid(
                "server.max_connections must be at least 1 (omit it for no limit)".to_string(),
            ));
        }

        Ok(Config {
            protocol,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: cli
                .port
                .or(toml.server.port)
                .unwrap_or_else(|| protocol.default_port()),
            max_connections: toml.server.max_connections,
            read_chunk_size: toml.server.read_chunk_size,
            shutdown_grace: Duration::from_secs(toml.server.shutdown_grace_secs),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml.logging.level
            },
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_connections: self.max_connections,
            read_chunk: self.read_chunk_size,
            shutdown_grace: self.shutdown_grace,
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
