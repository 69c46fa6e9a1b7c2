// Configuration management for babelweb
// Supports CLI arguments, config file (TOML), and environment variables

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// babelweb - live web view of babeld routing state
#[derive(Parser, Debug, Clone)]
#[command(name = "babelweb")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Web server port
    #[arg(short, long, default_value = "8080", env = "BW_PORT")]
    pub port: u16,

    /// Router monitor address to connect to (repeatable)
    #[arg(short = 'n', long = "node", env = "BW_NODES", value_delimiter = ',')]
    pub nodes: Vec<String>,

    /// Directory of static frontend assets
    #[arg(short, long, default_value = "static", env = "BW_STATIC_DIR")]
    pub static_dir: PathBuf,

    /// Delay before reconnecting to a router, in seconds
    #[arg(long, default_value = "5", env = "BW_RECONNECT_DELAY")]
    pub reconnect_delay: u64,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Path to configuration file
    #[arg(short, long, env = "BW_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Monitor connection settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Web server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default: 127.0.0.1)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Directory of static frontend assets
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Router monitor addresses to connect to
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    /// Delay before reconnecting to a router, in seconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_port() -> u16 {
    8080
}
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}
fn default_nodes() -> Vec<String> {
    // babeld's default local-node monitor port
    vec!["[::1]:33123".to_string()]
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            bind_address: default_bind_address(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            nodes: default_nodes(),
            reconnect_delay_seconds: default_reconnect_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub static_dir: PathBuf,
    pub nodes: Vec<String>,
    pub reconnect_delay: Duration,
    pub log_level: Level,
}

impl Config {
    /// Load configuration from all sources.
    /// Priority: CLI args > config file > defaults.
    pub fn load() -> anyhow::Result<Self> {
        let cli_args = CliArgs::parse();
        Config::merge(cli_args)
    }

    fn merge(cli_args: CliArgs) -> anyhow::Result<Self> {
        let config_file = if let Some(config_path) = &cli_args.config {
            let config_content = std::fs::read_to_string(config_path)?;
            toml::from_str::<ConfigFile>(&config_content)?
        } else {
            let default_paths = vec![
                PathBuf::from("config.toml"),
                PathBuf::from("babelweb.toml"),
            ];

            let mut loaded_config = None;
            for path in default_paths {
                if path.exists() {
                    let config_content = std::fs::read_to_string(&path)?;
                    loaded_config = Some(toml::from_str::<ConfigFile>(&config_content)?);
                    break;
                }
            }

            loaded_config.unwrap_or_default()
        };

        let nodes = if cli_args.nodes.is_empty() {
            config_file.monitor.nodes
        } else {
            cli_args.nodes
        };

        Ok(Config {
            port: cli_args.port,
            bind_address: config_file.server.bind_address,
            static_dir: cli_args.static_dir,
            nodes,
            reconnect_delay: Duration::from_secs(cli_args.reconnect_delay),
            log_level: parse_log_level(&cli_args.log_level)?,
        })
    }
}

fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}
