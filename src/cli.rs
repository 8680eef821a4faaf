//! Command-line and environment configuration for the price proxy
//!
//! Every flag can also be supplied through an environment variable (a `.env`
//! file is loaded before parsing). [`ServerConfig::from_cli`] validates the raw
//! values and fills in defaults that need the filesystem.

use clap::Parser;
use directories::ProjectDirs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::data::coingecko::DEFAULT_BASE_URL;
use crate::logging::LogFormat;

/// File name of the historical cache database
const DB_FILE_NAME: &str = "btc_cache.db";

/// Error types for configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port: 0. Choose a port between 1 and 65535")]
    InvalidPort,

    #[error("Invalid upstream timeout: must be at least 1 second")]
    InvalidTimeout,

    #[error("Invalid log format: '{0}'. Valid formats: text, json")]
    InvalidLogFormat(String),

    #[error("Could not determine a data directory; pass --db-path")]
    NoDataDir,
}

/// Bitcoin price proxy with live and historical caching
#[derive(Parser, Debug)]
#[command(name = "btcprice")]
#[command(about = "Caching proxy for current and historical Bitcoin prices")]
#[command(version)]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// CoinGecko API key, sent as x-cg-demo-api-key
    #[arg(long, env = "COINGECKO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the CoinGecko v3 API
    #[arg(long, env = "COINGECKO_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// Path of the historical cache database
    #[arg(long, env = "BTC_CACHE_DB", value_name = "FILE")]
    pub db_path: Option<PathBuf>,

    /// Timeout for each upstream request, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Allowed CORS origin; any origin when unset
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Log output format: text or json
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

/// Validated configuration for starting the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub db_path: PathBuf,
    pub upstream_timeout: Duration,
    pub cors_origin: Option<String>,
    pub log_format: LogFormat,
}

/// Default database location in the XDG data directory
///
/// Uses `~/.local/share/btcprice/btc_cache.db` on Linux, or the platform
/// equivalent. Returns `None` when no home directory can be determined.
pub fn default_db_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "btcprice")?;
    Some(project_dirs.data_dir().join(DB_FILE_NAME))
}

impl ServerConfig {
    /// Creates a ServerConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(ServerConfig)` with defaults applied
    /// * `Err(ConfigError)` if a value is out of range or no database path can be chosen
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        if cli.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if cli.upstream_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        let log_format = LogFormat::parse(&cli.log_format)
            .ok_or_else(|| ConfigError::InvalidLogFormat(cli.log_format.clone()))?;

        let db_path = match &cli.db_path {
            Some(path) => path.clone(),
            None => default_db_path().ok_or(ConfigError::NoDataDir)?,
        };

        Ok(ServerConfig {
            listen_addr: SocketAddr::new(cli.host, cli.port),
            api_key: cli.api_key.clone().filter(|k| !k.trim().is_empty()),
            api_base_url: cli.api_base_url.clone(),
            db_path,
            upstream_timeout: Duration::from_secs(cli.upstream_timeout_secs),
            cors_origin: cli.cors_origin.clone().filter(|o| !o.trim().is_empty()),
            log_format,
        })
    }
}
