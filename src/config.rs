use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;

use crate::auth::{DEFAULT_REFRESH_THRESHOLD_MINUTES, MAX_REFRESH_THRESHOLD_MINUTES};

/// Sermon session - token manager for the streaming platform API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the platform API
    #[arg(short = 'u', long, env = "API_BASE_URL")]
    pub api_base_url: String,

    /// Path to the session SQLite database
    #[arg(short = 'd', long = "token-db", env = "TOKEN_DB_FILE")]
    pub token_db: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "300")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show stored credentials and access token expiry
    Status,

    /// Store a credential pair obtained from a login
    Login {
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: String,
        #[arg(long)]
        token_type: Option<String>,
    },

    /// Remove stored credentials
    Logout,

    /// Force a token refresh
    Refresh,

    /// Authenticated GET of an API path
    Fetch {
        /// Path relative to the API base URL, or an absolute URL
        path: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    // API
    pub api_base_url: String,

    // Storage
    pub token_db_file: PathBuf,

    // Tokens
    pub refresh_threshold_minutes: u64,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    /// Build configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<(Self, Command)> {
        let token_db_file = match args.token_db {
            Some(path) => expand_tilde(&path),
            None => default_token_db_path()
                .context("Could not determine a data directory (use -d or set TOKEN_DB_FILE)")?,
        };

        let config = Config {
            api_base_url: args.api_base_url,

            token_db_file,

            refresh_threshold_minutes: std::env::var("TOKEN_REFRESH_THRESHOLD_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REFRESH_THRESHOLD_MINUTES),

            http_max_connections: std::env::var("HTTP_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
        };

        Ok((config, args.command))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url)
            .with_context(|| format!("API_BASE_URL is not a valid URL: {}", self.api_base_url))?;

        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("API_BASE_URL must use http or https: {}", self.api_base_url);
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        if self.refresh_threshold_minutes > MAX_REFRESH_THRESHOLD_MINUTES {
            anyhow::bail!(
                "TOKEN_REFRESH_THRESHOLD_MINUTES must be at most {} (got {})",
                MAX_REFRESH_THRESHOLD_MINUTES,
                self.refresh_threshold_minutes
            );
        }

        Ok(())
    }
}

/// Default database location under the user's data directory
fn default_token_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("sermon-session").join("session.sqlite3"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
