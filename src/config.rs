//! Configuration module for the event gateway
//! TOML file with built-in defaults and SIEM_* environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Embedded database configuration
    pub database: DatabaseConfig,
    /// Listing/query behavior
    pub query: QueryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
}

/// Embedded SQLite database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite://data/events.db`
    pub url: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
}

/// Listing/query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size when the request carries no limit
    pub default_page_size: i64,
    /// Upper clamp for the requested limit
    pub max_page_size: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/events.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 200,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load the file when present, else defaults, then apply environment
    /// overrides in either case.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Config::from_file(path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override settings from SIEM_* environment variables
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("SIEM_SERVER_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("SIEM_SERVER_PORT") {
            self.server.port = port.parse().context("Invalid SIEM_SERVER_PORT")?;
        }

        if let Ok(url) = std::env::var("SIEM_DATABASE_URL") {
            self.database.url = url;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("server.host cannot be empty");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("database.url cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        if self.query.default_page_size < 1 {
            anyhow::bail!("query.default_page_size must be at least 1");
        }

        if self.query.max_page_size < self.query.default_page_size {
            anyhow::bail!("query.max_page_size must be >= query.default_page_size");
        }

        Ok(())
    }
}
