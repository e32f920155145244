//! Configuration Module
//!
//! Handles loading and validating connection settings from environment
//! variables, optionally seeded from a `.env` file.

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{OdooError, Result};

/// Environment file read by [`Config::load`] when none is given.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Bridge configuration parameters.
///
/// Built once at startup and shared by `Arc` with every component that
/// needs it. Nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Odoo server
    pub url: String,
    /// API key validated through the side-channel endpoint
    pub api_key: Option<String>,
    /// Login for password authentication
    pub username: Option<String>,
    /// Password for password authentication
    pub password: Option<String>,
    /// Target database; auto-selected when absent
    pub database: Option<String>,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Maximum pooled proxy handles
    pub max_connections: usize,
    /// Maximum entries in the field metadata cache
    pub field_cache_size: usize,
    /// Maximum entries in the record cache
    pub record_cache_size: usize,
    /// Maximum entries in the permission cache
    pub permission_cache_size: usize,
    /// TTL in seconds for cached records
    pub record_cache_ttl: u64,
    /// Search page size when the caller gives none
    pub default_limit: u32,
    /// Largest search page a caller may request
    pub max_limit: u32,
    /// HTTP server port of the binary
    pub server_port: u16,
}

impl Config {
    /// Creates a config for `url` with every tunable at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Adds an API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Adds username/password credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Pins the target database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Loads `env_file` into the environment, then calls [`from_env`].
    ///
    /// An explicit file must exist. Without one, `.env` in the working
    /// directory is read when present. Variables already set in the
    /// process environment win over the file.
    ///
    /// [`from_env`]: Self::from_env
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                if !path.exists() {
                    return Err(OdooError::Configuration(format!(
                        "Configuration file not found: {}",
                        path.display()
                    )));
                }
                read_env_file(path)?;
            }
            None => {
                let path = Path::new(DEFAULT_ENV_FILE);
                if path.exists() {
                    read_env_file(path)?;
                }
            }
        }
        Self::from_env()
    }

    /// Loads the configuration from environment variables and validates it.
    ///
    /// # Environment Variables
    /// - `ODOO_URL` - Server base URL (required)
    /// - `ODOO_API_KEY` - API key
    /// - `ODOO_USER` / `ODOO_PASSWORD` - Password credentials
    /// - `ODOO_DB` - Database name (default: auto-select)
    /// - `ODOO_TIMEOUT` - Per-call timeout in seconds (default: 30)
    /// - `ODOO_MAX_CONNECTIONS` - Pool capacity (default: 10)
    /// - `ODOO_FIELD_CACHE_SIZE` - Field cache entries (default: 100)
    /// - `ODOO_RECORD_CACHE_SIZE` - Record cache entries (default: 1000)
    /// - `ODOO_PERMISSION_CACHE_SIZE` - Permission cache entries (default: 500)
    /// - `ODOO_RECORD_CACHE_TTL` - Record TTL in seconds (default: 300)
    /// - `ODOO_MCP_DEFAULT_LIMIT` - Search page size (default: 10)
    /// - `ODOO_MCP_MAX_LIMIT` - Largest search page (default: 100)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            url: env_string("ODOO_URL").unwrap_or_default(),
            api_key: env_string("ODOO_API_KEY"),
            username: env_string("ODOO_USER"),
            password: env_string("ODOO_PASSWORD"),
            database: env_string("ODOO_DB"),
            timeout_secs: env_parse("ODOO_TIMEOUT", defaults.timeout_secs)?,
            max_connections: env_parse("ODOO_MAX_CONNECTIONS", defaults.max_connections)?,
            field_cache_size: env_parse("ODOO_FIELD_CACHE_SIZE", defaults.field_cache_size)?,
            record_cache_size: env_parse("ODOO_RECORD_CACHE_SIZE", defaults.record_cache_size)?,
            permission_cache_size: env_parse(
                "ODOO_PERMISSION_CACHE_SIZE",
                defaults.permission_cache_size,
            )?,
            record_cache_ttl: env_parse("ODOO_RECORD_CACHE_TTL", defaults.record_cache_ttl)?,
            default_limit: env_parse("ODOO_MCP_DEFAULT_LIMIT", defaults.default_limit)?,
            max_limit: env_parse("ODOO_MCP_MAX_LIMIT", defaults.max_limit)?,
            server_port: env_parse("SERVER_PORT", defaults.server_port)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks URL and credentials and returns the resolved endpoint.
    pub fn validate(&self) -> Result<Endpoint> {
        if self.url.trim().is_empty() {
            return Err(OdooError::Configuration("ODOO_URL is required".to_string()));
        }
        let endpoint = Endpoint::parse(&self.url)?;

        if !self.uses_api_key() && !self.uses_credentials() {
            let message = match (&self.username, &self.password) {
                (Some(_), None) => "ODOO_USER is set but ODOO_PASSWORD is missing",
                (None, Some(_)) => "ODOO_PASSWORD is set but ODOO_USER is missing",
                _ => {
                    "Authentication required: provide either ODOO_API_KEY or \
                     both ODOO_USER and ODOO_PASSWORD"
                }
            };
            return Err(OdooError::Configuration(message.to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(OdooError::Configuration(
                "ODOO_TIMEOUT must be positive".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(OdooError::Configuration(
                "ODOO_MAX_CONNECTIONS must be positive".to_string(),
            ));
        }
        if self.default_limit == 0 {
            return Err(OdooError::Configuration(
                "ODOO_MCP_DEFAULT_LIMIT must be positive".to_string(),
            ));
        }
        if self.max_limit == 0 {
            return Err(OdooError::Configuration(
                "ODOO_MCP_MAX_LIMIT must be positive".to_string(),
            ));
        }
        if self.default_limit > self.max_limit {
            return Err(OdooError::Configuration(
                "ODOO_MCP_DEFAULT_LIMIT cannot exceed ODOO_MCP_MAX_LIMIT".to_string(),
            ));
        }

        Ok(endpoint)
    }

    /// True when an API key is configured.
    pub fn uses_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// True when both username and password are configured.
    pub fn uses_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Per-call timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Page size for a search: the default when none or a non-positive
    /// limit is requested, capped at `max_limit`.
    pub fn search_limit(&self, requested: Option<i64>) -> u32 {
        match requested {
            Some(limit) if limit > 0 => limit.min(i64::from(self.max_limit)) as u32,
            _ => self.default_limit,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            username: None,
            password: None,
            database: None,
            timeout_secs: 30,
            max_connections: 10,
            field_cache_size: 100,
            record_cache_size: 1000,
            permission_cache_size: 500,
            record_cache_ttl: 300,
            default_limit: 10,
            max_limit: 100,
            server_port: 3000,
        }
    }
}

/// Reads a variable, treating empty or whitespace-only values as unset.
fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_env_file(path: &Path) -> Result<()> {
    dotenvy::from_path(path).map_err(|e| {
        OdooError::Configuration(format!("Failed to read {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), "loaded environment file");
    Ok(())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| OdooError::Configuration(format!("{} must be a valid integer", key))),
    }
}
