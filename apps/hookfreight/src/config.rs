//! Application configuration loaded from environment variables.
//!
//! Fail-fast: required variables must be present and valid or startup
//! aborts with a clear error message.

use std::env;

use thiserror::Error;
use url::Url;

use hookfreight_relay::DEFAULT_MAX_RETRIES;

/// Configuration errors raised during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {message}")]
    InvalidVar {
        name: &'static str,
        message: String,
    },
}

/// Runtime configuration for the relay process.
#[derive(Debug, Clone)]
pub struct HookfreightConfig {
    /// HTTP listen address.
    pub host: String,
    /// HTTP listen port.
    pub port: u16,
    /// Public base URL; consulted by the self-forward guard.
    pub base_url: Url,
    /// Maximum captured body size in bytes.
    pub max_body_bytes: usize,
    /// Delivery worker pool size.
    pub queue_concurrency: usize,
    /// Maximum attempts per retry chain.
    pub queue_max_retries: i32,
    /// PostgreSQL connection string; backs both the stores and the durable
    /// queue.
    pub database_url: String,
    /// Connection pool ceiling.
    pub db_max_connections: u32,
}

impl HookfreightConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOOKFREIGHT_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var(&lookup, "HOOKFREIGHT_PORT", 3030u16)?;

        let base_url_raw = lookup("HOOKFREIGHT_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3030".to_string());
        let base_url = Url::parse(&base_url_raw).map_err(|e| ConfigError::InvalidVar {
            name: "HOOKFREIGHT_BASE_URL",
            message: e.to_string(),
        })?;
        if base_url.host_str().is_none() {
            return Err(ConfigError::InvalidVar {
                name: "HOOKFREIGHT_BASE_URL",
                message: "URL must have a host".to_string(),
            });
        }

        let max_body_bytes = parse_var(&lookup, "HOOKFREIGHT_MAX_BODY_BYTES", 1_048_576usize)?;
        let queue_concurrency = parse_var(&lookup, "HOOKFREIGHT_QUEUE_CONCURRENCY", 5usize)?;
        let queue_max_retries =
            parse_var(&lookup, "HOOKFREIGHT_QUEUE_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        let db_max_connections = parse_var(&lookup, "HOOKFREIGHT_DB_MAX_CONNECTIONS", 10u32)?;

        let database_url = lookup("HOOKFREIGHT_DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingVar("HOOKFREIGHT_DATABASE_URL"))?;

        if queue_max_retries < 1 {
            return Err(ConfigError::InvalidVar {
                name: "HOOKFREIGHT_QUEUE_MAX_RETRIES",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            host,
            port,
            base_url,
            max_body_bytes,
            queue_concurrency,
            queue_max_retries,
            database_url,
            db_max_connections,
        })
    }

    /// The socket address string the listener binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            name,
            message: e.to_string(),
        }),
    }
}
