//! Relay configuration from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Path of the identity registry database.
    pub database_path: String,
    /// Challenge validity window in seconds.
    pub challenge_ttl_seconds: i64,
}

impl RelayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = RelayConfig {
            host: env::var("TT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("TT_PORT")
                .unwrap_or_else(|_| "3002".to_string())
                .parse()
                .context("Invalid TT_PORT")?,
            database_path: env::var("TT_DB").unwrap_or_else(|_| "termtalk.db".to_string()),
            challenge_ttl_seconds: env::var("TT_CHALLENGE_TTL")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid TT_CHALLENGE_TTL")?,
        };

        if config.challenge_ttl_seconds <= 0 {
            anyhow::bail!("TT_CHALLENGE_TTL must be positive");
        }

        Ok(config)
    }
}
