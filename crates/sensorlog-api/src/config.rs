// API configuration from environment variables

use anyhow::{Context, Result};

/// Default listen address
pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Postgres connection URL (DATABASE_URL, required)
    pub database_url: String,
    /// Listen address (API_ADDR)
    pub addr: String,
    /// Route prefix, e.g. "/api" (API_PREFIX, default empty)
    pub api_prefix: String,
}

impl ApiConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|s| !s.is_empty())
            .context("DATABASE_URL environment variable required")?;
        let addr = lookup("API_ADDR")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let api_prefix = lookup("API_PREFIX").unwrap_or_default();

        Ok(Self {
            database_url,
            addr,
            api_prefix,
        })
    }
}
