use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub auth_service_url: String,
    pub arxiv_api_url: String,
    pub arxiv_cache_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            auth_service_url: env_or("AUTH_SERVICE_URL", "http://backend-auth:8000"),
            arxiv_api_url: env_or("ARXIV_API_URL", "http://export.arxiv.org/api/query"),
            arxiv_cache_ttl_secs: env_or("ARXIV_CACHE_TTL_SECS", "3600")
                .parse::<u64>()
                .context("ARXIV_CACHE_TTL_SECS must be a number of seconds")?,
            port: env_or("PORT", "8001")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
