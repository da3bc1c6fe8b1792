use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::GenerationConfig;

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,
    pub redis_url: String,

    // Completion service
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub ai_timeout_seconds: u64,

    // Generation pipeline
    pub generation_max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub retry_backoff_max_ms: u64,
    pub cache_ttl_seconds: u64,

    // Server
    pub cors_origin: Option<String>,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if exists

        Ok(Self {
            // Storage
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            redis_url: env::var("REDIS_URL").map_err(|_| ConfigError::Missing("REDIS_URL"))?,

            // Completion service
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            ai_timeout_seconds: parse_var("AI_TIMEOUT_SECONDS", 30)?,

            // Generation pipeline
            generation_max_retries: parse_var("GENERATION_MAX_RETRIES", 3)?,
            retry_backoff_base_ms: parse_var("RETRY_BACKOFF_BASE_MS", 250)?,
            retry_backoff_max_ms: parse_var("RETRY_BACKOFF_MAX_MS", 2000)?,
            cache_ttl_seconds: parse_var("CACHE_TTL_SECONDS", 3600)?,

            // Server
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|o| !o.trim().is_empty()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 5000)?,
        })
    }

    /// Get server address as "host:port"
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the mock response pipeline
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            max_retries: self.generation_max_retries.max(1),
            attempt_timeout: Duration::from_secs(self.ai_timeout_seconds),
            backoff_base: Duration::from_millis(self.retry_backoff_base_ms),
            backoff_max: Duration::from_millis(self.retry_backoff_max_ms),
            cache_ttl_seconds: self.cache_ttl_seconds,
            ..GenerationConfig::default()
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid environment variable: {0}")]
    Invalid(&'static str),
}
