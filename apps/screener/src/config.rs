use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::screening::store::DEFAULT_RETAINED_SCREENINGS;

const DEFAULT_ORACLE_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub oracle_base_url: String,
    /// When unset, congratulation mails are only logged.
    pub notify_webhook_url: Option<String>,
    /// Documents in flight per screening. 1 keeps the batch strictly sequential.
    pub screening_concurrency: usize,
    pub oracle_max_attempts: u32,
    /// Finished screenings kept in memory for status and download requests.
    pub screening_retention: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            oracle_base_url: std::env::var("ORACLE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_ORACLE_BASE_URL.to_string()),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            screening_concurrency: parse_env("SCREENING_CONCURRENCY", 1)?,
            oracle_max_attempts: parse_env("ORACLE_MAX_ATTEMPTS", 3)?,
            screening_retention: parse_env("SCREENING_RETENTION", DEFAULT_RETAINED_SCREENINGS)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.screening_concurrency == 0 {
            bail!("SCREENING_CONCURRENCY must be at least 1");
        }
        if self.oracle_max_attempts == 0 {
            bail!("ORACLE_MAX_ATTEMPTS must be at least 1");
        }
        if self.screening_retention == 0 {
            bail!("SCREENING_RETENTION must be at least 1");
        }
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
