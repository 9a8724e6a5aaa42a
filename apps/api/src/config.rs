use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    /// Token for the repository host. Public repositories work without one.
    pub github_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
    /// Item-level sweep cadence.
    pub analysis_sweep_interval: Duration,
    /// Report sweep cadence.
    pub report_sweep_interval: Duration,
    /// Max PENDING analyses taken per sweep.
    pub analysis_batch_size: usize,
    /// Fixed delay between items of one sweep.
    pub analysis_pacing: Duration,
    /// How long a project stays undeletable after its analysis completes.
    pub project_lock_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            analysis_sweep_interval: Duration::from_secs(parse_env(
                "ANALYSIS_SWEEP_INTERVAL_SECS",
                300,
            )?),
            report_sweep_interval: Duration::from_secs(parse_env(
                "REPORT_SWEEP_INTERVAL_SECS",
                600,
            )?),
            analysis_batch_size: parse_env("ANALYSIS_BATCH_SIZE", 5)?,
            analysis_pacing: Duration::from_secs(parse_env("ANALYSIS_PACING_SECS", 10)?),
            project_lock_days: parse_env("PROJECT_LOCK_DAYS", 7)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
