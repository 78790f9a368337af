use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub groq_api_key: String,
    /// Job description document all resumes are scored against.
    pub jd_path: PathBuf,
    /// Folder of resume documents to evaluate.
    pub resume_dir: PathBuf,
    /// Upper bound on in-flight evaluations; the LLM endpoint and the
    /// database set the real ceiling, so this is injected, not assumed.
    pub max_concurrency: usize,
    pub retry_interval_secs: u64,
    pub retry_sweep: bool,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            groq_api_key: require_env("GROQ_API_KEY")?,
            jd_path: PathBuf::from(require_env("JD_PATH")?),
            resume_dir: PathBuf::from(require_env("RESUME_DIR")?),
            max_concurrency: std::env::var("MAX_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse::<usize>()
                .context("MAX_CONCURRENCY must be a positive integer")?,
            retry_interval_secs: std::env::var("RETRY_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse::<u64>()
                .context("RETRY_INTERVAL_SECS must be a number of seconds")?,
            retry_sweep: std::env::var("RETRY_SWEEP")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
