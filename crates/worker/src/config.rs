//! Worker configuration loaded from environment variables.

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string. Required.
    pub database_url: String,
    /// Base URL of the generation service (default `http://localhost:8188`).
    pub comfy_api_url: String,
    /// Generation intensity multiplier (default `1.0`).
    pub intensity: f64,
    /// Bucket holding templates, uploads, and rendered pages. Required.
    pub s3_bucket: String,
    /// Pool size (default `5`).
    pub max_db_connections: u32,
    /// Parallel CPU-lane workers (default `4`). The GPU lane is always 1.
    pub cpu_concurrency: usize,
    /// Sleep between polls of an empty queue, ms (default `1000`).
    pub idle_poll_ms: u64,
    /// Backoff before a failed task is retried, seconds (default `30`).
    pub retry_delay_secs: i64,
    /// A running claim older than this is considered orphaned, seconds
    /// (default `600`).
    pub stale_claim_secs: i64,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            comfy_api_url: std::env::var("COMFY_API_URL")
                .unwrap_or_else(|_| "http://localhost:8188".into()),
            intensity: parse_or("INTENSITY", 1.0)?,
            s3_bucket: std::env::var("S3_BUCKET").context("S3_BUCKET must be set")?,
            max_db_connections: parse_or("MAX_DB_CONNECTIONS", 5)?,
            cpu_concurrency: parse_or("CPU_CONCURRENCY", 4)?,
            idle_poll_ms: parse_or("IDLE_POLL_MS", 1000)?,
            retry_delay_secs: parse_or("RETRY_DELAY_SECS", 30)?,
            stale_claim_secs: parse_or("STALE_CLAIM_SECS", 600)?,
        })
    }
}

fn parse_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} must be a valid number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
