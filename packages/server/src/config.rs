use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::kernel::jobs::OrchestratorConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub static_dir: PathBuf,
    pub jira_base_url: String,
    pub jira_username: String,
    pub jira_api_token: String,
    pub jira_timeout: Duration,
    pub search_max_concurrency: usize,
    pub search_chunk_size: usize,
    pub search_default_page_size: u32,
    pub search_max_page_size: u32,
    pub search_cache_ttl: Duration,
    pub search_job_retention: Duration,
    pub search_reaper_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: parse_or("PORT", 3000)?,
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            jira_base_url: env::var("JIRA_BASE_URL")
                .unwrap_or_else(|_| "https://your-domain.atlassian.net/".to_string()),
            jira_username: env::var("JIRA_USERNAME").context("JIRA_USERNAME must be set")?,
            jira_api_token: env::var("JIRA_API_TOKEN").context("JIRA_API_TOKEN must be set")?,
            jira_timeout: Duration::from_secs(parse_or("JIRA_TIMEOUT_SECS", 30)?),
            search_max_concurrency: parse_or("SEARCH_MAX_CONCURRENCY", 3)?,
            search_chunk_size: parse_or("SEARCH_CHUNK_SIZE", 50)?,
            search_default_page_size: parse_or("SEARCH_DEFAULT_PAGE_SIZE", 100)?,
            search_max_page_size: parse_or("SEARCH_MAX_PAGE_SIZE", 1000)?,
            search_cache_ttl: Duration::from_secs(parse_or("SEARCH_CACHE_TTL_SECS", 300)?),
            search_job_retention: Duration::from_secs(parse_or("SEARCH_JOB_RETENTION_SECS", 600)?),
            search_reaper_interval: Duration::from_secs(parse_or(
                "SEARCH_REAPER_INTERVAL_SECS",
                60,
            )?),
        })
    }

    /// Orchestrator tunables derived from this configuration.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig::builder()
            .max_concurrency(self.search_max_concurrency.max(1))
            .chunk_size(self.search_chunk_size.max(1))
            .default_page_size(self.search_default_page_size.max(1))
            .max_page_size(self.search_max_page_size.max(1))
            .cache_ttl(self.search_cache_ttl)
            .job_retention(self.search_job_retention)
            .reaper_interval(self.search_reaper_interval)
            .build()
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}
