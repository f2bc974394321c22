//! Run configuration supplied by the host

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CitationError, Result};
use crate::models::SeedIdentifier;
use crate::utils::http::RetryConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.adsabs.harvard.edu/v1";
pub const DEFAULT_OUTPUT_FILE: &str = "citations.bib";
pub const TOKEN_ENV_VAR: &str = "ADS_API_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Wait after a rate-limit response that carries no reset time
    pub default_wait_ms: u64,
    /// Longest we are willing to suspend for a quota reset
    pub max_wait_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            default_wait_ms: 5_000,
            max_wait_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationsConfig {
    /// ADS API token; falls back to `ADS_API_TOKEN`
    pub token: Option<String>,
    /// Bibcodes whose citing works are collected
    pub seeds: Vec<String>,
    pub output_path: PathBuf,
    pub base_url: String,
    pub page_size: usize,
    /// Cap on citing works per seed
    pub max_results: usize,
    pub max_concurrency: usize,
    pub request_timeout_secs: u64,
    /// Deadline for the whole run
    pub timeout_secs: Option<u64>,
    pub expand_journal_macros: bool,
    pub retry: RetrySettings,
    pub rate_limit: RateLimitSettings,
}

impl Default for CitationsConfig {
    fn default() -> Self {
        Self {
            token: None,
            seeds: Vec::new(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 200,
            max_results: 2000,
            max_concurrency: 4,
            request_timeout_secs: 30,
            timeout_secs: None,
            expand_journal_macros: true,
            retry: RetrySettings::default(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl CitationsConfig {
    /// Read a JSON config file; absent fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CitationError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            CitationError::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Configured token, else the environment; blank tokens count as absent
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Check the settings and return the distinct seeds in input order
    pub fn validate(&self) -> Result<Vec<SeedIdentifier>> {
        if self.page_size == 0 {
            return Err(CitationError::Configuration("page_size must be at least 1".into()));
        }
        if self.max_results == 0 {
            return Err(CitationError::Configuration("max_results must be at least 1".into()));
        }
        if self.max_concurrency == 0 {
            return Err(CitationError::Configuration(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(CitationError::Configuration("output_path is empty".into()));
        }

        let mut seen = BTreeSet::new();
        let mut seeds = Vec::new();
        for raw in &self.seeds {
            let seed = SeedIdentifier::parse(raw).ok_or_else(|| {
                CitationError::Configuration(format!("blank seed identifier: {:?}", raw))
            })?;
            if seen.insert(seed.clone()) {
                seeds.push(seed);
            }
        }

        if seeds.is_empty() {
            return Err(CitationError::Configuration(
                "at least one seed identifier is required".into(),
            ));
        }

        Ok(seeds)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            multiplier: 2.0,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn global_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
