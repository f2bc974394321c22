//! Error types for citation aggregation and bibliography synthesis

use thiserror::Error;

use crate::models::{RecordFailure, SeedFailure};

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, CitationError>;

/// Every way a synthesis run (or one of its remote calls) can fail
#[derive(Debug, Error)]
pub enum CitationError {
    /// Missing or invalid configuration, detected before any network call
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No credential configured, or the remote service rejected it
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or server fault that persisted through every retry
    #[error("request for {target} failed after {attempts} attempts: {reason}")]
    TransientFetch {
        target: String,
        attempts: u32,
        reason: String,
    },

    /// Rate limited twice in a row for the same request
    #[error("rate limit exceeded for {target}")]
    RateLimitExceeded { target: String },

    /// The remote response did not have the expected shape
    #[error("unexpected response for {target}: {reason}")]
    ResponseFormat { target: String, reason: String },

    /// The export endpoint has no record for the identifier
    #[error("no record found for {target}")]
    NotFound { target: String },

    /// The global deadline passed before all work finished
    #[error("timed out with {} item(s) outstanding: {}", .pending.len(), .pending.join(", "))]
    Timeout { pending: Vec<String> },

    /// Two entries would render with the same entry key
    #[error("duplicate entry key '{key}' in records {first} and {second}")]
    DuplicateEntryKey {
        key: String,
        first: String,
        second: String,
    },

    /// Resolution failed for every seed
    #[error("citation lookup failed for all {} seed(s)", .failures.len())]
    AllSeedsFailed { failures: Vec<SeedFailure> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CitationError {
    /// Errors that abort the whole run instead of being recorded per item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CitationError::Configuration(_)
                | CitationError::Authentication(_)
                | CitationError::Timeout { .. }
                | CitationError::AllSeedsFailed { .. }
        )
    }

    /// Errors worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, CitationError::TransientFetch { .. })
    }

    /// Short category name used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            CitationError::Configuration(_) => "configuration",
            CitationError::Authentication(_) => "authentication",
            CitationError::TransientFetch { .. } => "transient_fetch",
            CitationError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            CitationError::ResponseFormat { .. } => "response_format",
            CitationError::NotFound { .. } => "not_found",
            CitationError::Timeout { .. } => "timeout",
            CitationError::DuplicateEntryKey { .. } => "duplicate_entry_key",
            CitationError::AllSeedsFailed { .. } => "all_seeds_failed",
            CitationError::Io(_) => "io",
            CitationError::Http(_) => "http",
            CitationError::Json(_) => "json",
            CitationError::Task(_) => "task",
        }
    }
}

impl RecordFailure {
    pub fn from_error(identifier: &str, err: &CitationError) -> Self {
        Self {
            identifier: identifier.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl SeedFailure {
    pub fn from_error(seed: &str, err: &CitationError) -> Self {
        Self {
            seed: seed.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}
