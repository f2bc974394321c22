use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::entry::BibliographicEntry;
use super::identifier::CitingWorkIdentifier;

/// A seed whose citations could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: String,
    pub kind: String,
    pub message: String,
}

/// A citing work whose record could not be exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub identifier: String,
    pub kind: String,
    pub message: String,
}

/// Deduplicated citing works across all seeds, sorted by identifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationResult {
    pub identifiers: Vec<CitingWorkIdentifier>,
    pub seeds_processed: usize,
    pub failures: Vec<SeedFailure>,
}

impl AggregationResult {
    /// True when there were seeds and none of them resolved
    pub fn all_failed(&self) -> bool {
        self.seeds_processed > 0 && self.failures.len() == self.seeds_processed
    }
}

/// Entries in input order, plus the identifiers that were skipped
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub entries: Vec<BibliographicEntry>,
    pub failures: Vec<RecordFailure>,
}

/// Last known request quota as reported by the remote service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
    pub requests_made: u64,
}

/// What a synthesis run hands back to its host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub seeds_processed: usize,
    pub citing_works_found: usize,
    pub entries_written: usize,
    pub output_path: PathBuf,
    #[serde(default)]
    pub seed_failures: Vec<SeedFailure>,
    #[serde(default)]
    pub record_failures: Vec<RecordFailure>,
    pub quota: Option<QuotaSnapshot>,
}

impl SynthesisReport {
    pub fn has_warnings(&self) -> bool {
        !self.seed_failures.is_empty() || !self.record_failures.is_empty()
    }
}
