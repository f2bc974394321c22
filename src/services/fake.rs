//! In-memory record source for service tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::adapters::RecordSource;
use crate::error::{CitationError, Result};
use crate::models::{BibliographicEntry, CitingWorkIdentifier, SeedIdentifier};

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transient,
    RateLimited,
    Format,
    Auth,
}

impl Failure {
    fn into_error(self, target: &str) -> CitationError {
        let target = target.to_string();
        match self {
            Failure::Transient => CitationError::TransientFetch {
                target,
                attempts: 3,
                reason: "status: 503 Service Unavailable".into(),
            },
            Failure::RateLimited => CitationError::RateLimitExceeded { target },
            Failure::Format => CitationError::ResponseFormat {
                target,
                reason: "missing 'response' object".into(),
            },
            Failure::Auth => CitationError::Authentication("token rejected".into()),
        }
    }
}

#[derive(Default)]
pub struct FakeSource {
    citations: HashMap<String, Vec<String>>,
    seed_failures: HashMap<String, Failure>,
    records: HashMap<String, String>,
    record_failures: HashMap<String, Failure>,
    slow: HashMap<String, Duration>,
    pub search_calls: AtomicUsize,
    pub export_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cites(mut self, seed: &str, citing: &[&str]) -> Self {
        self.citations
            .insert(seed.to_string(), citing.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn failing_seed(mut self, seed: &str, failure: Failure) -> Self {
        self.seed_failures.insert(seed.to_string(), failure);
        self
    }

    /// Registers a record whose export is a minimal entry keyed by `id`
    pub fn record(self, id: &str) -> Self {
        let text = format!("@ARTICLE{{{},\n  title = {{Work {}}},\n  journal = {{\\prd}}\n}}", id, id);
        self.record_text(id, &text)
    }

    pub fn record_text(mut self, id: &str, text: &str) -> Self {
        self.records.insert(id.to_ascii_uppercase(), text.to_string());
        self
    }

    pub fn failing_record(mut self, id: &str, failure: Failure) -> Self {
        self.record_failures.insert(id.to_ascii_uppercase(), failure);
        self
    }

    /// Delays every call touching `item`
    pub fn slow(mut self, item: &str, delay: Duration) -> Self {
        self.slow.insert(item.to_ascii_uppercase(), delay);
        self
    }

    async fn maybe_delay(&self, item: &str) {
        if let Some(delay) = self.slow.get(&item.to_ascii_uppercase()) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn search(&self, seed: &SeedIdentifier) -> Result<Vec<String>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay(seed.as_str()).await;

        if let Some(failure) = self.seed_failures.get(seed.as_str()) {
            return Err(failure.into_error(seed.as_str()));
        }
        Ok(self.citations.get(seed.as_str()).cloned().unwrap_or_default())
    }

    async fn export(&self, identifier: &CitingWorkIdentifier) -> Result<BibliographicEntry> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay(identifier.key()).await;

        if let Some(failure) = self.record_failures.get(identifier.key()) {
            return Err(failure.into_error(identifier.as_str()));
        }
        match self.records.get(identifier.key()) {
            Some(text) => Ok(BibliographicEntry::new(identifier.clone(), text)),
            None => Err(CitationError::NotFound {
                target: identifier.to_string(),
            }),
        }
    }
}
