//! Export of one bibliographic record per citing work

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::journals::expand_journal_macros;
use super::pending::PendingWork;
use crate::adapters::RecordSource;
use crate::error::{CitationError, Result};
use crate::models::{BibliographicEntry, CitingWorkIdentifier, FetchOutcome, RecordFailure};

pub struct BibliographicRecordFetcher {
    source: Arc<dyn RecordSource>,
    max_concurrency: usize,
    expand_journal_macros: bool,
}

impl BibliographicRecordFetcher {
    pub fn new(source: Arc<dyn RecordSource>, max_concurrency: usize) -> Self {
        Self {
            source,
            max_concurrency: max_concurrency.max(1),
            expand_journal_macros: true,
        }
    }

    pub fn with_journal_expansion(mut self, enabled: bool) -> Self {
        self.expand_journal_macros = enabled;
        self
    }

    pub async fn fetch_all(&self, identifiers: &[CitingWorkIdentifier]) -> Result<FetchOutcome> {
        self.fetch_all_tracked(identifiers, &PendingWork::new()).await
    }

    /// Export every identifier, keeping input order
    ///
    /// A failed export is recorded and its entry left out; only fatal
    /// errors abort the batch.
    pub async fn fetch_all_tracked(
        &self,
        identifiers: &[CitingWorkIdentifier],
        pending: &PendingWork,
    ) -> Result<FetchOutcome> {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, id) in identifiers.iter().enumerate() {
            pending.insert(id.as_str());

            let source = self.source.clone();
            let permits = permits.clone();
            let id = id.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire().await;
                let result = source.export(&id).await;
                (index, id, result)
            });
        }

        let mut slots: Vec<Option<BibliographicEntry>> = vec![None; identifiers.len()];
        let mut failures: Vec<(usize, RecordFailure)> = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (index, id, result) = joined?;
            pending.remove(id.as_str());

            match result.and_then(|entry| self.finish(entry)) {
                Ok(entry) => slots[index] = Some(entry),
                Err(e) if e.is_fatal() => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    warn!("Skipping record {}: {}", id, e);
                    failures.push((index, RecordFailure::from_error(id.as_str(), &e)));
                }
            }
        }

        failures.sort_by_key(|(index, _)| *index);
        let entries: Vec<BibliographicEntry> = slots.into_iter().flatten().collect();

        info!(
            "Fetched {} of {} records ({} failed)",
            entries.len(),
            identifiers.len(),
            failures.len()
        );

        Ok(FetchOutcome {
            entries,
            failures: failures.into_iter().map(|(_, f)| f).collect(),
        })
    }

    fn finish(&self, entry: BibliographicEntry) -> Result<BibliographicEntry> {
        if entry.is_empty() {
            return Err(CitationError::NotFound {
                target: entry.identifier.to_string(),
            });
        }

        if !self.expand_journal_macros {
            return Ok(entry);
        }

        debug!("Expanding journal macros for {}", entry.identifier);
        let text = expand_journal_macros(&entry.text);
        Ok(BibliographicEntry::new(entry.identifier, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::{Failure, FakeSource};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn ids(raw: &[&str]) -> Vec<CitingWorkIdentifier> {
        raw.iter().map(|s| CitingWorkIdentifier::parse(s).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_entries_keep_input_order() {
        let source = FakeSource::new()
            .record("2020C&C...4D")
            .record("2021B&B...2B")
            .record("2021B&B...3C")
            .slow("2020C&C...4D", Duration::from_millis(30));
        let fetcher = BibliographicRecordFetcher::new(Arc::new(source), 3);

        let outcome = fetcher
            .fetch_all(&ids(&["2020C&C...4D", "2021B&B...2B", "2021B&B...3C"]))
            .await
            .unwrap();

        let order: Vec<String> = outcome.entries.iter().map(|e| e.identifier.to_string()).collect();
        assert_eq!(order, vec!["2020C&C...4D", "2021B&B...2B", "2021B&B...3C"]);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_failed_record_is_skipped_and_reported() {
        let source = Arc::new(
            FakeSource::new()
                .record("2021B&B...2B")
                .failing_record("2021B&B...3C", Failure::Transient)
                .record("2022D&D...5E"),
        );
        let fetcher = BibliographicRecordFetcher::new(source.clone(), 2);

        let outcome = fetcher
            .fetch_all(&ids(&["2021B&B...2B", "2021B&B...3C", "2021Miss...9Z", "2022D&D...5E"]))
            .await
            .unwrap();

        assert_eq!(outcome.entries.len(), 2);
        let failed: Vec<(&str, &str)> = outcome
            .failures
            .iter()
            .map(|f| (f.identifier.as_str(), f.kind.as_str()))
            .collect();
        assert_eq!(
            failed,
            vec![("2021B&B...3C", "transient_fetch"), ("2021Miss...9Z", "not_found")]
        );
        assert_eq!(source.export_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_journal_macros_are_expanded() {
        let source = FakeSource::new().record("2021B&B...2B");
        let fetcher = BibliographicRecordFetcher::new(Arc::new(source), 1);

        let outcome = fetcher.fetch_all(&ids(&["2021B&B...2B"])).await.unwrap();
        assert!(outcome.entries[0].text.contains("journal = {Phys.~Rev.~D}"));
    }

    #[tokio::test]
    async fn test_journal_expansion_can_be_disabled() {
        let source = FakeSource::new().record("2021B&B...2B");
        let fetcher =
            BibliographicRecordFetcher::new(Arc::new(source), 1).with_journal_expansion(false);

        let outcome = fetcher.fetch_all(&ids(&["2021B&B...2B"])).await.unwrap();
        assert!(outcome.entries[0].text.contains("journal = {\\prd}"));
    }

    #[tokio::test]
    async fn test_blank_export_counts_as_missing() {
        let source = FakeSource::new().record_text("2021B&B...2B", "  \n\n ");
        let fetcher = BibliographicRecordFetcher::new(Arc::new(source), 1);

        let outcome = fetcher.fetch_all(&ids(&["2021B&B...2B"])).await.unwrap();
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.failures[0].kind, "not_found");
    }

    #[tokio::test]
    async fn test_authentication_error_aborts_batch() {
        let source = FakeSource::new()
            .record("2021B&B...2B")
            .failing_record("2021B&B...3C", Failure::Auth);
        let fetcher = BibliographicRecordFetcher::new(Arc::new(source), 2);

        let err = fetcher
            .fetch_all(&ids(&["2021B&B...2B", "2021B&B...3C"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CitationError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let fetcher = BibliographicRecordFetcher::new(Arc::new(FakeSource::new()), 4);
        let outcome = fetcher.fetch_all(&[]).await.unwrap();
        assert!(outcome.entries.is_empty() && outcome.failures.is_empty());
    }
}
