//! End-to-end synthesis run
//!
//! Validates configuration, aggregates citing works, fetches their records
//! and writes the bibliography, applying the run-level failure policy.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::aggregator::CitationAggregator;
use super::fetcher::BibliographicRecordFetcher;
use super::pending::PendingWork;
use super::resolver::CitingWorkResolver;
use super::synthesizer::BibliographySynthesizer;
use crate::adapters::{AdsClient, RecordSource};
use crate::config::CitationsConfig;
use crate::error::{CitationError, Result};
use crate::models::{AggregationResult, FetchOutcome, SeedIdentifier, SynthesisReport};

pub struct CitationPipeline {
    config: CitationsConfig,
    deadline: Option<Duration>,
}

impl CitationPipeline {
    pub fn new(config: CitationsConfig) -> Self {
        let deadline = config.global_timeout();
        Self { config, deadline }
    }

    /// Override the configured global timeout
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &CitationsConfig {
        &self.config
    }

    /// Run against the ADS API
    pub async fn run(&self) -> Result<SynthesisReport> {
        let seeds = self.config.validate()?;
        let client = AdsClient::from_config(&self.config)?;
        self.execute(seeds, Arc::new(client)).await
    }

    /// Run against any record source
    pub async fn run_with_source(&self, source: Arc<dyn RecordSource>) -> Result<SynthesisReport> {
        let seeds = self.config.validate()?;
        self.execute(seeds, source).await
    }

    async fn execute(
        &self,
        seeds: Vec<SeedIdentifier>,
        source: Arc<dyn RecordSource>,
    ) -> Result<SynthesisReport> {
        info!(
            "Collecting citations of {} seed(s) into {}",
            seeds.len(),
            self.config.output_path.display()
        );

        let pending = PendingWork::new();
        let work = self.collect(&seeds, source.clone(), &pending);

        let (aggregation, fetched) = match self.deadline {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result?,
                Err(_) => {
                    let pending = pending.snapshot();
                    warn!("Run timed out after {:?}; {} item(s) outstanding", limit, pending.len());
                    return Err(CitationError::Timeout { pending });
                }
            },
            None => work.await?,
        };

        let entries_written =
            BibliographySynthesizer::write(&fetched.entries, &self.config.output_path)?;

        let report = SynthesisReport {
            seeds_processed: aggregation.seeds_processed,
            citing_works_found: aggregation.identifiers.len(),
            entries_written,
            output_path: self.config.output_path.clone(),
            seed_failures: aggregation.failures,
            record_failures: fetched.failures,
            quota: source.quota().await,
        };

        for failure in &report.seed_failures {
            warn!("Seed {} skipped ({}): {}", failure.seed, failure.kind, failure.message);
        }
        for failure in &report.record_failures {
            warn!(
                "Record {} skipped ({}): {}",
                failure.identifier, failure.kind, failure.message
            );
        }

        info!(
            "Wrote {} of {} citing works from {} seed(s)",
            report.entries_written, report.citing_works_found, report.seeds_processed
        );

        Ok(report)
    }

    /// The remote part of a run, bounded by the deadline as a whole
    async fn collect(
        &self,
        seeds: &[SeedIdentifier],
        source: Arc<dyn RecordSource>,
        pending: &PendingWork,
    ) -> Result<(AggregationResult, FetchOutcome)> {
        let aggregator = CitationAggregator::new(
            CitingWorkResolver::new(source.clone()),
            self.config.max_concurrency,
        );
        let aggregation = aggregator.aggregate_tracked(seeds, pending).await?;

        if aggregation.all_failed() {
            return Err(CitationError::AllSeedsFailed {
                failures: aggregation.failures,
            });
        }

        let fetcher = BibliographicRecordFetcher::new(source, self.config.max_concurrency)
            .with_journal_expansion(self.config.expand_journal_macros);
        let fetched = fetcher
            .fetch_all_tracked(&aggregation.identifiers, pending)
            .await?;

        Ok((aggregation, fetched))
    }
}
