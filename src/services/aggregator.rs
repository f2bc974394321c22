//! Merge citing works across all seeds

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::pending::PendingWork;
use super::resolver::CitingWorkResolver;
use crate::error::Result;
use crate::models::{AggregationResult, CitingWorkIdentifier, SeedFailure, SeedIdentifier};

/// Runs the resolver over every seed and merges the results
pub struct CitationAggregator {
    resolver: CitingWorkResolver,
    max_concurrency: usize,
}

impl CitationAggregator {
    pub fn new(resolver: CitingWorkResolver, max_concurrency: usize) -> Self {
        Self {
            resolver,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn aggregate(&self, seeds: &[SeedIdentifier]) -> Result<AggregationResult> {
        self.aggregate_tracked(seeds, &PendingWork::new()).await
    }

    /// Resolve all seeds concurrently, recording per-seed failures
    ///
    /// Failed seeds do not stop the others. Fatal errors (authentication,
    /// configuration) abort immediately and cancel outstanding lookups.
    /// The identifiers come back sorted, so the result does not depend on
    /// seed order or completion order. Per-seed results are merged in seed
    /// order, so among case variants the spelling from the smallest seed wins.
    pub async fn aggregate_tracked(
        &self,
        seeds: &[SeedIdentifier],
        pending: &PendingWork,
    ) -> Result<AggregationResult> {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for seed in seeds {
            pending.insert(seed.as_str());

            let resolver = self.resolver.clone();
            let permits = permits.clone();
            let seed = seed.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire().await;
                let result = resolver.resolve(&seed).await;
                (seed, result)
            });
        }

        let mut resolved: BTreeMap<SeedIdentifier, BTreeSet<CitingWorkIdentifier>> =
            BTreeMap::new();
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (seed, result) = joined?;
            pending.remove(seed.as_str());

            match result {
                Ok(citing) => {
                    resolved.insert(seed, citing);
                }
                Err(e) if e.is_fatal() => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    warn!("Skipping seed {}: {}", seed, e);
                    failures.push(SeedFailure::from_error(seed.as_str(), &e));
                }
            }
        }

        failures.sort_by(|a, b| a.seed.cmp(&b.seed));

        let mut merged = BTreeSet::new();
        for citing in resolved.into_values() {
            merged.extend(citing);
        }

        info!(
            "Aggregated {} citing works from {} seeds ({} failed)",
            merged.len(),
            seeds.len(),
            failures.len()
        );

        Ok(AggregationResult {
            identifiers: merged.into_iter().collect(),
            seeds_processed: seeds.len(),
            failures,
        })
    }
}
