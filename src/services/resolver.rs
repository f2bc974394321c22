//! Per-seed citation lookup

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::adapters::RecordSource;
use crate::error::Result;
use crate::models::{CitingWorkIdentifier, SeedIdentifier};

/// Finds the set of works citing one seed
#[derive(Clone)]
pub struct CitingWorkResolver {
    source: Arc<dyn RecordSource>,
}

impl CitingWorkResolver {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }

    /// Normalized, deduplicated citing works of `seed`
    ///
    /// Errors from the source are passed through untouched; deciding what
    /// a failed seed means is up to the caller.
    pub async fn resolve(&self, seed: &SeedIdentifier) -> Result<BTreeSet<CitingWorkIdentifier>> {
        let raw = self.source.search(seed).await?;
        let reported = raw.len();

        // insert keeps the existing element, so case variants keep the
        // spelling the source listed first
        let mut citing = BTreeSet::new();
        for id in raw.iter().filter_map(|r| CitingWorkIdentifier::parse(r)) {
            citing.insert(id);
        }

        debug!(
            "{} is cited by {} works ({} reported)",
            seed,
            citing.len(),
            reported
        );
        Ok(citing)
    }
}
