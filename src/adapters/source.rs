//! The remote-record seam the services are written against

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BibliographicEntry, CitingWorkIdentifier, QuotaSnapshot, SeedIdentifier};

/// Search and export access to a bibliographic database
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Identifiers of all works citing `seed`, as reported by the database
    ///
    /// Follows pagination to the end (or the configured cap). Values are
    /// raw; callers normalize them.
    async fn search(&self, seed: &SeedIdentifier) -> Result<Vec<String>>;

    /// The exported bibliographic entry for one citing work
    async fn export(&self, identifier: &CitingWorkIdentifier) -> Result<BibliographicEntry>;

    /// Last known request quota, when the source tracks one
    async fn quota(&self) -> Option<QuotaSnapshot> {
        None
    }
}
