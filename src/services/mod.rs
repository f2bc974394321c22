//! Services module for business logic
//!
//! Resolution, aggregation, fetching and synthesis, coordinated by the
//! pipeline on top of a record source adapter.

pub mod aggregator;
pub mod fetcher;
pub mod journals;
pub mod pending;
pub mod pipeline;
pub mod resolver;
pub mod synthesizer;

#[cfg(test)]
pub(crate) mod fake;

pub use aggregator::CitationAggregator;
pub use fetcher::BibliographicRecordFetcher;
pub use journals::expand_journal_macros;
pub use pending::PendingWork;
pub use pipeline::CitationPipeline;
pub use resolver::CitingWorkResolver;
pub use synthesizer::BibliographySynthesizer;
