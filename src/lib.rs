//! Collects every work citing a set of seed papers and writes their
//! bibliographic records as one BibTeX file.

pub mod adapters;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use adapters::{AdsClient, RecordSource};
pub use config::CitationsConfig;
pub use error::{CitationError, Result};
pub use models::SynthesisReport;
pub use services::CitationPipeline;
