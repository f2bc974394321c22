//! External service adapters
//!
//! - ADS: citation search and BibTeX export
//! - Source: the trait services use to reach any bibliographic database

pub mod ads;
pub mod source;

// Re-export commonly used types
pub use ads::AdsClient;
pub use source::RecordSource;
