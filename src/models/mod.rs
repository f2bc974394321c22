pub mod entry;
pub mod identifier;
pub mod report;

pub use entry::*;
pub use identifier::*;
pub use report::*;
