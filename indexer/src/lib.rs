pub mod error;
pub mod orchestrator;
pub mod websites;

pub use error::{IndexerError, UnitError};
pub use orchestrator::{Indexer, IndexerOptions, PassReport, RecoveryMode, SourceProgress};
pub use websites::{parse_websites, read_websites, WebsiteEntry};
