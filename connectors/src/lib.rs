//! Source connectors: everything that turns an external service into source and document
//! descriptors for an indexing pass.
//!
//! Every connector reports network and parse failures as [`ConnectorError`] values. Deciding
//! what a failure means for the pass is left to the caller.

use async_trait::async_trait;
use oncoseek_core::{Document, Source, SourceKey};

pub mod arxiv;
pub mod core_api;
pub mod doaj;
pub mod error;
pub mod http;
pub mod paper;
pub mod pdf;
pub mod pubmed;
pub mod robots;
pub mod sanitize;
pub mod website;

pub use arxiv::ArxivConnector;
pub use core_api::CoreConnector;
pub use doaj::DoajConnector;
pub use error::ConnectorError;
pub use http::build_client;
pub use paper::PaperQuery;
pub use pubmed::PubMedConnector;
pub use website::{CrawlOptions, WebsiteConnector};

#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Human-readable name used in logs and progress counters.
    fn name(&self) -> &str;

    async fn source_descriptor(&self) -> Result<Source, ConnectorError>;

    /// Descriptors for every document the source currently offers, each tagged with `source`.
    async fn document_descriptors(&self, source: SourceKey) -> Result<Vec<Document>, ConnectorError>;

    /// Full text to index for one of this connector's documents.
    async fn document_text(&self, document: &Document) -> Result<String, ConnectorError>;
}
