//! One indexing pass: harvest every source concurrently into a shared accumulator, stage the
//! result durably, then commit it to the store in one transaction.

use crate::error::{IndexerError, UnitError};
use oncoseek_connectors::SourceConnector;
use oncoseek_core::{
    CommitReport, DocKey, Document, IndexAccumulator, InvertedIndex, StagingManager, Store,
    TermProcessor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// What to do with a recovery record left by an interrupted pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecoveryMode {
    /// Commit the staged batch again without harvesting.
    Resume,
    /// Delete the record and run a fresh pass.
    Discard,
}

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    /// Deadline for fetching one source's descriptor and document list.
    pub source_timeout: Duration,
    /// Deadline for fetching one document's text.
    pub document_timeout: Duration,
    pub max_concurrent_documents: usize,
    pub keepalive_interval: Duration,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(600),
            document_timeout: Duration::from_secs(120),
            max_concurrent_documents: 32,
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

/// Per-source counters for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceProgress {
    pub name: String,
    pub discovered: usize,
    pub indexed: usize,
    pub failed: usize,
    /// Set when the source itself could not be harvested.
    pub error: Option<String>,
}

impl SourceProgress {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub started_at: String,
    /// True when the pass committed a recovered batch instead of harvesting.
    pub resumed: bool,
    pub sources: Vec<SourceProgress>,
    pub commit: CommitReport,
}

impl PassReport {
    pub fn sources_failed(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn documents_indexed(&self) -> usize {
        self.sources.iter().map(|s| s.indexed).sum()
    }

    pub fn documents_failed(&self) -> usize {
        self.sources.iter().map(|s| s.failed).sum()
    }
}

/// Shared by every harvesting task of a pass.
#[derive(Clone)]
struct HarvestContext {
    accumulator: Arc<IndexAccumulator>,
    processor: Arc<TermProcessor>,
    permits: Arc<Semaphore>,
    document_timeout: Duration,
    source_timeout: Duration,
}

pub struct Indexer {
    store: Arc<Store>,
    staging: StagingManager,
    processor: Arc<TermProcessor>,
    connectors: Vec<Arc<dyn SourceConnector>>,
    options: IndexerOptions,
}

impl Indexer {
    pub fn new(
        store: Arc<Store>,
        staging: StagingManager,
        connectors: Vec<Arc<dyn SourceConnector>>,
        options: IndexerOptions,
    ) -> Self {
        Self { store, staging, processor: Arc::new(TermProcessor::default()), connectors, options }
    }

    pub fn with_processor(mut self, processor: TermProcessor) -> Self {
        self.processor = Arc::new(processor);
        self
    }

    pub fn staging(&self) -> &StagingManager {
        &self.staging
    }

    /// Runs one pass. A recovery record on disk must be dealt with first: without a `recovery`
    /// mode the run stops with [`IndexerError::RecoveryPending`].
    pub async fn run(&mut self, recovery: Option<RecoveryMode>) -> Result<PassReport, IndexerError> {
        let started_at = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();

        if self.staging.has_record() {
            match recovery {
                None => {
                    return Err(IndexerError::RecoveryPending(
                        self.staging.paths().record().display().to_string(),
                    ))
                }
                Some(RecoveryMode::Resume) => {
                    let staged = self.staging.load()?;
                    info!(documents = staged.document_count(), "resuming commit of recovered pass");
                    let commit = self.staging.commit(&self.store)?;
                    return Ok(PassReport { started_at, resumed: true, sources: Vec::new(), commit });
                }
                Some(RecoveryMode::Discard) => self.staging.discard()?,
            }
        }

        let (index, sources) = self.harvest().await;
        for source in &sources {
            match &source.error {
                Some(error) => warn!(source = %source.name, %error, "source failed"),
                None => info!(
                    source = %source.name,
                    discovered = source.discovered,
                    indexed = source.indexed,
                    failed = source.failed,
                    "source harvested"
                ),
            }
        }
        if index.is_empty() {
            return Err(IndexerError::EmptyPass);
        }

        self.staging.stage(index)?;
        let commit = self.staging.commit(&self.store)?;
        info!(
            generation = commit.generation,
            documents = commit.documents,
            terms = commit.terms,
            "pass committed"
        );
        Ok(PassReport { started_at, resumed: false, sources, commit })
    }

    async fn harvest(&self) -> (InvertedIndex, Vec<SourceProgress>) {
        let context = HarvestContext {
            accumulator: Arc::new(IndexAccumulator::new()),
            processor: Arc::clone(&self.processor),
            permits: Arc::new(Semaphore::new(self.options.max_concurrent_documents.max(1))),
            document_timeout: self.options.document_timeout,
            source_timeout: self.options.source_timeout,
        };
        let keepalive = self.spawn_keepalive();

        let mut progress: Vec<SourceProgress> = self
            .connectors
            .iter()
            .map(|connector| SourceProgress {
                error: Some("harvest task did not complete".to_string()),
                ..SourceProgress::new(connector.name())
            })
            .collect();

        let mut tasks = JoinSet::new();
        for (position, connector) in self.connectors.iter().enumerate() {
            let connector = Arc::clone(connector);
            let context = context.clone();
            tasks.spawn(async move { (position, harvest_source(connector, context).await) });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, outcome)) => progress[position] = outcome,
                Err(error) => warn!(%error, "source task aborted"),
            }
        }
        keepalive.abort();

        let index = match Arc::try_unwrap(context.accumulator) {
            Ok(accumulator) => accumulator.into_inner(),
            Err(shared) => shared.snapshot(),
        };
        (index, progress)
    }

    /// Periodic no-op reads so the store stays warm during a long harvest.
    fn spawn_keepalive(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let period = self.options.keepalive_interval.max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.ping() {
                    Ok(()) => debug!("store keep-alive"),
                    Err(error) => warn!(%error, "store keep-alive failed"),
                }
            }
        })
    }
}

async fn harvest_source(connector: Arc<dyn SourceConnector>, context: HarvestContext) -> SourceProgress {
    let mut progress = SourceProgress::new(connector.name());

    let listing = timeout(context.source_timeout, async {
        let source = connector.source_descriptor().await?;
        let key = context.accumulator.stage_source(source);
        connector.document_descriptors(key).await
    })
    .await;
    let documents = match listing {
        Ok(Ok(documents)) => documents,
        Ok(Err(error)) => {
            progress.error = Some(UnitError::from(error).to_string());
            return progress;
        }
        Err(_) => {
            progress.error = Some(UnitError::TimedOut(context.source_timeout).to_string());
            return progress;
        }
    };
    progress.discovered = documents.len();
    info!(source = %progress.name, documents = documents.len(), "document list fetched");

    let indexed = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();
    for document in documents {
        let connector = Arc::clone(&connector);
        let context = context.clone();
        let indexed = Arc::clone(&indexed);
        let total = progress.discovered;
        tasks.spawn(async move {
            let url = document.url.clone();
            let outcome = match Arc::clone(&context.permits).acquire_owned().await {
                Ok(_permit) => index_document(connector.as_ref(), document, &context).await,
                Err(error) => Err(UnitError::Aborted(error.to_string())),
            };
            if outcome.is_ok() {
                let done = indexed.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(source = %connector.name(), done, total, "document indexed");
            }
            (url, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(_))) => {}
            Ok((url, Err(error))) => {
                progress.failed += 1;
                warn!(source = %progress.name, %url, %error, "document skipped");
            }
            Err(error) => {
                progress.failed += 1;
                warn!(source = %progress.name, %error, "document task aborted");
            }
        }
    }
    progress.indexed = indexed.load(Ordering::Relaxed);
    progress
}

/// Text fetch, then term extraction, then staging.
async fn index_document(
    connector: &dyn SourceConnector,
    document: Document,
    context: &HarvestContext,
) -> Result<DocKey, UnitError> {
    let text = timeout(context.document_timeout, connector.document_text(&document))
        .await
        .map_err(|_| UnitError::TimedOut(context.document_timeout))??;
    let analysis = context.processor.analyze(&text, document.language);
    let document = document.with_language(analysis.language);
    Ok(context.accumulator.index_document(document, &analysis.terms)?)
}
