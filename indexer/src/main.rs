use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use oncoseek_connectors::{
    build_client, ArxivConnector, CoreConnector, CrawlOptions, DoajConnector, PaperQuery, PubMedConnector,
    SourceConnector, WebsiteConnector,
};
use oncoseek_core::{StagingManager, Store};
use oncoseek_indexer::{read_websites, Indexer, IndexerOptions, RecoveryMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PaperSource {
    Arxiv,
    Pubmed,
    Core,
    Doaj,
}

#[derive(Parser)]
#[command(name = "oncoseek-indexer")]
#[command(about = "Harvest oncology sources into the search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one indexing pass and replace the live corpus with its result
    Build(BuildArgs),
    /// Print the statistics and sources of the live corpus
    Stats {
        #[arg(long, env = "ONCOSEEK_STORE", default_value = "./data/store")]
        store: PathBuf,
    },
}

#[derive(clap::Args)]
struct BuildArgs {
    #[arg(long, env = "ONCOSEEK_STORE", default_value = "./data/store")]
    store: PathBuf,
    /// Directory holding the recovery record of an uncommitted pass
    #[arg(long, env = "ONCOSEEK_STAGING_DIR", default_value = "./data/staging")]
    staging_dir: PathBuf,
    /// What to do with a recovery record left by an interrupted pass
    #[arg(long, value_enum)]
    on_recovery: Option<RecoveryMode>,
    /// CSV file with one `url,name` website per line
    #[arg(long)]
    websites: Option<PathBuf>,
    /// Paper APIs to harvest
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [PaperSource::Arxiv, PaperSource::Pubmed, PaperSource::Core, PaperSource::Doaj])]
    paper_sources: Vec<PaperSource>,
    /// Query terms ORed in every paper API request (defaults to an oncology vocabulary)
    #[arg(long, value_delimiter = ',')]
    query_terms: Vec<String>,
    #[arg(long, default_value_t = 10)]
    max_results: usize,
    /// Download and extract PDF bodies instead of indexing title and summary only
    #[arg(long, default_value_t = false)]
    full_text: bool,
    #[arg(long, env = "CORE_API_KEY", hide_env_values = true)]
    core_api_key: Option<String>,
    #[arg(long, default_value_t = 5)]
    crawl_depth: usize,
    #[arg(long, default_value_t = 200)]
    crawl_max_pages: usize,
    /// Pause between page fetches on one website, in milliseconds
    #[arg(long, default_value_t = 1000)]
    crawl_delay_ms: u64,
    #[arg(long, default_value_t = false)]
    ignore_robots: bool,
    #[arg(long, default_value_t = 30)]
    http_timeout_secs: u64,
    #[arg(long, default_value_t = 600)]
    source_timeout_secs: u64,
    #[arg(long, default_value_t = 120)]
    document_timeout_secs: u64,
    #[arg(long, default_value_t = 32)]
    max_concurrent_documents: usize,
    #[arg(long, default_value_t = 30)]
    keepalive_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => build(args).await,
        Commands::Stats { store } => stats(&store),
    }
}

fn connectors(args: &BuildArgs) -> Result<Vec<Arc<dyn SourceConnector>>> {
    let client = build_client(Duration::from_secs(args.http_timeout_secs))?;
    let mut query = PaperQuery { max_results: args.max_results, use_full_text: args.full_text, ..PaperQuery::default() };
    if !args.query_terms.is_empty() {
        query.terms = args.query_terms.clone();
    }

    let mut connectors: Vec<Arc<dyn SourceConnector>> = Vec::new();
    for source in &args.paper_sources {
        match source {
            PaperSource::Arxiv => connectors.push(Arc::new(ArxivConnector::new(client.clone(), query.clone()))),
            PaperSource::Pubmed => connectors.push(Arc::new(PubMedConnector::new(client.clone(), query.clone()))),
            PaperSource::Doaj => connectors.push(Arc::new(DoajConnector::new(client.clone(), query.clone()))),
            PaperSource::Core => match args.core_api_key.as_deref().map(str::trim) {
                Some(key) if !key.is_empty() => {
                    connectors.push(Arc::new(CoreConnector::new(client.clone(), query.clone(), key)))
                }
                _ => tracing::warn!("CORE_API_KEY is not set; skipping CORE"),
            },
        }
    }

    if let Some(path) = &args.websites {
        let crawl = CrawlOptions {
            max_depth: args.crawl_depth,
            max_pages: args.crawl_max_pages,
            delay: Duration::from_millis(args.crawl_delay_ms),
            respect_robots: !args.ignore_robots,
        };
        let sites = read_websites(path).with_context(|| format!("reading {}", path.display()))?;
        for site in sites {
            connectors.push(Arc::new(WebsiteConnector::new(client.clone(), site.name, site.url, crawl.clone())));
        }
    }
    Ok(connectors)
}

async fn build(args: BuildArgs) -> Result<()> {
    let connectors = connectors(&args)?;
    let store = Store::open(&args.store).with_context(|| format!("opening store {}", args.store.display()))?;
    let options = IndexerOptions {
        source_timeout: Duration::from_secs(args.source_timeout_secs),
        document_timeout: Duration::from_secs(args.document_timeout_secs),
        max_concurrent_documents: args.max_concurrent_documents,
        keepalive_interval: Duration::from_secs(args.keepalive_secs),
    };
    tracing::info!(sources = connectors.len(), store = %args.store.display(), "starting indexing pass");

    let mut indexer = Indexer::new(Arc::new(store), StagingManager::new(&args.staging_dir), connectors, options);
    let report = indexer.run(args.on_recovery).await?;

    tracing::info!(
        resumed = report.resumed,
        sources_failed = report.sources_failed(),
        documents_indexed = report.documents_indexed(),
        documents_failed = report.documents_failed(),
        documents = report.commit.statistics.document_count,
        average_length = report.commit.statistics.average_document_length,
        "done"
    );
    Ok(())
}

fn stats(path: &Path) -> Result<()> {
    let store = Store::open(path).with_context(|| format!("opening store {}", path.display()))?;
    let Some(statistics) = store.statistics()? else {
        println!("no corpus has been committed to {}", path.display());
        return Ok(());
    };
    println!("generation: {}", store.active_generation()?.unwrap_or_default());
    println!("documents: {}", statistics.document_count);
    println!("average document length: {:.2}", statistics.average_document_length);
    for source in store.sources()? {
        println!("  [{}] {} ({})", source.id, source.name, source.base_url);
    }
    Ok(())
}
