use anyhow::Result;
use axum::Router;
use clap::{Parser, ValueEnum};
use oncoseek_core::rank::{DEFAULT_B, DEFAULT_K1};
use oncoseek_core::{Bm25Params, IdfWeighting};
use oncoseek_server::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Idf {
    /// Term-frequency saturation and length normalisation only
    None,
    /// Multiply each term contribution by ln(1 + N/df)
    Smoothed,
}

#[derive(Parser)]
struct Args {
    /// Store directory written by the indexer
    #[arg(long, env = "ONCOSEEK_STORE", default_value = "./data/store")]
    store: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// BM25 term-frequency saturation
    #[arg(long, default_value_t = DEFAULT_K1)]
    k1: f64,
    /// BM25 length normalisation
    #[arg(long, default_value_t = DEFAULT_B)]
    b: f64,
    #[arg(long, value_enum, default_value_t = Idf::None)]
    idf: Idf,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let params = Bm25Params {
        k1: args.k1,
        b: args.b,
        idf: match args.idf {
            Idf::None => IdfWeighting::None,
            Idf::Smoothed => IdfWeighting::Smoothed,
        },
    };
    let app: Router = build_app(&args.store, params)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
