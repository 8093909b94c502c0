//! Transaction RAG server binary
//!
//! Run with: cargo run -p txn-rag --bin txn-rag-server -- --data jordan_transactions.csv

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use txn_rag::{config::RagConfig, server::RagServer};

#[derive(Parser, Debug)]
#[command(name = "txn-rag-server", version, about = "Answer questions about transaction records")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transactions file (overrides config and TXN_RAG_DATA)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Listen port (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "txn_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RagConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RagConfig::default(),
    };
    config.apply_env_overrides()?;
    if let Some(data) = args.data {
        config.data.path = data;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data: {}", config.data.path.display());
    tracing::info!(
        "  - Embeddings: {:?} {} ({} dimensions)",
        config.embeddings.backend,
        config.embeddings.model,
        config.embeddings.dimensions
    );
    tracing::info!("  - LLM model: {}", config.llm.model);
    tracing::info!("  - Top k: {}", config.retrieval.top_k);

    let server = RagServer::new(config);

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  Ready: http://{}/ready", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/query - Ask a question");
    println!("  GET  /api/info  - Service info");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await.context("server stopped with an error")?;

    Ok(())
}
