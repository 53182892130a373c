//! docqa server binary
//!
//! Run with: cargo run -p docqa --bin docqa-server -- --config docqa.toml

use clap::Parser;
use docqa::{config::RagConfig, providers::OllamaClient, server::DocQaServer};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "docqa-server", version, about = "Document Q&A server")]
struct Args {
    /// TOML configuration file (falls back to DOCQA_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| std::env::var_os("DOCQA_CONFIG").map(PathBuf::from));

    let mut config = RagConfig::load(config_path.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.embeddings.default_model);
    tracing::info!("  - Inference model: {}", config.llm.default_model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Vector index: {}", config.vector_db.storage_path.display());
    if config.llm.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; the gemini model will answer with errors");
    }

    // Check Ollama
    let ollama = OllamaClient::new(&config.embeddings.ollama_base_url, Duration::from_secs(5))?;
    match ollama.health_check().await {
        Ok(true) => tracing::info!("Ollama is running at {}", config.embeddings.ollama_base_url),
        _ => {
            tracing::warn!("Ollama not available at {}", config.embeddings.ollama_base_url);
            tracing::warn!("Start it with `ollama serve` and pull the embedding models:");
            for model in &config.embeddings.models {
                tracing::warn!("  ollama pull {}", model.ollama_model);
            }
        }
    }

    let server = DocQaServer::new(config).await?;
    tracing::info!("Health: http://{}/health", server.address());

    server.start().await?;

    Ok(())
}
