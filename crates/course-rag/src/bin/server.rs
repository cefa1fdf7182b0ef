//! Retrieval server binary
//!
//! Run with: cargo run -p course-rag --bin course-rag-server -- --config rag.toml

use clap::Parser;
use course_rag::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tenant-scoped retrieval and grounding server for course materials
#[derive(Debug, Parser)]
#[command(name = "course-rag-server", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      Course RAG Engine                    ║
║        Grounded Answers from Tenant Course Materials      ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let mut config = RagConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Database: {}", config.storage.database_path.display());
    tracing::info!("  - Default retrieval: {}", config.defaults.retrieval_strategy);
    tracing::info!("  - Default LLM: {} ({})", config.defaults.llm_provider, config.defaults.llm_model);
    tracing::info!("  - Grounding threshold: {}", config.retrieval.min_grounding_score);
    match &config.llm.ollama_base_url {
        Some(url) => tracing::info!("  - Ollama: {}", url),
        None => tracing::warn!("No Ollama URL configured; only local providers are available"),
    }

    let server = RagServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/ask                   - Ask a question");
    println!("  PUT  /api/tenants/:id/settings  - Update tenant settings");
    println!("  POST /api/tenants/:id/reindex   - Precompute chunk embeddings");
    println!("  GET  /api/cache/stats           - Answer cache statistics");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
