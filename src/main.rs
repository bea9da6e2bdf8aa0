//! PDF Lite MCP Server - Entry point
//!
//! Serves `read_pdf` and `list_pdfs` over stdio.

use pdf_lite_mcp::{run_server_with_config, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter() -> tracing_subscriber::EnvFilter {
    // RUST_LOG wins; LOG_LEVEL is a plain level for this crate only
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL")
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());
        tracing_subscriber::EnvFilter::try_new(format!("pdf_lite_mcp={}", level))
            .unwrap_or_else(|_| "pdf_lite_mcp=info".into())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout carries the protocol
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting PDF Lite MCP Server");

    let config = ServerConfig::from_env()?;
    run_server_with_config(config).await
}
