//! PDF Highlight Server - Entry point
//!
//! An MCP server that highlights keywords in PDFs.

use anyhow::Context;
use pdf_highlight_server::{run_server_with_config, HighlightConfig, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// JSON file with a highlight configuration (keywords, scale, rectangles, label)
const CONFIG_ENV: &str = "PDF_HIGHLIGHT_CONFIG";
/// Colon-separated directories PDF paths are restricted to
const RESOURCE_DIRS_ENV: &str = "PDF_RESOURCE_DIRS";

fn load_config() -> anyhow::Result<ServerConfig> {
    let mut config = ServerConfig::default();

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading highlight config {}", path))?;
        config.highlight = HighlightConfig::from_json(&json)
            .with_context(|| format!("parsing highlight config {}", path))?;
        tracing::info!(path = %path, "highlight config loaded");
    }

    if let Ok(dirs) = std::env::var(RESOURCE_DIRS_ENV) {
        config.resource_dirs = dirs
            .split(':')
            .filter(|d| !d.is_empty())
            .map(String::from)
            .collect();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_highlight_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting PDF highlight server");

    let config = load_config()?;
    run_server_with_config(config).await
}
