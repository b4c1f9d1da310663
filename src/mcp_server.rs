//! Tool server exposing the division operations over stdio.

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use tracing::info;

use commit_divider::config::EngineConfig;
use commit_divider::mcp::DivisionServer;
use commit_divider::tools::DivisionTools;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is the protocol channel; logs must stay on stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = EngineConfig::load().context("Failed to load configuration")?;
    let server = DivisionServer::new(DivisionTools::with_git(config));

    info!(version = commit_divider::VERSION, "Starting tool server on stdio");
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start tool server")?;
    service.waiting().await.context("Tool server stopped with an error")?;
    Ok(())
}
