//! toolbridge
//!
//! Interactive chat client that lets an OpenAI-compatible model call the
//! tools of an MCP server script.
//!
//! ```text
//! toolbridge path/to/server.py --model qwen2.5-7b-instruct-1m
//! ```

mod config;
mod driver;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toolbridge_core::{BridgeError, CompletionProvider, OrchestratorBuilder};
use toolbridge_mcp::{McpSession, ServerTarget, SessionConfig};
use toolbridge_runtime::OpenAiProvider;

use crate::config::{Cli, Settings};
use crate::driver::ChatDriver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing; stdout belongs to the chat
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::from_env(Cli::parse())?;

    let target = ServerTarget::new(&settings.server_script).map_err(BridgeError::from)?;
    let session = McpSession::connect(&target, &SessionConfig::default())
        .await
        .with_context(|| format!("failed to connect to tool server {target}"))?;
    let session = Arc::new(session);

    let result = serve(Arc::clone(&session), settings).await;

    // Release the server on every exit path
    session.close().await;

    result
}

async fn serve(session: Arc<McpSession>, settings: Settings) -> anyhow::Result<()> {
    let tools = session.list_tools().await?;
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    println!("\nConnected to server with tools: {names:?}");

    let provider = Arc::new(OpenAiProvider::from_config(settings.provider)?);
    if !provider.health_check().await.unwrap_or(false) {
        tracing::warn!(
            base_url = %provider.config().base_url,
            "Completion endpoint not reachable - queries will fail until it is"
        );
    }

    let orchestrator = OrchestratorBuilder::new()
        .provider(provider)
        .runner(session)
        .config(settings.orchestrator)
        .build()?;

    let driver = ChatDriver::new(&orchestrator);
    let mut stdout = tokio::io::stdout();

    tokio::select! {
        result = driver.run(BufReader::new(tokio::io::stdin()), &mut stdout) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
