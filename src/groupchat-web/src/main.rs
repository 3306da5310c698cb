//! Group Chat web server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use groupchat_core::{CompletionClient, Config, OpenAiCompletionClient};
use groupchat_web::{AppState, resolve_bind_addr, router};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "groupchat-web",
    version,
    about = "AI Group Chat web server with JSON and streaming endpoints"
)]
struct Cli {
    /// Address to listen on (defaults to 0.0.0.0:$PORT, else 127.0.0.1:5000)
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;

    // The server still starts without a key so /health can report it.
    let client: Option<Arc<dyn CompletionClient>> =
        match OpenAiCompletionClient::with_retries(&config.backend, config.discussion.strip_reasoning) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "backend not configured; /chat will fail until the key is set");
                None
            }
        };

    let state = AppState::new(&config, client)?;
    let addr = resolve_bind_addr(cli.bind, std::env::var("PORT").ok());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        %addr,
        participants = state.roster().participants().len(),
        api_base = %config.backend.api_base,
        "group chat server listening"
    );

    axum::serve(listener, router(state)).await?;
    Ok(())
}
