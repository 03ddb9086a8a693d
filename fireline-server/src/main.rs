use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fireline_server::{config::ServerConfig, dedup, web, State};

#[tokio::main]
async fn main() -> Result<()> {
    let json_logs = std::env::var("FIRELINE_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("fireline_server=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::parse();
    tracing::info!(listen_addr = %config.listen_addr, "starting fireline edge coordinator");

    let state = Arc::new(State::new(&config));
    dedup::spawn_sweeper(Arc::clone(&state.dedup), config.sweep_interval_ms);
    run(config, state).await
}

async fn run(config: ServerConfig, state: Arc<State>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;

    axum::serve(listener, web::router(state))
        .await
        .context("server loop exited")
}
