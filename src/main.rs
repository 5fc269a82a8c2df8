use rmcp::ServiceExt;
use std::sync::Arc;
use tokio::io::{stdin, stdout};

use csv_insights::config;
use csv_insights::initialization::initialize_services;
use csv_insights::server::QueryHandler;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    log::info!("csv-insights server (MCP over stdio) starting.");

    let config = Arc::new(config::load_config()?);
    log::info!(
        "Configuration loaded: backend {:?}, collection '{}', embedding {:?}",
        config.vector_store.backend,
        config.vector_store.collection_name,
        config.embedding.provider
    );

    let services = initialize_services(config).await.inspect_err(|e| {
        log::error!("Startup failed: {:#}", e);
    })?;

    let handler = QueryHandler::new(services.query_service.clone());
    log::info!("Starting MCP server listener...");
    let server_handle = handler.serve((stdin(), stdout())).await.inspect_err(|e| {
        log::error!("serving error: {:?}", e);
    })?;

    let shutdown_reason = server_handle.waiting().await?;
    log::info!("csv-insights server finished. Reason: {:?}", shutdown_reason);
    Ok(())
}
