use anyhow::{Context, Result};
use common::backend::MemoryBackend;
use common::codec::DiscoveryContext;
use common::config::Configuration;
use common::registry::ServiceDiscovery;
use gateway::{InMemoryStateImpl, create_router};
use std::net::SocketAddr;
use std::sync::Arc;

/// Standalone Beacon: in-process coordination backend plus the HTTP gateway
/// in one binary. Useful for development and tests; deployments that need a
/// durable registry run `beacon-gateway` against a real coordination store.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Configuration::load().map_err(|e| anyhow::anyhow!(e))?;

    let backend = Arc::new(MemoryBackend::new());
    let context: DiscoveryContext<serde_json::Value> =
        DiscoveryContext::new(config.discovery.max_staleness);
    let registry = ServiceDiscovery::new(backend, context, config.discovery.clone());
    let state = InMemoryStateImpl::new(registry, config.clone());

    let app = create_router(state);
    let http_addr = SocketAddr::new(
        config
            .server
            .bind
            .parse()
            .context("Invalid bind address in configuration")?,
        config.server.http_port,
    );

    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .context("Failed to bind HTTP listener")?;
    log::info!("Beacon listening on {http_addr}");

    axum::serve(listener, app.into_make_service())
        .await
        .context("HTTP server error")?;

    Ok(())
}
