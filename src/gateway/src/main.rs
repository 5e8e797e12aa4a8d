use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::backend::MemoryBackend;
use common::cli::{CommonArgs, CommonCommands, utils};
use common::codec::DiscoveryContext;
use common::registry::ServiceDiscovery;
use gateway::{InMemoryStateImpl, create_router};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "beacon-gateway")]
#[command(about = "Beacon Gateway - HTTP/JSON service discovery API")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<GatewayCommands>,

    #[arg(long, help = "HTTP API server port (overrides configuration)")]
    http_port: Option<u16>,

    #[arg(long, help = "Bind address for the HTTP server (overrides configuration)")]
    bind: Option<String>,
}

#[derive(Subcommand)]
enum GatewayCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for GatewayCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    // Load application configuration
    let config = utils::load_config(cli.common.config.as_ref())?;

    // Handle common commands that don't require starting the service
    let command = cli.command.unwrap_or_default();
    let GatewayCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config).await? {
        return Ok(()); // Command handled, exit early
    }

    log::info!("Starting Beacon Gateway");

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let http_port = cli.http_port.unwrap_or(config.server.http_port);
    let bind_ip = bind
        .parse::<std::net::IpAddr>()
        .context("Invalid bind address")?;
    let http_addr = SocketAddr::new(bind_ip, http_port);

    // Standalone mode runs over the in-process coordination backend. A
    // production deployment hands the registry a connection to a real
    // coordination store implementing the same trait.
    let backend = Arc::new(MemoryBackend::new());
    let context: DiscoveryContext<serde_json::Value> =
        DiscoveryContext::new(config.discovery.max_staleness);
    let registry = ServiceDiscovery::new(backend, context, config.discovery.clone());
    let state = InMemoryStateImpl::new(registry, config.clone());

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .context("Failed to bind HTTP listener")?;
    log::info!("HTTP API server listening on {http_addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            log::info!("Gateway shutting down gracefully");
        })
        .await
        .context("HTTP server error")?;

    log::info!("Gateway stopped gracefully");
    Ok(())
}
