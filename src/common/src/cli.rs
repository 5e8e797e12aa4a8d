use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared across all Beacon binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Common subcommands available for all services
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Start the service (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        // SAFETY: Setting RUST_LOG environment variable is safe for logging configuration
        unsafe {
            std::env::set_var("RUST_LOG", level);
        }
        tracing_subscriber::fmt::init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("Beacon Configuration:");
            println!("=====================");
            println!("Discovery base path: {}", config.discovery.base_path);
            println!("Max staleness: {:?}", config.discovery.max_staleness);
            println!("Backend timeout: {:?}", config.discovery.backend_timeout);
            println!(
                "Retry policy: {} attempt(s), {:?} backoff",
                config.discovery.retry.attempts, config.discovery.retry.backoff
            );
            println!("HTTP bind: {}:{}", config.server.bind, config.server.http_port);
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if !config.discovery.base_path.starts_with('/') {
            anyhow::bail!("Discovery base path must be absolute (start with '/')");
        }

        if config.discovery.base_path.len() > 1 && config.discovery.base_path.ends_with('/') {
            anyhow::bail!("Discovery base path must not end with '/'");
        }

        if config.discovery.backend_timeout.is_zero() {
            anyhow::bail!("Backend timeout must be greater than zero");
        }

        if config.discovery.retry.attempts == 0 {
            anyhow::bail!("Retry attempts must be at least 1");
        }

        if config.server.bind.is_empty() {
            anyhow::bail!("Server bind address cannot be empty");
        }

        log::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Handle common CLI commands that don't require starting services
    pub async fn handle_common_command(
        command: &CommonCommands,
        config: &Configuration,
    ) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true) // Command handled, don't start service
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true) // Command handled, don't start service
            }
            CommonCommands::Version => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
                Ok(true) // Command handled, don't start service
            }
            CommonCommands::Start => {
                Ok(false) // Don't handle, let service start
            }
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
