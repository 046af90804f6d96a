//! SoulLoad binary.
//!
//! Loads the JSON configuration, starts the health monitor and the HTTP
//! listener, then runs until SIGINT or SIGTERM and drains open connections.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use soulload::config::{load_config, ObservabilityConfig};
use soulload::lifecycle::{signals, startup, Shutdown};
use soulload::observability::logging;

/// Weighted round-robin HTTP load balancer.
#[derive(Debug, Parser)]
#[command(name = "soulload", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init(&ObservabilityConfig::default());
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("failed to initialize logging: {}", e);
    }
    tracing::info!(path = %cli.config.display(), "Configuration loaded");

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match signals::wait_for_termination().await {
            Ok(signal) => {
                tracing::info!(signal, "Shutdown signal received");
                trigger.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signals"),
        }
    });

    match startup::run(config, &shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "SoulLoad stopped with an error");
            ExitCode::FAILURE
        }
    }
}
