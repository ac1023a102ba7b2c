//! Fabric Gateway - multi-source data aggregation gateway
//!
//! Serves a fixed set of query tools over either a line-oriented JSON-RPC
//! stdio protocol or an HTTP/JSON REST surface, fanning each out to upstream
//! providers through a shared fallback/verification/caching core.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use fabric_gateway::{cli::Cli, config::Config, gateway::Gateway, setup_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        sources = config.sources.len(),
        stdio = cli.stdio,
        "Starting Fabric Gateway"
    );

    let gateway = match Gateway::new(config) {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.stdio { gateway.run_stdio().await } else { gateway.run_http().await };

    if let Err(e) = result {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gateway shutdown complete");
    ExitCode::SUCCESS
}
