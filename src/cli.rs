//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

/// Fabric Gateway - multi-source data aggregation gateway
#[derive(Parser, Debug)]
#[command(name = "fabric-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "FABRIC_GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on (HTTP transport only)
    #[arg(short, long, env = "FABRIC_GATEWAY_PORT")]
    pub port: Option<u16>,

    /// Host to bind to (HTTP transport only)
    #[arg(long, env = "FABRIC_GATEWAY_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "FABRIC_GATEWAY_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "FABRIC_GATEWAY_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Serve the line-oriented JSON-RPC tool protocol over stdio instead
    /// of the HTTP/JSON REST surface.
    #[arg(long)]
    pub stdio: bool,
}
