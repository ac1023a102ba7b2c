//! Fabric Gateway
//!
//! A multi-source data aggregation gateway. A small set of domain-oriented
//! query tools (crypto overview, market microstructure, on-chain metrics,
//! derivatives, sentiment) fan out to upstream providers through a single
//! orchestration core: fallback chains, cross-source verification, TTL-aware
//! caching keyed on request fingerprints, conflict detection between
//! equivalent fields, and per-source rate limiting and circuit breaking.
//! Every response carries per-source provenance.
//!
//! # Transports
//!
//! - A line-oriented JSON-RPC tool protocol over stdio (`list_tools` /
//!   `call_tool`).
//! - An HTTP/JSON REST surface (`gateway::server`).
//!
//! Both transports are thin glue around [`orchestrator`]; the fallback
//! engine, verifier, conflict resolver, and cache are the only pieces of
//! this crate with non-trivial engineering.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod cache;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod evidence;
pub mod failsafe;
pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod protocol;
pub mod registry;
pub mod security;
pub mod tools;
pub mod transport;
pub mod validation;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Contract version stamped onto every [`model::SourceMeta`] unless an
/// adapter overrides it.
pub const DEFAULT_CONTRACT_VERSION: &str = "v3";

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
