//! Gateway bootstrap: wires a resolved [`Config`] into the shared
//! orchestration handles ([`SourceRegistry`], [`ResponseCache`],
//! [`FallbackEngine`], [`CrossSourceVerifier`]) and either transport
//! ([`create_router`]'s HTTP surface or [`StdioTransport`]'s stdio surface).
//!
//! Grounded on the teacher's `gateway::server::Gateway`: a `new(config)`
//! constructor that registers every configured source up front, and a
//! `run` that binds a listener and serves until a shutdown signal arrives.
//! Narrowed to this crate's scope — no backend warm-start, no capability
//! hot-reload, no webhook registry, no Meta-MCP request multiplexing; the
//! core's only job is `(tool, capability, params) → Envelope`.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::{AppState, create_router};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::credentials::CredentialResolver;
use crate::orchestrator::{CrossSourceVerifier, FallbackEngine};
use crate::registry::SourceRegistry;
use crate::tools::{ToolContext, ToolRegistry};
use crate::transport::StdioTransport;
use crate::{Error, Result};

/// Fabric Gateway server: the bootstrap sequence shared by both transports.
pub struct Gateway {
    config: Arc<Config>,
    registry: Arc<ToolRegistry>,
    context: ToolContext,
}

impl Gateway {
    /// Build every shared orchestration handle from `config`: the source
    /// registry (one adapter per configured `[sources]` entry, credentials
    /// resolved from the environment), the read-through cache, the
    /// fallback engine, the cross-source verifier, and the fixed tool
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a configured source name isn't a known
    /// adapter, or if a source that requires a credential didn't resolve
    /// one.
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let credentials = CredentialResolver::new();
        let source_registry = Arc::new(SourceRegistry::from_config(&config, &credentials)?);
        info!(sources = source_registry.len(), "Source registry populated");

        let cache = if config.cache.enabled {
            Arc::new(ResponseCache::with_max_entries(config.cache.max_entries))
        } else {
            Arc::new(ResponseCache::disabled())
        };

        let engine = Arc::new(FallbackEngine::new(Arc::clone(&source_registry), cache, config.failsafe.clone()));
        let verifier = Arc::new(CrossSourceVerifier::new(Arc::clone(&engine)));
        let context = ToolContext::new(engine, verifier, Arc::clone(&config), Arc::new(crate::evidence::LoggingEvidencePersister));
        let registry = Arc::new(ToolRegistry::new());

        Ok(Self { config, registry, context })
    }

    /// Serve the HTTP/JSON REST surface until a shutdown signal (Ctrl-C or
    /// `SIGTERM`) arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured host/port cannot be parsed or
    /// bound.
    pub async fn run_http(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config.server.host.parse().map_err(|e| Error::Config(format!("invalid host: {e}")))?,
            self.config.server.port,
        );

        let state = Arc::new(AppState {
            config: Arc::clone(&self.config),
            registry: self.registry,
            context: self.context,
        });
        let app = create_router(state);

        let listener = TcpListener::bind(addr).await?;
        info!(host = %self.config.server.host, port = self.config.server.port, "Fabric Gateway listening (HTTP)");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("HTTP server shut down cleanly");
        Ok(())
    }

    /// Serve the line-oriented JSON-RPC tool protocol over stdio until
    /// stdin closes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from stdin or writing to stdout fails.
    pub async fn run_stdio(self) -> Result<()> {
        info!(tools = self.registry.list().len(), "Fabric Gateway serving tool protocol over stdio");
        let transport = StdioTransport::new(self.registry, self.context);
        transport.run().await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
