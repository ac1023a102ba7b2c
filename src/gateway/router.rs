//! axum router: `GET /health`, `GET /`, `GET /tools`, `GET /tools/registry`,
//! `GET /tools/{name}`, `POST /tools/{name}`.
//!
//! Grounded on the teacher's `gateway/router.rs`: the `AppState` +
//! `create_router(state) -> Router` shape, the middleware stack
//! (`CatchPanicLayer` → `CompressionLayer` → `TraceLayer`), and the
//! JSON-shaped error responses, narrowed from the teacher's JSON-RPC-only
//! `/mcp` endpoint to a REST surface over the same tool registry the stdio
//! transport serves.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};

use crate::Error;
use crate::config::Config;
use crate::security::sanitize_json_value;
use crate::tools::{ToolContext, ToolRegistry};

/// Shared state handed to every route.
pub struct AppState {
    /// Static config, read-only after startup.
    pub config: Arc<Config>,
    /// Every tool façade this gateway exposes.
    pub registry: Arc<ToolRegistry>,
    /// Orchestration handle shared by every façade invocation.
    pub context: ToolContext,
}

/// Build the HTTP router over `state`.
#[must_use]
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/", get(index_handler))
        .route("/tools", get(list_tools_handler))
        .route("/tools/registry", get(registry_handler))
        .route("/tools/{name}", get(describe_tool_handler))
        .route("/tools/{name}", post(call_tool_handler))
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "fabric-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "tools_count": state.registry.list().iter().filter(|facade| state.config.is_tool_enabled(facade.name())).count(),
    }))
}

async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": "fabric-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-source data aggregation gateway with fallback chains, cross-source verification, and provenance-annotated responses.",
        "links": {
            "health": "/health",
            "tools": "/tools",
            "registry": "/tools/registry",
        },
    }))
}

async fn list_tools_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools: Vec<Value> = state
        .registry
        .list()
        .iter()
        .filter(|facade| state.config.is_tool_enabled(facade.name()))
        .map(|facade| {
            json!({
                "name": facade.name(),
                "description": facade.description(),
                "endpoint": format!("/tools/{}", facade.name()),
            })
        })
        .collect();
    Json(json!({ "tools": tools }))
}

/// Full registry entry for `facade`: everything the minimal `/tools` list
/// omits (schemas, examples, capabilities, freshness, limitations, cost
/// hints). Shared by `GET /tools/registry` (all entries) and `GET
/// /tools/{name}` (one entry).
fn registry_entry(facade: &dyn crate::tools::ToolFacade, config: &Config) -> Value {
    let capabilities = facade.capabilities();
    let typical_ttl_seconds = capabilities.iter().map(|capability| config.ttl_policy.ttl_seconds(facade.name(), capability)).max().unwrap_or(crate::config::DEFAULT_TTL_SECONDS);

    let output_properties: serde_json::Map<String, Value> = capabilities
        .iter()
        .map(|capability| ((*capability).to_string(), json!({"type": ["object", "null"], "description": format!("populated when the '{capability}' capability succeeds; null with a warning otherwise")})))
        .collect();

    json!({
        "name": facade.name(),
        "description": facade.description(),
        "endpoint": format!("/tools/{}", facade.name()),
        "input_schema": facade.input_schema().to_json_schema(),
        "output_schema": {
            "type": "object",
            "properties": {
                "data": {"type": "object", "properties": Value::Object(output_properties)},
                "source_meta": {"type": "array"},
                "conflicts": {"type": "array"},
                "warnings": {"type": "array", "items": {"type": "string"}},
                "as_of_utc": {"type": "string", "format": "date-time"},
            },
        },
        "examples": [facade.example_arguments()],
        "capabilities": capabilities,
        "freshness": {
            "typical_ttl_seconds": typical_ttl_seconds,
            "as_of_semantics": "envelope.as_of_utc is the response build time and is never older than any contributing source_meta.as_of_utc; a cache hit restores the original fetch's source_meta verbatim rather than advancing its as_of_utc",
        },
        "limitations": facade.limitations(),
        "cost_hints": {
            "upstream_calls_per_invocation": capabilities.len(),
        },
    })
}

/// Diagnostic view of the full tool registry: every enabled tool's
/// complete entry (schemas, examples, capabilities, freshness,
/// limitations, cost hints).
async fn registry_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries: Vec<Value> = state.registry.list().iter().filter(|facade| state.config.is_tool_enabled(facade.name())).map(|facade| registry_entry(facade.as_ref(), &state.config)).collect();
    Json(json!({ "tools": entries }))
}

async fn describe_tool_handler(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> axum::response::Response {
    let Some(facade) = state.registry.get(&name) else {
        return Error::UnknownTool(name).into_response();
    };
    if !state.config.is_tool_enabled(&name) {
        return Error::UnknownTool(name).into_response();
    }
    Json(registry_entry(facade.as_ref(), &state.config)).into_response()
}

async fn call_tool_handler(State(state): State<Arc<AppState>>, Path(name): Path<String>, Json(arguments): Json<Value>) -> axum::response::Response {
    if !state.config.is_tool_enabled(&name) {
        return Error::ToolDisabled(name).into_response();
    }

    let Some(facade) = state.registry.get(&name) else {
        return Error::UnknownTool(name).into_response();
    };

    let arguments = match sanitize_json_value(&arguments) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = facade.input_schema().validate(&arguments) {
        return e.into_response();
    }

    let asset = crate::tools::evidence_asset(&name, &arguments);
    match facade.invoke(&state.context, arguments).await {
        Ok(envelope) => {
            state.context.emit_evidence(&asset, &envelope);
            Json(envelope).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::config::FailsafeConfig;
    use crate::orchestrator::{CrossSourceVerifier, FallbackEngine};
    use crate::registry::SourceRegistry;

    fn test_state() -> Arc<AppState> {
        let config = Arc::new(Config::default());
        let cache = Arc::new(ResponseCache::new());
        let source_registry = Arc::new(SourceRegistry::from_config(&config, &crate::credentials::CredentialResolver::new()).unwrap());
        let engine = Arc::new(FallbackEngine::new(Arc::clone(&source_registry), cache, FailsafeConfig::default()));
        let verifier = Arc::new(CrossSourceVerifier::new(Arc::clone(&engine)));
        let context = ToolContext::new(engine, verifier, Arc::clone(&config), Arc::new(crate::evidence::LoggingEvidencePersister));
        Arc::new(AppState {
            config,
            registry: Arc::new(ToolRegistry::new()),
            context,
        })
    }

    #[tokio::test]
    async fn health_handler_reports_tool_count() {
        let state = test_state();
        let response = health_handler(State(Arc::clone(&state))).await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn describe_tool_handler_rejects_unknown_tool() {
        let state = test_state();
        let response = describe_tool_handler(State(state), Path("does_not_exist".to_string())).await;
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn call_tool_handler_rejects_invalid_arguments() {
        let state = test_state();
        let response = call_tool_handler(State(state), Path("crypto_overview".to_string()), Json(json!({}))).await;
        assert_eq!(response.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn call_tool_handler_rejects_disabled_tool_with_503() {
        let mut config = Config::default();
        config.tools_enabled.insert("crypto_overview".to_string(), false);
        let config = Arc::new(config);
        let cache = Arc::new(ResponseCache::new());
        let source_registry = Arc::new(SourceRegistry::from_config(&config, &crate::credentials::CredentialResolver::new()).unwrap());
        let engine = Arc::new(FallbackEngine::new(Arc::clone(&source_registry), cache, FailsafeConfig::default()));
        let verifier = Arc::new(CrossSourceVerifier::new(Arc::clone(&engine)));
        let context = ToolContext::new(engine, verifier, Arc::clone(&config), Arc::new(crate::evidence::LoggingEvidencePersister));
        let state = Arc::new(AppState {
            config,
            registry: Arc::new(ToolRegistry::new()),
            context,
        });

        let response = call_tool_handler(State(state), Path("crypto_overview".to_string()), Json(json!({"symbol": "BTC"}))).await;
        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn list_tools_handler_omits_disabled_tools() {
        let mut config = Config::default();
        config.tools_enabled.insert("crypto_overview".to_string(), false);
        let config = Arc::new(config);
        let cache = Arc::new(ResponseCache::new());
        let source_registry = Arc::new(SourceRegistry::from_config(&config, &crate::credentials::CredentialResolver::new()).unwrap());
        let engine = Arc::new(FallbackEngine::new(Arc::clone(&source_registry), cache, FailsafeConfig::default()));
        let verifier = Arc::new(CrossSourceVerifier::new(Arc::clone(&engine)));
        let context = ToolContext::new(engine, verifier, Arc::clone(&config), Arc::new(crate::evidence::LoggingEvidencePersister));
        let state = Arc::new(AppState {
            config,
            registry: Arc::new(ToolRegistry::new()),
            context,
        });

        let response = list_tools_handler(State(state)).await.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        let names: Vec<&str> = value["tools"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(!names.contains(&"crypto_overview"));
        assert!(names.contains(&"market_microstructure"));
    }

    #[tokio::test]
    async fn list_tools_handler_entries_are_minimal() {
        let state = test_state();
        let response = list_tools_handler(State(state)).await.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        let first = &value["tools"][0];
        assert!(first["endpoint"].is_string());
        assert!(first["input_schema"].is_null(), "minimal /tools entries should not carry a full schema");
    }

    #[tokio::test]
    async fn registry_handler_entries_carry_full_metadata() {
        let state = test_state();
        let response = registry_handler(State(Arc::clone(&state))).await.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        let entries = value["tools"].as_array().unwrap();
        let crypto = entries.iter().find(|e| e["name"] == "crypto_overview").unwrap();
        assert_eq!(crypto["endpoint"], "/tools/crypto_overview");
        assert!(crypto["input_schema"].is_object());
        assert!(crypto["output_schema"].is_object());
        assert!(crypto["examples"].as_array().unwrap().first().is_some());
        assert!(crypto["capabilities"].as_array().unwrap().contains(&json!("market")));
        assert!(crypto["freshness"]["typical_ttl_seconds"].as_u64().unwrap() > 0);
        assert!(crypto["limitations"].as_array().unwrap().iter().any(|l| l.as_str().unwrap().contains("holders")));
    }

    #[tokio::test]
    async fn describe_tool_handler_returns_full_registry_entry() {
        let state = test_state();
        let response = describe_tool_handler(State(Arc::clone(&state)), Path("market_microstructure".to_string())).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["name"], "market_microstructure");
        assert!(value["output_schema"].is_object());
    }
}
