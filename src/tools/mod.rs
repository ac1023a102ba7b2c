//! Tool façades: the thin, data-driven layer between a transport's
//! `call_tool` and the orchestration core.
//!
//! Each façade declares its [`validation::ToolInputSchema`] and a fixed set
//! of capabilities, then drives [`crate::orchestrator::FallbackEngine`] (and,
//! for capabilities that opt in, [`crate::orchestrator::CrossSourceVerifier`])
//! to fill in an [`crate::orchestrator::EnvelopeBuilder`]. A failed
//! capability becomes a warning on the envelope, not a failed invocation:
//! every façade below keeps going on a per-capability basis and always
//! returns `Ok(builder.build())`, even when every capability failed and
//! `data` ends up empty. A fully empty, all-warnings envelope is a valid
//! 200/success response (spec's "partial success is the norm" and "a fully
//! empty envelope with only warnings is a valid response"); `invoke` only
//! returns `Err` for input that fails validation before any capability
//! runs.

mod crypto_overview;
mod derivatives_overview;
mod market_microstructure;
mod onchain_tvl_fees;
mod onchain_whale_activity;
mod sentiment_overview;

pub use crypto_overview::CryptoOverviewTool;
pub use derivatives_overview::DerivativesOverviewTool;
pub use market_microstructure::MarketMicrostructureTool;
pub use onchain_tvl_fees::OnchainTvlFeesTool;
pub use onchain_whale_activity::OnchainWhaleActivityTool;
pub use sentiment_overview::SentimentOverviewTool;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::model::{Conflict, Envelope, SourceDescriptor, SourceMeta};
use crate::orchestrator::{ConflictResolver, CrossSourceVerifier, EnvelopeBuilder, FallbackEngine, FieldObservation};
use crate::validation::ToolInputSchema;
use crate::{Error, Result};

/// A resolution strategy a façade can ask [`ToolContext::fetch_cross_checked`]
/// to apply when both sides of a cross-check succeed.
#[derive(Debug, Clone, Copy)]
pub enum CrossCheckStrategy {
    /// Average within threshold, else primary wins. See spec's divergence
    /// table for `price`-like fields.
    AverageOrPrimary,
    /// Whichever side's `SourceMeta::as_of_utc` is more recent wins,
    /// regardless of divergence.
    LatestTimestamp,
}

/// One capability's outcome after an (optionally cross-checked) fetch.
pub struct CrossCheckOutcome {
    /// The normalized payload, with any resolved conflict already applied.
    pub payload: Value,
    /// Provenance for every contribution that produced this payload (one
    /// entry for a plain fetch or a degraded single-side cross-check, two
    /// for a fully cross-checked one).
    pub source_meta: Vec<SourceMeta>,
    /// The recorded divergence, if both sides succeeded and had a
    /// comparable value.
    pub conflict: Option<Conflict>,
    /// Set when only one side of the cross-check produced a result,
    /// naming whichever source was missing (spec's "envelope warnings
    /// contain a string referencing the primary name" requirement for a
    /// primary-timeout-secondary-success outcome).
    pub warning: Option<String>,
}

/// Shared orchestration handles every tool façade is built with. Cheap to
/// clone: everything inside is already `Arc`-wrapped or a handle over one.
#[derive(Clone)]
pub struct ToolContext {
    engine: Arc<FallbackEngine>,
    verifier: Arc<CrossSourceVerifier>,
    config: Arc<Config>,
    evidence_persister: Arc<dyn crate::evidence::EvidencePersister>,
}

impl ToolContext {
    /// Build a context over the shared fallback engine, verifier, and
    /// resolved configuration, persisting evidence bundles through
    /// `evidence_persister` (fire-and-forget, per spec §6).
    #[must_use]
    pub fn new(engine: Arc<FallbackEngine>, verifier: Arc<CrossSourceVerifier>, config: Arc<Config>, evidence_persister: Arc<dyn crate::evidence::EvidencePersister>) -> Self {
        Self {
            engine,
            verifier,
            config,
            evidence_persister,
        }
    }

    /// Build an [`crate::evidence::EvidenceBundle`] from a finished
    /// envelope and hand it to the configured persister on a detached
    /// task. The core never awaits or depends on the result — a
    /// persistence sidecar's failure must not affect the response already
    /// returned to the caller.
    pub fn emit_evidence(&self, asset: &str, envelope: &Envelope) {
        if envelope.source_meta.is_empty() {
            return;
        }
        let bundle_id = uuid::Uuid::new_v4().to_string();
        let bundle = crate::evidence::EvidenceBundle::from_envelope(bundle_id, asset, envelope);
        let persister = Arc::clone(&self.evidence_persister);
        tokio::spawn(async move {
            persister.persist(&bundle).await;
        });
    }

    fn chain(&self, tool: &str, capability: &str) -> Vec<SourceDescriptor> {
        self.config.chains.chain(tool, capability).to_vec()
    }

    fn ttl(&self, tool: &str, capability: &str) -> u64 {
        self.config.ttl_policy.ttl_seconds(tool, capability)
    }

    /// Snapshot of the shared cache's hit/miss/eviction counters.
    #[must_use]
    pub fn cache_stats(&self) -> crate::cache::CacheStatsSnapshot {
        self.engine.cache_stats()
    }

    /// Every registered source adapter's name.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        self.engine.source_names()
    }

    /// Whether `tool` is enabled by configuration. Both transports consult
    /// this before registering or invoking a tool.
    #[must_use]
    pub fn is_tool_enabled(&self, tool: &str) -> bool {
        self.config.is_tool_enabled(tool)
    }

    /// Plain (non-cross-checked) capability fetch: cache check, then the
    /// configured chain in priority order.
    pub async fn fetch(&self, tool: &str, capability: &str, endpoint: &str, params: &Value, data_type: &str, symbol: Option<&str>) -> Result<(Value, SourceMeta)> {
        let chain = self.chain(tool, capability);
        let ttl = self.ttl(tool, capability);
        self.engine.fetch(tool, capability, endpoint, params, data_type, symbol, &chain, ttl).await
    }

    /// Cross-checked capability fetch: the first two chain entries (by
    /// priority) are queried in parallel via the verifier, `field` is
    /// compared between them, and `strategy` decides which value (or
    /// their average) propagates. Falls back to a plain [`Self::fetch`] if
    /// fewer than two sources are configured for `(tool, capability)`.
    #[allow(clippy::too_many_arguments)]
    pub async fn fetch_cross_checked(
        &self,
        tool: &str,
        capability: &str,
        endpoint: &str,
        params: &Value,
        data_type: &str,
        field: &str,
        strategy: CrossCheckStrategy,
    ) -> Result<CrossCheckOutcome> {
        let mut chain = self.chain(tool, capability);
        if chain.len() < 2 {
            let (payload, meta) = self.fetch(tool, capability, endpoint, params, data_type, None).await?;
            return Ok(CrossCheckOutcome {
                payload,
                source_meta: vec![meta],
                conflict: None,
                warning: None,
            });
        }
        chain.sort_by_key(|d| d.priority);
        let primary_name = chain[0].name.clone();
        let secondary_name = chain[1].name.clone();
        let ttl = self.ttl(tool, capability);

        let outcome = self.verifier.verify(&primary_name, &secondary_name, endpoint, params, data_type, ttl).await;

        match (outcome.primary, outcome.secondary) {
            (Some((mut payload, primary_meta)), Some((secondary_payload, secondary_meta))) => {
                let conflict = Self::resolve(field, &payload, &secondary_payload, &primary_meta, &secondary_meta, self.config.conflict_threshold(field), strategy);
                if let Some(ref conflict) = conflict {
                    ConflictResolver::apply(&mut payload, conflict);
                }
                Ok(CrossCheckOutcome {
                    payload,
                    source_meta: vec![primary_meta, secondary_meta],
                    conflict,
                    warning: None,
                })
            }
            (Some((payload, meta)), None) => Ok(CrossCheckOutcome {
                payload,
                source_meta: vec![meta],
                conflict: None,
                warning: Some(format!("cross-check secondary source '{secondary_name}' unavailable for capability '{capability}'; served from '{primary_name}' only")),
            }),
            (None, Some((payload, meta))) => Ok(CrossCheckOutcome {
                payload,
                source_meta: vec![meta.degraded_from(&primary_name)],
                conflict: None,
                warning: Some(format!("primary source '{primary_name}' failed for capability '{capability}'; served from fallback source '{secondary_name}'")),
            }),
            (None, None) => {
                let mut errors = std::collections::HashMap::new();
                errors.insert(primary_name, "cross-check source unavailable".to_string());
                errors.insert(secondary_name, "cross-check source unavailable".to_string());
                Err(Error::AllSourcesFailed {
                    capability: capability.to_string(),
                    errors,
                })
            }
        }
    }

    fn resolve(field: &str, primary_payload: &Value, secondary_payload: &Value, primary_meta: &SourceMeta, secondary_meta: &SourceMeta, threshold_percent: f64, strategy: CrossCheckStrategy) -> Option<Conflict> {
        let primary_value = primary_payload.get(field).and_then(Value::as_f64)?;
        let secondary_value = secondary_payload.get(field).and_then(Value::as_f64)?;

        let primary = FieldObservation {
            provider: "primary",
            value: primary_value,
            as_of_utc: primary_meta.as_of_utc,
        };
        let secondary = FieldObservation {
            provider: "secondary",
            value: secondary_value,
            as_of_utc: secondary_meta.as_of_utc,
        };

        Some(match strategy {
            CrossCheckStrategy::AverageOrPrimary => ConflictResolver::resolve_average_or_primary(field, &primary, &secondary, threshold_percent),
            CrossCheckStrategy::LatestTimestamp => ConflictResolver::resolve_latest_timestamp(field, &primary, &secondary),
        })
    }
}

/// The uniform contract every tool façade satisfies: a `list_tools` entry
/// (name, description, schema) plus the `invoke` that produces an
/// [`Envelope`] from validated `arguments`.
#[async_trait]
pub trait ToolFacade: Send + Sync {
    /// Stable tool name, as it appears in `list_tools` and `call_tool`.
    fn name(&self) -> &'static str;

    /// One-line human-readable description for `list_tools`.
    fn description(&self) -> &'static str;

    /// Declared input shape, used both to render `list_tools`'s JSON
    /// Schema and to validate `arguments` before `invoke` runs.
    fn input_schema(&self) -> &'static ToolInputSchema;

    /// Every capability name this tool can populate, in the order
    /// `include_fields: ["all"]` runs them. Used by the `/tools/registry`
    /// diagnostic surface, not by `invoke` itself.
    fn capabilities(&self) -> &'static [&'static str];

    /// One valid `arguments` payload for this tool, shown in the
    /// `/tools/registry` diagnostic surface. Defaults to an empty object
    /// for tools that don't override it.
    fn example_arguments(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// Known caveats a caller should know before trusting this tool's
    /// output (e.g. a capability that needs extra disambiguating
    /// parameters, or a single-source capability with no fallback).
    /// Defaults to none.
    fn limitations(&self) -> &'static [&'static str] {
        &[]
    }

    /// Run every capability this tool covers against `arguments`,
    /// accumulating into an [`Envelope`]. Capability failures become
    /// warnings, never an `Err` — even a fully empty, all-warnings
    /// envelope is returned as `Ok`. `Err` is reserved for arguments that
    /// fail validation before any capability runs.
    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> Result<Envelope>;
}

/// Best-effort subject label for an evidence bundle: whichever of the
/// common identifying parameters a façade's `arguments` carries, falling
/// back to the tool name when none match (e.g. a tool with no single
/// subject, or arguments that failed to parse before invocation ran).
#[must_use]
pub fn evidence_asset(tool: &str, arguments: &Value) -> String {
    for field in ["symbol", "pair", "protocol"] {
        if let Some(value) = arguments.get(field).and_then(Value::as_str) {
            return value.to_uppercase();
        }
    }
    tool.to_string()
}

/// Reads `include_fields` from `arguments`, expanding `"all"` into
/// `defaults`. Absent `include_fields` also means "run every default
/// capability" — this mirrors `tools/crypto/overview.py`'s
/// `include_fields` handling, where an unset selector is as permissive as
/// an explicit `"all"`.
#[must_use]
pub fn requested_capabilities(arguments: &Value, defaults: &[&'static str]) -> Vec<&'static str> {
    let Some(requested) = arguments.get("include_fields").and_then(Value::as_array) else {
        return defaults.to_vec();
    };
    let requested: Vec<String> = requested.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
    if requested.iter().any(|r| r == "all") {
        return defaults.to_vec();
    }
    defaults.iter().copied().filter(|capability| requested.iter().any(|r| r == capability)).collect()
}

/// A registry of every tool façade the gateway serves, keyed by name. Built
/// once at startup and shared read-only by both transports.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolFacade>>,
}

impl ToolRegistry {
    /// Build the registry with the crate's fixed set of façades.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: vec![
                Arc::new(CryptoOverviewTool),
                Arc::new(MarketMicrostructureTool),
                Arc::new(OnchainTvlFeesTool),
                Arc::new(DerivativesOverviewTool),
                Arc::new(SentimentOverviewTool),
                Arc::new(OnchainWhaleActivityTool),
            ],
        }
    }

    /// Every registered façade, in declaration order.
    #[must_use]
    pub fn list(&self) -> &[Arc<dyn ToolFacade>] {
        &self.tools
    }

    /// Look up a façade by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolFacade>> {
        self.tools.iter().find(|tool| tool.name() == name).cloned()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn registry_finds_every_tool_by_name() {
        let registry = ToolRegistry::new();
        for name in ["crypto_overview", "market_microstructure", "onchain_tvl_fees", "derivatives_overview", "sentiment_overview", "onchain_whale_activity"] {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn requested_capabilities_defaults_when_field_absent() {
        let defaults = &["basic", "market"];
        assert_eq!(requested_capabilities(&json!({}), defaults), defaults.to_vec());
    }

    #[test]
    fn requested_capabilities_expands_all() {
        let defaults = &["basic", "market", "supply"];
        assert_eq!(requested_capabilities(&json!({"include_fields": ["all"]}), defaults), defaults.to_vec());
    }

    #[test]
    fn requested_capabilities_filters_to_named_subset() {
        let defaults = &["basic", "market", "supply"];
        assert_eq!(requested_capabilities(&json!({"include_fields": ["supply"]}), defaults), vec!["supply"]);
    }

    #[test]
    fn evidence_asset_prefers_symbol_then_pair_then_protocol() {
        assert_eq!(evidence_asset("crypto_overview", &json!({"symbol": "btc"})), "BTC");
        assert_eq!(evidence_asset("market_microstructure", &json!({"pair": "btc/usdt"})), "BTC/USDT");
        assert_eq!(evidence_asset("onchain_tvl_fees", &json!({"protocol": "aave"})), "AAVE");
    }

    #[test]
    fn evidence_asset_falls_back_to_tool_name() {
        assert_eq!(evidence_asset("onchain_whale_activity", &json!({})), "onchain_whale_activity");
    }
}
