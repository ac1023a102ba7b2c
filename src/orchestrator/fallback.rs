//! The fallback engine: THE CORE. Turns `(tool, capability, params)` into a
//! provenance-annotated result by trying each configured source in priority
//! order until one succeeds, consulting the cache first and recording every
//! per-source failure along the way.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::config::FailsafeConfig;
use crate::failsafe::{Failsafe, with_retry};
use crate::model::{CacheEntry, SourceDescriptor, SourceMeta};
use crate::registry::SourceRegistry;
use crate::{Error, Result};

/// Given `(tool, capability, endpoint, params, data_type)`, resolves a
/// single normalized payload plus provenance, trying each source in a
/// configured chain in priority order.
pub struct FallbackEngine {
    registry: Arc<SourceRegistry>,
    cache: Arc<ResponseCache>,
    failsafes: DashMap<String, Failsafe>,
    failsafe_defaults: FailsafeConfig,
}

impl FallbackEngine {
    /// Build an engine over a registry and cache, using `failsafe_defaults`
    /// for every source's circuit breaker / rate limiter / retry policy.
    #[must_use]
    pub fn new(registry: Arc<SourceRegistry>, cache: Arc<ResponseCache>, failsafe_defaults: FailsafeConfig) -> Self {
        Self {
            registry,
            cache,
            failsafes: DashMap::new(),
            failsafe_defaults,
        }
    }

    /// Snapshot of the shared cache's hit/miss/eviction counters, for the
    /// `GET /health` diagnostic surface.
    #[must_use]
    pub fn cache_stats(&self) -> crate::cache::CacheStatsSnapshot {
        self.cache.stats()
    }

    /// Every registered source adapter's name, for the `GET
    /// /tools/registry` diagnostic surface.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn failsafe_for(&self, name: &str) -> Failsafe {
        self.failsafes.entry(name.to_string()).or_insert_with(|| Failsafe::new(name, &self.failsafe_defaults)).clone()
    }

    /// One source attempt: registry lookup, failsafe gate, adapter fetch
    /// (retried per the source's [`crate::failsafe::RetryPolicy`] on
    /// transient timeout/transport errors, per the teacher's
    /// `Backend::call`), failsafe bookkeeping. Shared by the fallback loop
    /// and the verifier, which needs the same single-source mechanics
    /// without the cache or chain-ordering wrapped around it.
    pub(super) async fn attempt(&self, source_name: &str, endpoint: &str, params: &Value, data_type: &str, ttl_seconds: u64) -> std::result::Result<(Value, SourceMeta), String> {
        let Some(adapter) = self.registry.get(source_name) else {
            return Err(format!("source '{source_name}' is not registered"));
        };
        let failsafe = self.failsafe_for(source_name);
        if !failsafe.can_proceed() {
            return Err("circuit open or rate limit exhausted".to_string());
        }

        let retry_policy = failsafe.retry_policy.clone();
        let result = with_retry(&retry_policy, source_name, || {
            let adapter = Arc::clone(&adapter);
            let endpoint = endpoint.to_string();
            let params = params.clone();
            let data_type = data_type.to_string();
            async move {
                adapter
                    .fetch(&endpoint, &params, &data_type, ttl_seconds)
                    .await
                    .map_err(|e| Error::data_source(adapter.name(), e.kind(), e.reason()))
            }
        })
        .await;

        match result {
            Ok(value) => {
                failsafe.record_success();
                Ok(value)
            }
            Err(err) => {
                failsafe.record_failure();
                Err(err.to_string())
            }
        }
    }

    /// Resolve `(tool, capability, params)` per spec's five-step algorithm:
    /// cache check, chain resolution, ordered attempt loop, degraded
    /// stamping on non-primary success, and `AllSourcesFailed` on
    /// exhaustion.
    #[allow(clippy::too_many_arguments)]
    pub async fn fetch(
        &self,
        tool: &str,
        capability: &str,
        endpoint: &str,
        params: &Value,
        data_type: &str,
        symbol: Option<&str>,
        chain: &[SourceDescriptor],
        ttl_seconds: u64,
    ) -> Result<(Value, SourceMeta)> {
        let key = ResponseCache::fingerprint(tool, capability, symbol, params);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(%key, tool, capability, "cache hit");
            return Ok((cached.payload, cached.source_meta));
        }

        if chain.is_empty() {
            let mut errors = HashMap::new();
            errors.insert("_".to_string(), "no sources configured".to_string());
            return Err(Error::AllSourcesFailed {
                capability: capability.to_string(),
                errors,
            });
        }

        let mut ordered: Vec<&SourceDescriptor> = chain.iter().collect();
        ordered.sort_by_key(|d| d.priority);
        let primary_name = ordered[0].name.clone();

        let mut errors = HashMap::new();
        for (index, descriptor) in ordered.iter().enumerate() {
            match self.attempt(&descriptor.name, endpoint, params, data_type, ttl_seconds).await {
                Ok((payload, mut meta)) => {
                    if index != 0 {
                        meta = meta.degraded_from(&primary_name);
                        tracing::warn!(source = %descriptor.name, primary = %primary_name, capability, "served from fallback source");
                    }
                    self.cache.set(
                        &key,
                        CacheEntry {
                            payload: payload.clone(),
                            source_meta: meta.clone(),
                        },
                        Duration::from_secs(ttl_seconds),
                    );
                    return Ok((payload, meta));
                }
                Err(reason) => {
                    tracing::warn!(source = %descriptor.name, capability, reason = %reason, "source attempt failed");
                    errors.insert(descriptor.name.clone(), reason);
                }
            }
        }

        Err(Error::AllSourcesFailed {
            capability: capability.to_string(),
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::adapter::{Adapter, AdapterError, AdapterResult};
    use crate::model::SourcePriority;

    struct MockAdapter {
        provider: &'static str,
        outcome: MockOutcome,
    }

    #[derive(Clone)]
    enum MockOutcome {
        Success(Value),
        Fail(AdapterError),
    }

    #[async_trait]
    impl Adapter for MockAdapter {
        fn name(&self) -> &str {
            self.provider
        }

        async fn fetch_raw(&self, _endpoint: &str, _params: &Value) -> AdapterResult<Value> {
            match &self.outcome {
                MockOutcome::Success(v) => Ok(v.clone()),
                MockOutcome::Fail(e) => Err(e.clone()),
            }
        }

        fn transform(&self, raw: Value, _data_type: &str) -> AdapterResult<Value> {
            Ok(raw)
        }
    }

    fn descriptor(name: &str, priority: SourcePriority) -> SourceDescriptor {
        SourceDescriptor {
            name: name.to_string(),
            priority,
            base_url: None,
            timeout_ms: 5_000,
            rate_limit_per_min: 600,
            requires_api_key: false,
        }
    }

    fn engine_with(adapters: Vec<Arc<dyn Adapter>>) -> FallbackEngine {
        let registry = Arc::new(crate::registry::SourceRegistry::from_config(&crate::config::Config::default(), &crate::credentials::CredentialResolver::new()).unwrap());
        for adapter in adapters {
            registry.insert(adapter);
        }
        FallbackEngine::new(registry, Arc::new(ResponseCache::new()), FailsafeConfig::default())
    }

    #[tokio::test]
    async fn empty_chain_fails_with_synthetic_entry() {
        let engine = engine_with(vec![]);
        let err = engine.fetch("crypto_overview", "market", "/x", &json!({}), "market", Some("BTC"), &[], 30).await.unwrap_err();
        match err {
            Error::AllSourcesFailed { errors, .. } => assert!(errors.contains_key("_")),
            other => panic!("expected AllSourcesFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn primary_failure_falls_back_to_secondary_and_marks_degraded() {
        let primary = Arc::new(MockAdapter {
            provider: "coingecko",
            outcome: MockOutcome::Fail(AdapterError::Timeout("deadline exceeded".to_string())),
        });
        let secondary = Arc::new(MockAdapter {
            provider: "binance",
            outcome: MockOutcome::Success(json!({"price": 95_000.0})),
        });
        let engine = engine_with(vec![primary, secondary]);
        let chain = vec![descriptor("coingecko", SourcePriority::Primary), descriptor("binance", SourcePriority::Secondary)];

        let (payload, meta) = engine
            .fetch("market_microstructure", "ticker", "/x", &json!({}), "ticker", Some("BTC/USDT"), &chain, 30)
            .await
            .unwrap();

        assert_eq!(payload["price"], 95_000.0);
        assert!(meta.degraded);
        assert_eq!(meta.fallback_used.as_deref(), Some("coingecko"));
    }

    #[tokio::test]
    async fn all_sources_failing_collects_every_reason() {
        let a = Arc::new(MockAdapter {
            provider: "a",
            outcome: MockOutcome::Fail(AdapterError::NotFound("missing".to_string())),
        });
        let b = Arc::new(MockAdapter {
            provider: "b",
            outcome: MockOutcome::Fail(AdapterError::Decode("bad body".to_string())),
        });
        let engine = engine_with(vec![a, b]);
        let chain = vec![descriptor("a", SourcePriority::Primary), descriptor("b", SourcePriority::Secondary)];

        let err = engine.fetch("onchain_tvl_fees", "tvl", "/x", &json!({}), "tvl", None, &chain, 60).await.unwrap_err();
        match err {
            Error::AllSourcesFailed { errors, .. } => {
                assert_eq!(errors.len(), 2);
                assert!(errors.contains_key("a"));
                assert!(errors.contains_key("b"));
            }
            other => panic!("expected AllSourcesFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_identical_call_is_served_from_cache() {
        let primary = Arc::new(MockAdapter {
            provider: "coingecko",
            outcome: MockOutcome::Success(json!({"price": 1.0})),
        });
        let engine = engine_with(vec![primary]);
        let chain = vec![descriptor("coingecko", SourcePriority::Primary)];

        let (_, first_meta) = engine.fetch("crypto_overview", "market", "/x", &json!({}), "market", Some("ETH"), &chain, 300).await.unwrap();
        let (_, second_meta) = engine.fetch("crypto_overview", "market", "/x", &json!({}), "market", Some("ETH"), &chain, 300).await.unwrap();

        assert_eq!(first_meta.as_of_utc, second_meta.as_of_utc);
    }
}
