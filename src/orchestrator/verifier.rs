//! Cross-source verifier: parallel fan-out to exactly two adapters for a
//! capability a tool has opted into cross-checking, used by the conflict
//! resolver downstream.

use std::sync::Arc;

use serde_json::Value;

use super::fallback::FallbackEngine;
use crate::model::SourceMeta;

/// Result of fetching one capability from both a primary and a secondary
/// source in parallel. Either side may be absent if that source failed.
pub struct VerifyOutcome {
    /// Primary source's result, if it succeeded.
    pub primary: Option<(Value, SourceMeta)>,
    /// Secondary source's result, if it succeeded.
    pub secondary: Option<(Value, SourceMeta)>,
}

/// Fetches a capability from two named sources concurrently. Bypasses the
/// fallback engine's cache and chain-ordering entirely — cross-checking
/// needs both sources' raw contributions, not whichever one wins first.
pub struct CrossSourceVerifier {
    engine: Arc<FallbackEngine>,
}

impl CrossSourceVerifier {
    /// Build a verifier over the same engine the fallback path uses, so
    /// both honor the same per-source rate limiter and circuit state.
    #[must_use]
    pub fn new(engine: Arc<FallbackEngine>) -> Self {
        Self { engine }
    }

    /// Fetch `data_type` from `primary_source` and `secondary_source` at
    /// once. Both calls proceed even if one would have been served from
    /// the shared cache under the ordinary fallback path.
    pub async fn verify(&self, primary_source: &str, secondary_source: &str, endpoint: &str, params: &Value, data_type: &str, ttl_seconds: u64) -> VerifyOutcome {
        let (primary, secondary) = tokio::join!(
            self.engine.attempt(primary_source, endpoint, params, data_type, ttl_seconds),
            self.engine.attempt(secondary_source, endpoint, params, data_type, ttl_seconds),
        );
        VerifyOutcome {
            primary: primary.ok(),
            secondary: secondary.ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::adapter::{Adapter, AdapterError, AdapterResult};
    use crate::cache::ResponseCache;
    use crate::config::{Config, FailsafeConfig};
    use crate::credentials::CredentialResolver;
    use crate::registry::SourceRegistry;

    struct MockAdapter {
        provider: &'static str,
        should_succeed: bool,
    }

    #[async_trait]
    impl Adapter for MockAdapter {
        fn name(&self) -> &str {
            self.provider
        }

        async fn fetch_raw(&self, _endpoint: &str, _params: &Value) -> AdapterResult<Value> {
            if self.should_succeed {
                Ok(json!({"price": 1.0}))
            } else {
                Err(AdapterError::Timeout("deadline exceeded".to_string()))
            }
        }

        fn transform(&self, raw: Value, _data_type: &str) -> AdapterResult<Value> {
            Ok(raw)
        }
    }

    fn verifier_with(primary_ok: bool, secondary_ok: bool) -> CrossSourceVerifier {
        let registry = Arc::new(SourceRegistry::from_config(&Config::default(), &CredentialResolver::new()).unwrap());
        registry.insert(Arc::new(MockAdapter {
            provider: "coingecko",
            should_succeed: primary_ok,
        }));
        registry.insert(Arc::new(MockAdapter {
            provider: "binance",
            should_succeed: secondary_ok,
        }));
        let engine = Arc::new(FallbackEngine::new(registry, Arc::new(ResponseCache::new()), FailsafeConfig::default()));
        CrossSourceVerifier::new(engine)
    }

    #[tokio::test]
    async fn both_sources_succeeding_yields_both_results() {
        let verifier = verifier_with(true, true);
        let outcome = verifier.verify("coingecko", "binance", "/x", &json!({}), "market", 30).await;
        assert!(outcome.primary.is_some());
        assert!(outcome.secondary.is_some());
    }

    #[tokio::test]
    async fn secondary_failure_leaves_primary_only() {
        let verifier = verifier_with(true, false);
        let outcome = verifier.verify("coingecko", "binance", "/x", &json!({}), "market", 30).await;
        assert!(outcome.primary.is_some());
        assert!(outcome.secondary.is_none());
    }
}
