//! Source registry: the gateway's fixed set of upstream adapters, keyed by
//! name.
//!
//! Populated once at startup from [`crate::config::Config::sources`] and
//! read-only afterward — the same shape as the teacher's
//! `backend::BackendRegistry`, generalized from "named MCP backend" to
//! "named upstream data source adapter".

use std::sync::Arc;

use dashmap::DashMap;

use crate::adapter::{
    Adapter, BinanceAdapter, CoinGeckoAdapter, CoinglassAdapter, CryptoPanicAdapter, DefiLlamaAdapter, EtherscanAdapter, GithubAdapter, LunarCrushAdapter, TheGraphAdapter,
    WhaleAlertAdapter,
};
use crate::config::{Config, SourceConfig};
use crate::credentials::CredentialResolver;
use crate::{Error, Result};

/// `DashMap<String, Arc<dyn Adapter>>` registry, built from config at
/// gateway construction and consulted read-only thereafter.
pub struct SourceRegistry {
    adapters: DashMap<String, Arc<dyn Adapter>>,
}

impl SourceRegistry {
    /// Build a registry from the configured `[sources]` table, resolving
    /// each source's credential (if `requires_api_key`) via `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a configured source name isn't one of
    /// the adapters this crate ships, or if it requires a credential that
    /// didn't resolve.
    pub fn from_config(config: &Config, credentials: &CredentialResolver) -> Result<Self> {
        let adapters = DashMap::new();
        for (name, source) in &config.sources {
            let adapter = build_adapter(name, source, credentials)?;
            adapters.insert(name.clone(), adapter);
        }
        Ok(Self { adapters })
    }

    /// Look up an adapter by its registered name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether a source with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether the registry has no adapters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// All registered adapter names, for the `GET /tools/registry`
    /// diagnostic surface.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.adapters.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Insert a pre-built adapter directly, bypassing the config-driven
    /// factory. Used by tests that need a mock adapter in place of a real
    /// upstream; hot-swapping a live registry is otherwise out of scope
    /// (spec §4.4).
    pub fn insert(&self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }
}

/// Chain-aware etherscan-family prefix: `etherscan_<chain>` sources all
/// resolve to an [`EtherscanAdapter`] configured for that chain.
const ETHERSCAN_PREFIX: &str = "etherscan_";

fn build_adapter(name: &str, source: &SourceConfig, credentials: &CredentialResolver) -> Result<Arc<dyn Adapter>> {
    let api_key = source.requires_api_key.then(|| credentials.api_key(name)).flatten();
    if source.requires_api_key && api_key.is_none() {
        return Err(Error::Config(format!("source '{name}' requires an API key but none resolved")));
    }

    let adapter: Arc<dyn Adapter> = match name {
        "coingecko" => Arc::new(CoinGeckoAdapter::new(source.base_url.clone(), api_key, source.timeout)),
        "binance" => Arc::new(BinanceAdapter::new(source.base_url.clone(), source.timeout)),
        "defillama" => Arc::new(DefiLlamaAdapter::new(source.base_url.clone(), source.timeout)),
        "coinglass" => Arc::new(CoinglassAdapter::new(source.base_url.clone(), api_key, source.timeout)),
        "thegraph" => Arc::new(TheGraphAdapter::new(api_key, source.timeout)),
        "github" => Arc::new(GithubAdapter::new(source.base_url.clone(), api_key, source.timeout)),
        "whale_alert" => Arc::new(WhaleAlertAdapter::new(source.base_url.clone(), api_key, source.timeout)),
        "cryptopanic" => Arc::new(CryptoPanicAdapter::new(source.base_url.clone(), api_key, source.timeout)),
        "lunarcrush" => Arc::new(LunarCrushAdapter::new(source.base_url.clone(), api_key, source.timeout)),
        _ if name.starts_with(ETHERSCAN_PREFIX) => {
            let chain = &name[ETHERSCAN_PREFIX.len()..];
            Arc::new(EtherscanAdapter::new(chain, source.base_url.clone(), api_key, source.timeout))
        }
        other => return Err(Error::Config(format!("unknown source adapter '{other}'"))),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn source(requires_api_key: bool) -> SourceConfig {
        SourceConfig {
            base_url: None,
            timeout: Duration::from_secs(10),
            rate_limit_per_min: 60,
            requires_api_key,
        }
    }

    #[test]
    fn builds_known_adapters_by_name() {
        let mut sources = std::collections::HashMap::new();
        sources.insert("coingecko".to_string(), source(false));
        sources.insert("binance".to_string(), source(false));
        let mut config = Config::default();
        config.sources = sources;

        let registry = SourceRegistry::from_config(&config, &CredentialResolver::new()).unwrap();
        assert!(registry.contains("coingecko"));
        assert!(registry.contains("binance"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn etherscan_prefixed_name_resolves_to_a_chain_adapter() {
        let mut sources = std::collections::HashMap::new();
        sources.insert("etherscan_ethereum".to_string(), source(false));
        let mut config = Config::default();
        config.sources = sources;

        let registry = SourceRegistry::from_config(&config, &CredentialResolver::new()).unwrap();
        assert!(registry.contains("etherscan_ethereum"));
    }

    #[test]
    fn unknown_source_name_is_a_config_error() {
        let mut sources = std::collections::HashMap::new();
        sources.insert("not_a_real_adapter".to_string(), source(false));
        let mut config = Config::default();
        config.sources = sources;

        let err = SourceRegistry::from_config(&config, &CredentialResolver::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_required_credential_is_a_config_error() {
        let mut sources = std::collections::HashMap::new();
        sources.insert("coinglass".to_string(), source(true));
        let mut config = Config::default();
        config.sources = sources;

        let err = SourceRegistry::from_config(&config, &CredentialResolver::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
