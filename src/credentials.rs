//! Credential resolution for upstream adapters.
//!
//! The core only ever asks for a resolved credential string; it never reads
//! environment variables directly. Adapted from the teacher's
//! `secrets::SecretResolver`, dropping the keychain lookup path (out of
//! scope here) and generalizing `{env.VAR}` substitution into the
//! `<PROVIDER>_API_KEY` / `<PROVIDER>_API_SECRET` naming convention.

use dashmap::DashMap;

/// Suffix appended to an upper-cased provider name to form its API key env
/// var, e.g. `coingecko` → `COINGECKO_API_KEY`.
const API_KEY_SUFFIX: &str = "_API_KEY";

/// Suffix appended to an upper-cased provider name to form its API secret
/// env var, e.g. `binance` → `BINANCE_API_SECRET`.
const API_SECRET_SUFFIX: &str = "_API_SECRET";

/// Resolves provider credentials from the process environment, with a
/// per-session cache so repeated lookups don't re-read `std::env`.
pub struct CredentialResolver {
    cache: DashMap<String, Option<String>>,
}

impl CredentialResolver {
    /// Create a new resolver with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self { cache: DashMap::new() }
    }

    /// Resolve `<PROVIDER>_API_KEY` for `provider`, e.g. `"coingecko"` →
    /// the value of `COINGECKO_API_KEY`.
    #[must_use]
    pub fn api_key(&self, provider: &str) -> Option<String> {
        self.resolve_env(&Self::env_var_name(provider, API_KEY_SUFFIX))
    }

    /// Resolve `<PROVIDER>_API_SECRET` for `provider`.
    #[must_use]
    pub fn api_secret(&self, provider: &str) -> Option<String> {
        self.resolve_env(&Self::env_var_name(provider, API_SECRET_SUFFIX))
    }

    /// Build the conventional env var name for a provider and suffix.
    fn env_var_name(provider: &str, suffix: &str) -> String {
        format!("{}{suffix}", provider.to_uppercase().replace(['-', '.'], "_"))
    }

    /// Look up and cache an environment variable by name.
    fn resolve_env(&self, var_name: &str) -> Option<String> {
        if let Some(cached) = self.cache.get(var_name) {
            return cached.clone();
        }
        let value = std::env::var(var_name).ok();
        self.cache.insert(var_name.to_string(), value.clone());
        value
    }

    /// Clear the session cache. Used by tests and by operational reload.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_name_upper_cases_and_normalizes_provider() {
        assert_eq!(CredentialResolver::env_var_name("coingecko", API_KEY_SUFFIX), "COINGECKO_API_KEY");
        assert_eq!(CredentialResolver::env_var_name("the-graph", API_KEY_SUFFIX), "THE_GRAPH_API_KEY");
    }

    #[test]
    fn api_key_resolves_an_already_set_environment_variable() {
        // `PATH` is always set; this only exercises the env-var plumbing,
        // not a real provider convention. `env::set_var` is unsafe under
        // edition 2024 and this lib forbids unsafe, so tests read existing
        // variables rather than setting their own (teacher's convention).
        let resolver = CredentialResolver::new();
        assert_eq!(resolver.resolve_env("PATH"), std::env::var("PATH").ok());
    }

    #[test]
    fn missing_credential_resolves_to_none() {
        let resolver = CredentialResolver::new();
        assert_eq!(resolver.api_key("definitely_not_a_configured_provider_xyz"), None);
    }

    #[test]
    fn clear_cache_forces_a_fresh_lookup() {
        let resolver = CredentialResolver::new();
        assert_eq!(resolver.api_key("some_uncached_provider"), None);
        resolver.clear_cache();
        assert_eq!(resolver.api_key("some_uncached_provider"), None);
    }
}
