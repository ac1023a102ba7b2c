//! Configuration management.
//!
//! Loaded from an optional YAML file merged with `FABRIC_GATEWAY_`-prefixed
//! environment variables via `figment`. Three tables drive the
//! orchestration core: the TTL policy (`policy[tool][capability]`), the
//! fallback chain (`chain[tool][capability] → [SourceDescriptor]`), and the
//! per-field conflict threshold table.

use std::{collections::HashMap, env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::SourceDescriptor;
use crate::{Error, Result};

/// Default TTL applied when a `(tool, capability)` has no specific policy
/// entry.
pub(crate) const DEFAULT_TTL_SECONDS: u64 = 60;

/// Default conflict threshold applied when a field has no specific entry.
const DEFAULT_CONFLICT_THRESHOLD_PERCENT: f64 = 0.5;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// `.env` files to load before processing config. Paths support `~`
    /// expansion. Loaded in order, later files override earlier ones.
    /// Variables are set into the process environment so `${VAR}`
    /// expansion and credential resolution can see them.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Cache configuration.
    pub cache: CacheConfig,
    /// Failsafe defaults (circuit breaker / retry / rate limit), overridable
    /// per source in `sources`.
    pub failsafe: FailsafeConfig,
    /// Registered adapter instances, keyed by source name.
    pub sources: HashMap<String, SourceConfig>,
    /// Per-`(tool, capability)` TTL policy, seconds.
    pub ttl_policy: TtlPolicy,
    /// Per-`(tool, capability)` fallback chains.
    pub chains: ChainPolicy,
    /// Per-field conflict divergence threshold, percent.
    #[serde(default)]
    pub conflict_thresholds: HashMap<String, f64>,
    /// Tool enable/disable table, keyed by tool name. A tool absent from
    /// this table is enabled by default.
    #[serde(default)]
    pub tools_enabled: HashMap<String, bool>,
}

/// Static per-source configuration: how to reach it and its credential
/// requirement. Distinct from [`SourceDescriptor`], which is the
/// chain-position view of the same source for one capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL override. Falls back to the adapter's compiled-in default
    /// when absent.
    pub base_url: Option<String>,
    /// Per-call timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Token bucket quota.
    pub rate_limit_per_min: u32,
    /// Whether this source needs a resolved credential to function.
    pub requires_api_key: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(10),
            rate_limit_per_min: 60,
            requires_api_key: false,
        }
    }
}

/// `policy[tool][capability] → ttl_seconds`, with a `default` fallback.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TtlPolicy {
    /// Nested table: tool name → capability name → TTL seconds.
    pub table: HashMap<String, HashMap<String, u64>>,
}

impl TtlPolicy {
    /// Look up the TTL for `(tool, capability)`, falling back to the
    /// capability-wide default, then the crate-wide default.
    #[must_use]
    pub fn ttl_seconds(&self, tool: &str, capability: &str) -> u64 {
        self.table
            .get(tool)
            .and_then(|caps| caps.get(capability).or_else(|| caps.get("default")))
            .copied()
            .unwrap_or(DEFAULT_TTL_SECONDS)
    }
}

/// `chain[tool][capability] → [SourceDescriptor]`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ChainPolicy {
    /// Nested table: tool name → capability name → ordered source chain.
    pub table: HashMap<String, HashMap<String, Vec<SourceDescriptor>>>,
}

impl ChainPolicy {
    /// The configured chain for `(tool, capability)`, or an empty slice if
    /// none is configured.
    #[must_use]
    pub fn chain(&self, tool: &str, capability: &str) -> &[SourceDescriptor] {
        self.table
            .get(tool)
            .and_then(|caps| caps.get(capability))
            .map_or(&[], Vec::as_slice)
    }
}

impl Config {
    /// Divergence threshold (percent) for `field`, or the crate-wide
    /// default.
    #[must_use]
    pub fn conflict_threshold(&self, field: &str) -> f64 {
        self.conflict_thresholds
            .get(field)
            .copied()
            .unwrap_or(DEFAULT_CONFLICT_THRESHOLD_PERCENT)
    }

    /// Whether `tool` is enabled. Absent from the table means enabled.
    #[must_use]
    pub fn is_tool_enabled(&self, tool: &str) -> bool {
        self.tools_enabled.get(tool).copied().unwrap_or(true)
    }

    /// Load configuration from an optional YAML file, merged with
    /// `FABRIC_GATEWAY_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be
    /// parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!("Config file not found: {}", p.display())));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("FABRIC_GATEWAY_").split("__"));

        let mut config: Self = figment.extract().map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.expand_env_vars();

        Ok(config)
    }

    /// Load environment files into the process environment. Files that
    /// don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if let Some(rest) = path_str.strip_prefix('~') {
                dirs::home_dir().map_or_else(|| path_str.clone(), |home| format!("{}{rest}", home.display()))
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand `${VAR}` and `${VAR:-default}` patterns in source base URLs.
    fn expand_env_vars(&mut self) {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("static pattern is valid");

        for source in self.sources.values_mut() {
            if let Some(url) = source.base_url.as_mut() {
                *url = Self::expand_string(&re, url);
            }
        }
    }

    /// Expand environment variable references in a single string.
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Graceful shutdown timeout.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Maximum request body size, bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8420,
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable response caching.
    pub enabled: bool,
    /// Default TTL used when a `(tool, capability)` has no policy entry.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    /// Maximum number of entries before eviction.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            max_entries: 10_000,
        }
    }
}

/// Failsafe defaults (circuit breaker / retry / rate limit), applied to a
/// source unless its own config overrides a field.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FailsafeConfig {
    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Enable circuit breaker.
    pub enabled: bool,
    /// Failure threshold before opening.
    pub failure_threshold: u32,
    /// Success threshold to close.
    pub success_threshold: u32,
    /// Time to wait before half-open.
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            success_threshold: 3,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,
    /// Maximum retry attempts.
    pub max_attempts: u32,
    /// Initial backoff duration.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,
    /// Requests per minute per source.
    pub requests_per_minute: u32,
    /// Burst size.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            burst_size: 10,
        }
    }
}

/// Custom humantime serde module for `Duration`, matching the teacher's
/// `"30s"` / `"5m"` / `"100ms"` string encoding.
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize a `Duration` as a human-readable string (e.g. `"30s"`).
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize a human-readable duration string (e.g. `"30s"`, `"5m"`,
    /// `"100ms"`).
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a
    /// duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>().map(Duration::from_secs).map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>().map(Duration::from_millis).map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>().map(Duration::from_secs).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn ttl_policy_falls_back_to_capability_default_then_crate_default() {
        let mut table = HashMap::new();
        table.insert("market".to_string(), 30u64);
        table.insert("default".to_string(), 45u64);
        let mut policy = TtlPolicy::default();
        policy.table.insert("crypto_overview".to_string(), table);

        assert_eq!(policy.ttl_seconds("crypto_overview", "market"), 30);
        assert_eq!(policy.ttl_seconds("crypto_overview", "holders"), 45);
        assert_eq!(policy.ttl_seconds("unknown_tool", "market"), DEFAULT_TTL_SECONDS);
    }

    #[test]
    fn conflict_threshold_defaults_when_unconfigured() {
        let config = Config::default();
        assert!((config.conflict_threshold("price") - DEFAULT_CONFLICT_THRESHOLD_PERCENT).abs() < f64::EPSILON);
    }

    #[test]
    fn tool_enabled_defaults_to_true() {
        let mut config = Config::default();
        assert!(config.is_tool_enabled("crypto_overview"));
        config.tools_enabled.insert("crypto_overview".to_string(), false);
        assert!(!config.is_tool_enabled("crypto_overview"));
    }

    #[test]
    fn load_env_files_sets_env_vars() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join("test.env");
        let mut f = std::fs::File::create(&env_path).unwrap();
        writeln!(f, "FABRIC_GW_TEST_KEY=hello_from_env_file").unwrap();
        drop(f);

        let config = Config {
            env_files: vec![env_path.to_string_lossy().to_string()],
            ..Default::default()
        };
        config.load_env_files();

        assert_eq!(env::var("FABRIC_GW_TEST_KEY").unwrap(), "hello_from_env_file");
    }

    #[test]
    fn load_env_files_skips_missing() {
        let config = Config {
            env_files: vec!["/nonexistent/path/.env".to_string()],
            ..Default::default()
        };
        config.load_env_files();
    }

    #[test]
    fn chain_policy_returns_empty_slice_when_unconfigured() {
        let policy = ChainPolicy::default();
        assert!(policy.chain("market_microstructure", "ticker").is_empty());
    }
}
