//! Core data model: provenance, conflicts, envelopes, and the tagged
//! capability payload shapes adapters produce.
//!
//! These are plain serde structs, kept separate from the logic that builds
//! them (the orchestrator) the way the teacher keeps wire types in
//! `protocol::messages` apart from the code that drives them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provenance for one upstream contribution to an envelope.
///
/// Immutable once built. Every successful upstream call produces exactly
/// one; a cache hit restores the original verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceMeta {
    /// Provider id, e.g. `"coingecko"`.
    pub provider: String,
    /// Upstream endpoint path that was called.
    pub endpoint: String,
    /// RFC-3339 timestamp (with `Z`) of when this contribution was fetched.
    pub as_of_utc: DateTime<Utc>,
    /// Time-to-live, from the capability-indexed policy table.
    pub ttl_seconds: u64,
    /// Contract version string.
    #[serde(default = "default_contract_version")]
    pub version: String,
    /// `true` when this came from a non-primary source in the fallback chain.
    #[serde(default)]
    pub degraded: bool,
    /// The primary source's name, set only when `degraded` is `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<String>,
    /// Measured upstream round-trip time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

fn default_contract_version() -> String {
    crate::DEFAULT_CONTRACT_VERSION.to_string()
}

impl SourceMeta {
    /// Build a `SourceMeta` for a fresh (non-cached) successful fetch.
    #[must_use]
    pub fn new(provider: impl Into<String>, endpoint: impl Into<String>, ttl_seconds: u64, response_time_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            endpoint: endpoint.into(),
            as_of_utc: Utc::now(),
            ttl_seconds,
            version: default_contract_version(),
            degraded: false,
            fallback_used: None,
            response_time_ms: Some(response_time_ms),
        }
    }

    /// Mark this contribution as having come from a fallback source.
    #[must_use]
    pub fn degraded_from(mut self, primary_name: impl Into<String>) -> Self {
        self.degraded = true;
        self.fallback_used = Some(primary_name.into());
        self
    }
}

/// Strategy used to resolve a divergence between sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The primary source's value always wins.
    PrimarySource,
    /// Arithmetic mean of the two compared values.
    Average,
    /// The value whose `SourceMeta::as_of_utc` is most recent wins.
    LatestTimestamp,
    /// Recorded but not auto-applied; primary propagates unchanged.
    Manual,
}

/// A record of divergence between ≥2 sources on one named field.
///
/// Immutable. Lists all provider values observed, not just the two actually
/// compared, so a future three-way resolution mode is forward-compatible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Dotted field path, e.g. `"price"`.
    pub field: String,
    /// Every provider's observed value for this field.
    pub values: HashMap<String, f64>,
    /// Relative divergence, as a percentage of the primary's value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_percent: Option<f64>,
    /// Absolute divergence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_absolute: Option<f64>,
    /// Which strategy was applied.
    pub resolution: ResolutionStrategy,
    /// The value actually propagated into `data`.
    pub final_value: f64,
}

/// What every tool returns: the single surface contract the transports
/// serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Domain payload; shape depends on the tool and which capabilities ran.
    pub data: Value,
    /// One entry per contributing upstream, in the order responses were
    /// finalized.
    pub source_meta: Vec<SourceMeta>,
    /// Structured divergence records.
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    /// Human-readable warnings (e.g. exhausted fallback chains, ambiguous
    /// input).
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Response timestamp. Never older than any `source_meta[i].as_of_utc`.
    pub as_of_utc: DateTime<Utc>,
    /// Present and `true` only when this response was served from cache.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

impl Envelope {
    /// Start building an envelope with empty data.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: Value::Object(serde_json::Map::new()),
            source_meta: Vec::new(),
            conflicts: Vec::new(),
            warnings: Vec::new(),
            as_of_utc: Utc::now(),
            cached: false,
        }
    }
}

/// The `(payload, source_meta)` pair a cache entry stores. Preserves
/// provenance across hits so a cache hit is indistinguishable from a fresh
/// fetch except for the envelope's `cached` annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The capability's normalized payload.
    pub payload: Value,
    /// Provenance for the fetch that produced `payload`.
    pub source_meta: SourceMeta,
}

/// Relative priority of a source within a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePriority {
    /// Attempted first.
    Primary,
    /// Attempted if primary fails.
    Secondary,
    /// Attempted if primary and secondary fail.
    Tertiary,
    /// Last resort.
    Fallback,
}

/// Static configuration for one source within a `(tool, capability)`
/// fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Adapter name, used to look it up in the [`crate::registry::SourceRegistry`].
    pub name: String,
    /// Ordinal priority within the chain.
    pub priority: SourcePriority,
    /// Base URL override for this chain entry.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-call timeout.
    pub timeout_ms: u64,
    /// Token-bucket quota for this source.
    pub rate_limit_per_min: u32,
    /// Whether this source needs a resolved credential to function.
    #[serde(default)]
    pub requires_api_key: bool,
}

/// Tagged capability payload shapes (design note: "dynamic typing → tagged
/// variants"). Each variant has a fixed field set rather than a free-form
/// map, per the crate's adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "data_type", rename_all = "snake_case")]
pub enum DataType {
    /// Basic token identity/metadata.
    Basic {
        /// Symbol, e.g. `"BTC"`.
        symbol: String,
        /// Display name, e.g. `"Bitcoin"`.
        name: String,
        /// Chain, when the token is chain-scoped.
        #[serde(default)]
        chain: Option<String>,
    },
    /// Spot market quote.
    Market {
        /// Last traded price, quote currency implied by the adapter.
        price: f64,
        /// 24h relative price change, percent.
        #[serde(default)]
        change_24h_percent: Option<f64>,
        /// 24h notional volume.
        #[serde(default)]
        volume_24h: Option<f64>,
    },
    /// Circulating/total supply figures.
    Supply {
        /// Circulating supply.
        circulating: f64,
        /// Total supply, if known.
        #[serde(default)]
        total: Option<f64>,
        /// Max supply, if capped.
        #[serde(default)]
        max: Option<f64>,
    },
    /// Holder distribution summary.
    Holders {
        /// Total number of distinct holder addresses.
        holder_count: u64,
        /// Percentage held by the top 10 addresses.
        #[serde(default)]
        top10_percent: Option<f64>,
    },
    /// Order-book top-of-book / last-trade snapshot for one pair.
    Ticker {
        /// Trading pair, e.g. `"BTC/USDT"`.
        pair: String,
        /// Last trade price.
        last_price: f64,
        /// Best bid.
        #[serde(default)]
        bid: Option<f64>,
        /// Best ask.
        #[serde(default)]
        ask: Option<f64>,
    },
    /// Depth snapshot.
    OrderBook {
        /// Trading pair.
        pair: String,
        /// `(price, size)` bid levels, best first.
        bids: Vec<(f64, f64)>,
        /// `(price, size)` ask levels, best first.
        asks: Vec<(f64, f64)>,
    },
    /// Total value locked for a protocol.
    Tvl {
        /// Protocol slug.
        protocol: String,
        /// TVL in USD.
        tvl_usd: f64,
    },
    /// Protocol fee/revenue figures.
    Fees {
        /// Protocol slug.
        protocol: String,
        /// Trailing 24h fees, USD.
        fees_24h_usd: f64,
        /// Trailing 24h protocol revenue, USD.
        #[serde(default)]
        revenue_24h_usd: Option<f64>,
    },
    /// Perpetual funding rate.
    FundingRate {
        /// Trading pair.
        pair: String,
        /// Funding rate, as a fraction (e.g. `0.0001` = 0.01%).
        rate: f64,
        /// Funding interval, hours.
        interval_hours: u32,
    },
    /// Perpetual open interest.
    OpenInterest {
        /// Trading pair.
        pair: String,
        /// Open interest, in the underlying asset's units.
        open_interest: f64,
        /// Open interest, USD notional.
        #[serde(default)]
        open_interest_usd: Option<f64>,
    },
    /// Aggregated social sentiment score.
    SocialSentiment {
        /// Subject symbol.
        symbol: String,
        /// Sentiment score, -1.0 (very negative) to 1.0 (very positive).
        score: f64,
        /// Number of mentions the score was computed from.
        #[serde(default)]
        mention_count: Option<u64>,
    },
    /// Developer activity summary for a project's primary repository.
    DevActivity {
        /// Commit count in the trailing 30 days.
        commits_30d: u64,
        /// Commit count in the trailing 90 days.
        commits_90d: u64,
        /// Contributors with activity in the trailing 30 days.
        active_contributors_30d: u64,
        /// `"increasing" | "stable" | "decreasing"`, relative to the
        /// 90-day baseline.
        trend: String,
    },
    /// Large on-chain transfer activity ("whale" monitoring).
    WhaleActivity {
        /// Asset symbol the transfers were filtered to.
        symbol: String,
        /// Number of qualifying transfers in the trailing 24 hours.
        transfer_count_24h: u64,
        /// Total USD notional of qualifying transfers in the trailing 24
        /// hours.
        total_value_usd_24h: f64,
    },
}
