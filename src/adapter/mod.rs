//! Source adapters: the uniform contract an upstream provider satisfies.
//!
//! Mirrors the teacher's backend abstraction but swaps "talk to another MCP
//! server" for "talk to one upstream HTTP API and normalize its response".
//! Per the REDESIGN FLAG ("async adapter inheritance → composition +
//! interface"), adapters hold a [`HttpHelper`] by value rather than
//! inheriting from a base client class.

mod binance;
mod coinglass;
mod coingecko;
mod cryptopanic;
mod defillama;
mod etherscan;
mod github;
mod lunarcrush;
mod thegraph;
mod whale_alert;

pub use binance::BinanceAdapter;
pub use coinglass::CoinglassAdapter;
pub use coingecko::CoinGeckoAdapter;
pub use cryptopanic::CryptoPanicAdapter;
pub use defillama::DefiLlamaAdapter;
pub use etherscan::EtherscanAdapter;
pub use github::GithubAdapter;
pub use lunarcrush::LunarCrushAdapter;
pub use thegraph::TheGraphAdapter;
pub use whale_alert::WhaleAlertAdapter;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DataSourceErrorKind;
use crate::model::SourceMeta;

/// One upstream adapter's failure, distinguished the way spec §4.1
/// requires. A dedicated sum type rather than the crate-wide `Error` so the
/// fallback engine's loop is a clean fold with no downcasting.
#[derive(Debug, Clone)]
pub enum AdapterError {
    /// The call exceeded its configured timeout.
    Timeout(String),
    /// HTTP 429 or equivalent.
    RateLimit(String),
    /// HTTP 401/403 or equivalent.
    Auth(String),
    /// HTTP 404 or equivalent.
    NotFound(String),
    /// Connection refused, DNS failure, TLS failure, or similar.
    Transport(String),
    /// The response body did not match the expected shape.
    Decode(String),
}

impl AdapterError {
    /// Classify this failure for the core's error taxonomy.
    #[must_use]
    pub fn kind(&self) -> DataSourceErrorKind {
        match self {
            Self::Timeout(_) => DataSourceErrorKind::Timeout,
            Self::RateLimit(_) => DataSourceErrorKind::RateLimit,
            Self::Auth(_) => DataSourceErrorKind::Auth,
            Self::NotFound(_) => DataSourceErrorKind::NotFound,
            Self::Transport(_) => DataSourceErrorKind::Transport,
            Self::Decode(_) => DataSourceErrorKind::Decode,
        }
    }

    /// Human-readable detail, independent of `kind`.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Timeout(r) | Self::RateLimit(r) | Self::Auth(r) | Self::NotFound(r) | Self::Transport(r) | Self::Decode(r) => r,
        }
    }
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.reason())
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Shared HTTP plumbing built once per adapter: base URL, default headers,
/// timeout, and the underlying `reqwest::Client`. Composition over
/// inheritance — concrete adapters hold one of these rather than
/// subclassing a base type.
#[derive(Clone)]
pub struct HttpHelper {
    client: reqwest::Client,
    base_url: String,
    default_headers: Vec<(String, String)>,
}

impl HttpHelper {
    /// Build a helper for one adapter instance.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration, default_headers: Vec<(String, String)>) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            default_headers,
        }
    }

    /// Perform a `GET` request against `endpoint` (joined to the helper's
    /// base URL, or `base_url_override` when given) with query `params`,
    /// and parse the response body as JSON.
    pub async fn get_json(&self, endpoint: &str, params: &[(String, String)], base_url_override: Option<&str>) -> AdapterResult<Value> {
        let base = base_url_override.unwrap_or(&self.base_url);
        let url = format!("{}{}", base.trim_end_matches('/'), endpoint);

        let mut request = self.client.get(&url).query(params);
        for (key, value) in &self.default_headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(Self::classify_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AdapterError::RateLimit(format!("HTTP 429 from {url}")));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AdapterError::Auth(format!("HTTP {status} from {url}")));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AdapterError::NotFound(format!("HTTP 404 from {url}")));
        }
        if !status.is_success() {
            return Err(AdapterError::Transport(format!("HTTP {status} from {url}")));
        }

        response.json::<Value>().await.map_err(|e| AdapterError::Decode(e.to_string()))
    }

    /// Perform a `POST` request against `endpoint` with a JSON `body`, for
    /// the adapters (GraphQL subgraphs) that don't speak plain query-string
    /// `GET`.
    pub async fn post_json(&self, endpoint: &str, body: &Value) -> AdapterResult<Value> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), endpoint);

        let mut request = self.client.post(&url).json(body);
        for (key, value) in &self.default_headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(Self::classify_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AdapterError::RateLimit(format!("HTTP 429 from {url}")));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AdapterError::Auth(format!("HTTP {status} from {url}")));
        }
        if !status.is_success() {
            return Err(AdapterError::Transport(format!("HTTP {status} from {url}")));
        }

        response.json::<Value>().await.map_err(|e| AdapterError::Decode(e.to_string()))
    }

    fn classify_transport_error(err: reqwest::Error) -> AdapterError {
        if err.is_timeout() {
            AdapterError::Timeout(err.to_string())
        } else if err.is_decode() {
            AdapterError::Decode(err.to_string())
        } else {
            AdapterError::Transport(err.to_string())
        }
    }
}

/// The uniform contract every upstream provider satisfies.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable adapter name, used as the `SourceMeta::provider` and as the
    /// registry lookup key.
    fn name(&self) -> &str;

    /// One upstream HTTP call. Respects the adapter's own timeout via its
    /// `HttpHelper`; rate limiting and circuit breaking are applied by the
    /// caller (the fallback engine), not here.
    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value>;

    /// Pure transform from a raw upstream payload into the normalized
    /// shape for `data_type` (one of the [`crate::model::DataType`] tag
    /// names this adapter supports).
    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value>;

    /// The composed operation: `fetch_raw` ⨟ `transform` ⨟ stamp. Measures
    /// response time and builds the resulting [`SourceMeta`].
    async fn fetch(&self, endpoint: &str, params: &Value, data_type: &str, ttl_seconds: u64) -> AdapterResult<(Value, SourceMeta)> {
        let start = Instant::now();
        let raw = self.fetch_raw(endpoint, params).await?;
        let normalized = self.transform(raw, data_type)?;
        let response_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let meta = SourceMeta::new(self.name(), endpoint, ttl_seconds, response_time_ms);
        Ok((normalized, meta))
    }

    /// Release any held resources. Most adapters hold only a pooled HTTP
    /// client and have nothing to do.
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_error_kind_matches_variant() {
        assert_eq!(AdapterError::Timeout("x".into()).kind(), DataSourceErrorKind::Timeout);
        assert_eq!(AdapterError::RateLimit("x".into()).kind(), DataSourceErrorKind::RateLimit);
        assert_eq!(AdapterError::NotFound("x".into()).kind(), DataSourceErrorKind::NotFound);
    }

    #[test]
    fn adapter_error_display_includes_reason() {
        let err = AdapterError::Decode("malformed body".into());
        assert!(err.to_string().contains("malformed body"));
    }
}
