//! CoinGecko adapter: basic token metadata, market quotes, supply figures.
//!
//! Grounded on `data_sources/coingecko/client.py`'s `_transform_basic` /
//! `_transform_market` / `_transform_supply` field mappings.

use async_trait::async_trait;
use serde_json::Value;

use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko REST adapter. Works without a key on the demo tier; the pro
/// tier is selected by supplying an `api_key`, sent as the
/// `x-cg-pro-api-key` header.
pub struct CoinGeckoAdapter {
    http: HttpHelper,
}

impl CoinGeckoAdapter {
    /// Build an adapter. `base_url` overrides the default when the source
    /// is configured against the pro tier.
    #[must_use]
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: std::time::Duration) -> Self {
        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        if let Some(key) = api_key {
            headers.push(("x-cg-demo-api-key".to_string(), key));
        }
        Self {
            http: HttpHelper::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()), timeout, headers),
        }
    }

    fn transform_basic(raw: &Value) -> Value {
        let symbol = raw.get("symbol").and_then(Value::as_str).unwrap_or_default().to_uppercase();
        let name = raw.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let chain = raw.get("asset_platform_id").and_then(Value::as_str).map(str::to_string);
        serde_json::to_value(DataType::Basic { symbol, name, chain }).unwrap_or(Value::Null)
    }

    fn transform_market(raw: &Value) -> Value {
        let market_data = raw.get("market_data").cloned().unwrap_or(Value::Null);
        let price = market_data
            .get("current_price")
            .and_then(|p| p.get("usd"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let change_24h_percent = market_data.get("price_change_percentage_24h").and_then(Value::as_f64);
        let volume_24h = market_data.get("total_volume").and_then(|v| v.get("usd")).and_then(Value::as_f64);
        serde_json::to_value(DataType::Market {
            price,
            change_24h_percent,
            volume_24h,
        })
        .unwrap_or(Value::Null)
    }

    fn transform_supply(raw: &Value) -> Value {
        let market_data = raw.get("market_data").cloned().unwrap_or(Value::Null);
        let circulating = market_data.get("circulating_supply").and_then(Value::as_f64).unwrap_or(0.0);
        let total = market_data.get("total_supply").and_then(Value::as_f64);
        let max = market_data.get("max_supply").and_then(Value::as_f64);
        serde_json::to_value(DataType::Supply { circulating, total, max }).unwrap_or(Value::Null)
    }

    /// Same `/coins/{id}` payload used as a secondary quote for
    /// `market_microstructure`'s ticker cross-check: no live order book, so
    /// `bid`/`ask` stay unset and only `last_price` is comparable against
    /// an exchange's ticker.
    fn transform_ticker(raw: &Value, pair: &str) -> Value {
        let last_price = raw
            .get("market_data")
            .and_then(|m| m.get("current_price"))
            .and_then(|p| p.get("usd"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        serde_json::to_value(DataType::Ticker {
            pair: pair.to_string(),
            last_price,
            bid: None,
            ask: None,
        })
        .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl Adapter for CoinGeckoAdapter {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let query = json_object_to_query_pairs(params);
        self.http.get_json(endpoint, &query, None).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        match data_type {
            "basic" => Ok(Self::transform_basic(&raw)),
            "market" => Ok(Self::transform_market(&raw)),
            "supply" => Ok(Self::transform_supply(&raw)),
            "ticker" => {
                let pair = raw.get("symbol").and_then(Value::as_str).unwrap_or_default().to_uppercase();
                Ok(Self::transform_ticker(&raw, &pair))
            }
            other => Err(AdapterError::Decode(format!("coingecko adapter does not support data_type '{other}'"))),
        }
    }
}

/// Flatten a `serde_json::Value` object of string-ish params into
/// `reqwest`-style query pairs. Shared by several adapters that take
/// simple flat query params.
pub(super) fn json_object_to_query_pairs(params: &Value) -> Vec<(String, String)> {
    params
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| value_to_query_string(v).map(|s| (k.clone(), s)))
                .collect()
        })
        .unwrap_or_default()
}

fn value_to_query_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
