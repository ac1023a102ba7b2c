//! Binance adapter: spot ticker and order-book depth.
//!
//! The original source drives Binance over its WebSocket streams
//! (`data_sources/binance/websocket.py`); this adapter talks to the
//! equivalent REST endpoints (`/ticker/24hr`, `/depth`) since the core is
//! request-scoped, not subscription-based, and normalizes the same
//! `lastPrice`/`bidPrice`/`askPrice` and `bids`/`asks` fields that stream
//! carries.

use async_trait::async_trait;
use serde_json::Value;

use super::coingecko::json_object_to_query_pairs;
use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const DEFAULT_BASE_URL: &str = "https://api.binance.com/api/v3";

/// Binance spot REST adapter.
pub struct BinanceAdapter {
    http: HttpHelper,
}

impl BinanceAdapter {
    /// Build an adapter. Binance's public market-data endpoints need no
    /// key.
    #[must_use]
    pub fn new(base_url: Option<String>, timeout: std::time::Duration) -> Self {
        Self {
            http: HttpHelper::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()), timeout, Vec::new()),
        }
    }

    fn parse_f64(raw: &Value, field: &str) -> Option<f64> {
        raw.get(field).and_then(Value::as_str).and_then(|s| s.parse::<f64>().ok())
    }

    fn transform_ticker(raw: &Value) -> AdapterResult<Value> {
        let pair = raw.get("symbol").and_then(Value::as_str).unwrap_or_default().to_string();
        let last_price = Self::parse_f64(raw, "lastPrice").ok_or_else(|| AdapterError::Decode("missing lastPrice".to_string()))?;
        let bid = Self::parse_f64(raw, "bidPrice");
        let ask = Self::parse_f64(raw, "askPrice");
        Ok(serde_json::to_value(DataType::Ticker { pair, last_price, bid, ask }).unwrap_or(Value::Null))
    }

    /// Same `/ticker/24hr` payload read as a spot quote, for
    /// `crypto_overview`'s market cross-check against CoinGecko.
    fn transform_market(raw: &Value) -> AdapterResult<Value> {
        let price = Self::parse_f64(raw, "lastPrice").ok_or_else(|| AdapterError::Decode("missing lastPrice".to_string()))?;
        let change_24h_percent = Self::parse_f64(raw, "priceChangePercent");
        let volume_24h = Self::parse_f64(raw, "volume");
        Ok(serde_json::to_value(DataType::Market {
            price,
            change_24h_percent,
            volume_24h,
        })
        .unwrap_or(Value::Null))
    }

    fn transform_order_book(raw: &Value, pair: &str) -> AdapterResult<Value> {
        let bids = Self::parse_levels(raw.get("bids"))?;
        let asks = Self::parse_levels(raw.get("asks"))?;
        Ok(serde_json::to_value(DataType::OrderBook {
            pair: pair.to_string(),
            bids,
            asks,
        })
        .unwrap_or(Value::Null))
    }

    fn parse_levels(levels: Option<&Value>) -> AdapterResult<Vec<(f64, f64)>> {
        let array = levels.and_then(Value::as_array).ok_or_else(|| AdapterError::Decode("missing order book levels".to_string()))?;
        array
            .iter()
            .map(|level| {
                let pair = level.as_array().ok_or_else(|| AdapterError::Decode("malformed order book level".to_string()))?;
                let price = pair
                    .first()
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| AdapterError::Decode("malformed order book price".to_string()))?;
                let size = pair
                    .get(1)
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| AdapterError::Decode("malformed order book size".to_string()))?;
                Ok((price, size))
            })
            .collect()
    }
}

#[async_trait]
impl Adapter for BinanceAdapter {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let query = json_object_to_query_pairs(params);
        self.http.get_json(endpoint, &query, None).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        match data_type {
            "ticker" => Self::transform_ticker(&raw),
            "market" => Self::transform_market(&raw),
            "orderbook" => {
                let pair = raw.get("symbol").and_then(Value::as_str).unwrap_or_default().to_string();
                Self::transform_order_book(&raw, &pair)
            }
            other => Err(AdapterError::Decode(format!("binance adapter does not support data_type '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transform_ticker_reads_last_bid_ask() {
        let raw = json!({"symbol": "BTCUSDT", "lastPrice": "95000.10", "bidPrice": "94999.50", "askPrice": "95000.60"});
        let out = BinanceAdapter::transform_ticker(&raw).unwrap();
        assert_eq!(out["pair"], "BTCUSDT");
        assert!((out["last_price"].as_f64().unwrap() - 95_000.10).abs() < 1e-6);
        assert!((out["bid"].as_f64().unwrap() - 94_999.50).abs() < 1e-6);
    }

    #[test]
    fn transform_ticker_missing_price_is_a_decode_error() {
        let raw = json!({"symbol": "BTCUSDT"});
        let err = BinanceAdapter::transform_ticker(&raw).unwrap_err();
        assert_eq!(err.kind(), crate::error::DataSourceErrorKind::Decode);
    }

    #[test]
    fn transform_market_reads_last_price_as_spot_quote() {
        let raw = json!({"symbol": "BTCUSDT", "lastPrice": "95100.00", "priceChangePercent": "0.9", "volume": "12345.0"});
        let out = BinanceAdapter::transform_market(&raw).unwrap();
        assert_eq!(out["price"], 95_100.0);
        assert_eq!(out["change_24h_percent"], 0.9);
    }

    #[test]
    fn transform_order_book_parses_price_size_pairs() {
        let raw = json!({"bids": [["94999.5", "1.2"]], "asks": [["95000.6", "0.8"]]});
        let out = BinanceAdapter::transform_order_book(&raw, "BTCUSDT").unwrap();
        assert_eq!(out["bids"][0][0], 94_999.5);
        assert_eq!(out["asks"][0][1], 0.8);
    }
}
