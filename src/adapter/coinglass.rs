//! Coinglass adapter: perpetual funding rate and open interest.
//!
//! Grounded on `data_sources/coinglass/client.py` — same `coinglassSecret`
//! header convention, and the same `{"code": "0", "data": [...]}` envelope
//! its `get_open_interest_history` unwraps.

use async_trait::async_trait;
use serde_json::Value;

use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const DEFAULT_BASE_URL: &str = "https://open-api-v4.coinglass.com";

/// Coinglass REST adapter.
pub struct CoinglassAdapter {
    http: HttpHelper,
}

impl CoinglassAdapter {
    /// Build an adapter. `api_key` is sent as the `coinglassSecret` header.
    #[must_use]
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: std::time::Duration) -> Self {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(key) = api_key {
            headers.push(("coinglassSecret".to_string(), key));
        }
        Self {
            http: HttpHelper::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()), timeout, headers),
        }
    }

    fn unwrap_data(raw: &Value) -> AdapterResult<Value> {
        if raw.get("code").and_then(Value::as_str) != Some("0") {
            let msg = raw.get("msg").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(AdapterError::Decode(format!("coinglass: {msg}")));
        }
        Ok(raw.get("data").cloned().unwrap_or(Value::Null))
    }

    fn transform_funding_rate(raw: &Value, pair: &str) -> AdapterResult<Value> {
        let data = Self::unwrap_data(raw)?;
        let entry = data.as_array().and_then(|a| a.first()).unwrap_or(&data);
        let rate = entry
            .get("fundingRate")
            .and_then(Value::as_f64)
            .ok_or_else(|| AdapterError::Decode("coinglass: missing fundingRate".to_string()))?;
        let interval_hours = entry.get("fundingIntervalHours").and_then(Value::as_u64).unwrap_or(8) as u32;

        Ok(serde_json::to_value(DataType::FundingRate {
            pair: pair.to_string(),
            rate,
            interval_hours,
        })
        .unwrap_or(Value::Null))
    }

    fn transform_open_interest(raw: &Value, pair: &str) -> AdapterResult<Value> {
        let data = Self::unwrap_data(raw)?;
        let latest = data
            .as_array()
            .and_then(|points| points.last())
            .ok_or_else(|| AdapterError::Decode("coinglass: empty open interest history".to_string()))?;

        let open_interest = latest
            .get("close")
            .or_else(|| latest.get("openInterest"))
            .and_then(Value::as_f64)
            .ok_or_else(|| AdapterError::Decode("coinglass: missing open interest value".to_string()))?;
        let open_interest_usd = latest.get("openInterestUsd").and_then(Value::as_f64);

        Ok(serde_json::to_value(DataType::OpenInterest {
            pair: pair.to_string(),
            open_interest,
            open_interest_usd,
        })
        .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Adapter for CoinglassAdapter {
    fn name(&self) -> &str {
        "coinglass"
    }

    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let query = super::coingecko::json_object_to_query_pairs(params);
        self.http.get_json(endpoint, &query, None).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        let pair = raw
            .get("symbol")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                Self::unwrap_data(&raw)
                    .ok()
                    .and_then(|d| d.as_array().and_then(|a| a.first()).and_then(|e| e.get("symbol")).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_default();
        match data_type {
            "funding_rate" => Self::transform_funding_rate(&raw, &pair),
            "open_interest" => Self::transform_open_interest(&raw, &pair),
            other => Err(AdapterError::Decode(format!("coinglass adapter does not support data_type '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transform_funding_rate_reads_rate_and_interval() {
        let raw = json!({"code": "0", "data": [{"fundingRate": 0.0001, "fundingIntervalHours": 8}]});
        let out = CoinglassAdapter::transform_funding_rate(&raw, "BTCUSDT").unwrap();
        assert_eq!(out["rate"], 0.0001);
        assert_eq!(out["interval_hours"], 8);
    }

    #[test]
    fn transform_open_interest_reads_latest_point() {
        let raw = json!({"code": "0", "data": [{"close": 100.0}, {"close": 150.0}]});
        let out = CoinglassAdapter::transform_open_interest(&raw, "BTCUSDT").unwrap();
        assert_eq!(out["open_interest"], 150.0);
    }

    #[test]
    fn non_zero_code_is_a_decode_error() {
        let raw = json!({"code": "1", "msg": "invalid symbol"});
        let err = CoinglassAdapter::unwrap_data(&raw).unwrap_err();
        assert_eq!(err.kind(), crate::error::DataSourceErrorKind::Decode);
    }
}
