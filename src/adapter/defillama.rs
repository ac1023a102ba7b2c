//! DefiLlama adapter: protocol total-value-locked and fee/revenue figures.
//!
//! Grounded on `data_sources/defillama/client.py`, which spreads its API
//! across several base URLs (`api.llama.fi` for protocol TVL and fees,
//! `coins.llama.fi` for spot prices). This adapter only needs the former.

use async_trait::async_trait;
use serde_json::Value;

use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const DEFAULT_BASE_URL: &str = "https://api.llama.fi";

/// DefiLlama REST adapter. The API is fully public; no key is ever sent.
pub struct DefiLlamaAdapter {
    http: HttpHelper,
}

impl DefiLlamaAdapter {
    /// Build an adapter.
    #[must_use]
    pub fn new(base_url: Option<String>, timeout: std::time::Duration) -> Self {
        Self {
            http: HttpHelper::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()), timeout, Vec::new()),
        }
    }

    fn transform_tvl(raw: &Value, protocol: &str) -> AdapterResult<Value> {
        let tvl_usd = raw
            .get("tvl")
            .and_then(Value::as_array)
            .and_then(|points| points.last())
            .and_then(|point| point.get("totalLiquidityUSD"))
            .and_then(Value::as_f64)
            .or_else(|| raw.get("currentChainTvls").and_then(|v| v.as_object()).and_then(|m| m.values().find_map(Value::as_f64)))
            .ok_or_else(|| AdapterError::Decode("defillama: no tvl figure in response".to_string()))?;

        Ok(serde_json::to_value(DataType::Tvl {
            protocol: protocol.to_string(),
            tvl_usd,
        })
        .unwrap_or(Value::Null))
    }

    fn transform_fees(raw: &Value, protocol: &str) -> AdapterResult<Value> {
        let total_data_chart = raw.get("totalDataChart").and_then(Value::as_array);
        let fees_24h_usd = total_data_chart
            .and_then(|points| points.last())
            .and_then(|point| point.as_array())
            .and_then(|pair| pair.get(1))
            .and_then(Value::as_f64)
            .or_else(|| raw.get("total24h").and_then(Value::as_f64))
            .ok_or_else(|| AdapterError::Decode("defillama: no fees figure in response".to_string()))?;
        let revenue_24h_usd = raw.get("totalRevenue24h").and_then(Value::as_f64);

        Ok(serde_json::to_value(DataType::Fees {
            protocol: protocol.to_string(),
            fees_24h_usd,
            revenue_24h_usd,
        })
        .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Adapter for DefiLlamaAdapter {
    fn name(&self) -> &str {
        "defillama"
    }

    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let query = super::coingecko::json_object_to_query_pairs(params);
        self.http.get_json(endpoint, &query, None).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        let protocol = raw.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        match data_type {
            "tvl" => Self::transform_tvl(&raw, &protocol),
            "fees" => Self::transform_fees(&raw, &protocol),
            other => Err(AdapterError::Decode(format!("defillama adapter does not support data_type '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transform_tvl_reads_latest_data_point() {
        let raw = json!({"tvl": [{"totalLiquidityUSD": 900.0}, {"totalLiquidityUSD": 1000.0}]});
        let out = DefiLlamaAdapter::transform_tvl(&raw, "uniswap").unwrap();
        assert_eq!(out["tvl_usd"], 1000.0);
        assert_eq!(out["protocol"], "uniswap");
    }

    #[test]
    fn transform_fees_reads_total24h_fallback() {
        let raw = json!({"total24h": 54321.0});
        let out = DefiLlamaAdapter::transform_fees(&raw, "uniswap").unwrap();
        assert_eq!(out["fees_24h_usd"], 54321.0);
    }

    #[test]
    fn transform_tvl_missing_figure_is_decode_error() {
        let raw = json!({});
        let err = DefiLlamaAdapter::transform_tvl(&raw, "uniswap").unwrap_err();
        assert_eq!(err.kind(), crate::error::DataSourceErrorKind::Decode);
    }
}
