//! Etherscan-family adapter (Etherscan, BscScan, Polygonscan, …): holder
//! distribution and token supply.
//!
//! Grounded on `data_sources/etherscan/client.py`'s `_transform_holders`
//! (top-N percent from the `tokenholderlist` result) and `_transform_supply`
//! (divisor-adjusted `totalSupply`).

use async_trait::async_trait;
use serde_json::Value;

use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const CHAIN_URLS: &[(&str, &str)] = &[
    ("ethereum", "https://api.etherscan.io/api"),
    ("bsc", "https://api.bscscan.com/api"),
    ("polygon", "https://api.polygonscan.com/api"),
    ("arbitrum", "https://api.arbiscan.io/api"),
];

/// Block-explorer adapter for one EVM-compatible chain. All Etherscan-clone
/// APIs take every parameter as a query string against an empty path, so
/// `endpoint` is always ignored in favor of `params["module"]`/`["action"]`.
pub struct EtherscanAdapter {
    chain: String,
    http: HttpHelper,
    api_key: Option<String>,
}

impl EtherscanAdapter {
    /// Build an adapter for `chain` (e.g. `"ethereum"`, `"bsc"`).
    #[must_use]
    pub fn new(chain: &str, base_url: Option<String>, api_key: Option<String>, timeout: std::time::Duration) -> Self {
        let default_base = CHAIN_URLS
            .iter()
            .find(|(name, _)| *name == chain)
            .map_or(CHAIN_URLS[0].1, |(_, url)| url);
        Self {
            chain: chain.to_string(),
            http: HttpHelper::new(
                base_url.unwrap_or_else(|| default_base.to_string()),
                timeout,
                vec![("User-Agent".to_string(), "fabric-gateway".to_string())],
            ),
            api_key,
        }
    }

    fn transform_holders(raw: &Value) -> AdapterResult<Value> {
        if raw.get("status").and_then(Value::as_str) != Some("1") {
            return Err(AdapterError::NotFound("etherscan: no holder data for this contract".to_string()));
        }
        let holders = raw.get("result").and_then(Value::as_array).cloned().unwrap_or_default();
        if holders.is_empty() {
            return Ok(serde_json::to_value(DataType::Holders {
                holder_count: 0,
                top10_percent: None,
            })
            .unwrap_or(Value::Null));
        }

        let balance = |h: &Value| -> f64 {
            h.get("TokenHolderQuantity").and_then(Value::as_str).and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0)
        };
        let total: f64 = holders.iter().map(balance).sum();
        let top10_percent = (total > 0.0 && holders.len() >= 10).then(|| holders.iter().take(10).map(balance).sum::<f64>() / total * 100.0);

        Ok(serde_json::to_value(DataType::Holders {
            holder_count: holders.len() as u64,
            top10_percent,
        })
        .unwrap_or(Value::Null))
    }

    fn transform_supply(raw: &Value) -> AdapterResult<Value> {
        if raw.get("status").and_then(Value::as_str) != Some("1") {
            return Err(AdapterError::NotFound("etherscan: no supply data for this contract".to_string()));
        }
        let result = raw.get("result").and_then(Value::as_array).and_then(|a| a.first());
        let Some(info) = result else {
            return Err(AdapterError::Decode("etherscan: empty tokeninfo result".to_string()));
        };
        let divisor: i32 = info.get("divisor").and_then(Value::as_str).and_then(|s| s.parse().ok()).unwrap_or(0);
        let raw_supply: f64 = info.get("totalSupply").and_then(Value::as_str).and_then(|s| s.parse().ok()).unwrap_or(0.0);
        let total = if divisor > 0 { raw_supply / 10f64.powi(divisor) } else { raw_supply };

        Ok(serde_json::to_value(DataType::Supply {
            circulating: total,
            total: Some(total),
            max: None,
        })
        .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Adapter for EtherscanAdapter {
    fn name(&self) -> &str {
        &self.chain
    }

    async fn fetch_raw(&self, _endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let mut query = super::coingecko::json_object_to_query_pairs(params);
        if let Some(key) = &self.api_key {
            query.push(("apikey".to_string(), key.clone()));
        }
        self.http.get_json("", &query, None).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        match data_type {
            "holders" => Self::transform_holders(&raw),
            "supply" => Self::transform_supply(&raw),
            other => Err(AdapterError::Decode(format!("etherscan adapter does not support data_type '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transform_holders_computes_top10_percent() {
        let holders: Vec<Value> = (0..12).map(|i| json!({"TokenHolderQuantity": (100 - i).to_string()})).collect();
        let raw = json!({"status": "1", "result": holders});
        let out = EtherscanAdapter::transform_holders(&raw).unwrap();
        assert_eq!(out["holder_count"], 12);
        assert!(out["top10_percent"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn transform_holders_rejects_failed_status() {
        let raw = json!({"status": "0", "message": "NOTOK"});
        let err = EtherscanAdapter::transform_holders(&raw).unwrap_err();
        assert_eq!(err.kind(), crate::error::DataSourceErrorKind::NotFound);
    }

    #[test]
    fn transform_supply_applies_divisor() {
        let raw = json!({"status": "1", "result": [{"totalSupply": "21000000000000", "divisor": "6"}]});
        let out = EtherscanAdapter::transform_supply(&raw).unwrap();
        assert_eq!(out["circulating"], 21_000_000.0);
    }
}
