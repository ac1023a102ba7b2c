//! Whale Alert adapter: large on-chain transfer activity.
//!
//! Grounded on `data_sources/whale_alert/client.py`'s `get_transactions`
//! (api_key sent as a query param, not a header) and `_transform_transactions`
//! (`{"result": "success", "transactions": [...]}` envelope).

use async_trait::async_trait;
use serde_json::Value;

use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const DEFAULT_BASE_URL: &str = "https://api.whale-alert.io/v1";

/// Whale Alert REST adapter.
pub struct WhaleAlertAdapter {
    http: HttpHelper,
    api_key: Option<String>,
}

impl WhaleAlertAdapter {
    /// Build an adapter. The API rejects unauthenticated calls, but the key
    /// rides in the query string rather than a header, so it's not part of
    /// `HttpHelper`'s default headers.
    #[must_use]
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: std::time::Duration) -> Self {
        Self {
            http: HttpHelper::new(
                base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout,
                vec![("Accept".to_string(), "application/json".to_string())],
            ),
            api_key,
        }
    }

    fn transform_whale_activity(raw: &Value, symbol: &str) -> AdapterResult<Value> {
        if raw.get("result").and_then(Value::as_str) != Some("success") {
            return Err(AdapterError::NotFound("whale_alert: no transfer data for this window".to_string()));
        }
        let transactions = raw.get("transactions").and_then(Value::as_array).cloned().unwrap_or_default();
        let total_value_usd_24h: f64 = transactions.iter().filter_map(|t| t.get("amount_usd").and_then(Value::as_f64)).sum();

        Ok(serde_json::to_value(DataType::WhaleActivity {
            symbol: symbol.to_string(),
            transfer_count_24h: transactions.len() as u64,
            total_value_usd_24h,
        })
        .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Adapter for WhaleAlertAdapter {
    fn name(&self) -> &str {
        "whale_alert"
    }

    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let mut query = super::coingecko::json_object_to_query_pairs(params);
        if let Some(key) = &self.api_key {
            query.push(("api_key".to_string(), key.clone()));
        }
        self.http.get_json(endpoint, &query, None).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        match data_type {
            "whale_activity" => {
                let symbol = raw
                    .get("transactions")
                    .and_then(Value::as_array)
                    .and_then(|a| a.first())
                    .and_then(|t| t.get("symbol"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_uppercase();
                Self::transform_whale_activity(&raw, &symbol)
            }
            other => Err(AdapterError::Decode(format!("whale_alert adapter does not support data_type '{other}'"))),
        }
    }
}
