//! CryptoPanic adapter: news-driven social sentiment.
//!
//! Grounded on `tools/sentiment/aggregator.py`'s news-channel contribution
//! to the weighted sentiment score (`SOURCE_WEIGHTS[SentimentSource.NEWS]`),
//! simplified to one HTTP adapter that scores a post's vote tally instead of
//! aggregating several collaborator tools.

use async_trait::async_trait;
use serde_json::Value;

use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const DEFAULT_BASE_URL: &str = "https://cryptopanic.com/api/v1";

/// CryptoPanic REST adapter. The `auth_token` query param is required by
/// the upstream API for any request.
pub struct CryptoPanicAdapter {
    http: HttpHelper,
    api_key: Option<String>,
}

impl CryptoPanicAdapter {
    /// Build an adapter.
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

    /// Score `-1.0..=1.0` from a post's `votes.positive` / `votes.negative`
    /// tally: `(pos - neg) / (pos + neg)`, zero when nobody voted.
    fn transform_social_sentiment(raw: &Value, symbol: &str) -> AdapterResult<Value> {
        let results = raw.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
        if results.is_empty() {
            return Err(AdapterError::NotFound("cryptopanic: no posts for this symbol".to_string()));
        }

        let mut positive = 0.0;
        let mut negative = 0.0;
        for post in &results {
            let votes = post.get("votes").cloned().unwrap_or(Value::Null);
            positive += votes.get("positive").and_then(Value::as_f64).unwrap_or(0.0);
            negative += votes.get("negative").and_then(Value::as_f64).unwrap_or(0.0);
        }

        let total = positive + negative;
        let score = if total == 0.0 { 0.0 } else { (positive - negative) / total };

        Ok(serde_json::to_value(DataType::SocialSentiment {
            symbol: symbol.to_string(),
            score,
            mention_count: Some(results.len() as u64),
        })
        .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Adapter for CryptoPanicAdapter {
    fn name(&self) -> &str {
        "cryptopanic"
    }

    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let mut query = super::coingecko::json_object_to_query_pairs(params);
        if let Some(key) = &self.api_key {
            query.push(("auth_token".to_string(), key.clone()));
        }
        self.http.get_json(endpoint, &query, None).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        match data_type {
            "social_sentiment" => {
                let symbol = raw
                    .get("results")
                    .and_then(Value::as_array)
                    .and_then(|a| a.first())
                    .and_then(|p| p.get("currencies"))
                    .and_then(Value::as_array)
                    .and_then(|c| c.first())
                    .and_then(|c| c.get("code"))
                    .and_then(Value::as_str)
                    .unwrap_or("UNKNOWN")
                    .to_uppercase();
                Self::transform_social_sentiment(&raw, &symbol)
            }
            other => Err(AdapterError::Decode(format!("cryptopanic adapter does not support data_type '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transform_social_sentiment_averages_positive_and_negative_votes() {
        let raw = json!({
            "results": [
                {"votes": {"positive": 10, "negative": 2}},
                {"votes": {"positive": 5, "negative": 3}},
            ]
        });
        let out = CryptoPanicAdapter::transform_social_sentiment(&raw, "BTC").unwrap();
        assert_eq!(out["mention_count"], 2);
        let score = out["score"].as_f64().unwrap();
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn no_votes_yields_neutral_score() {
        let raw = json!({"results": [{"votes": {"positive": 0, "negative": 0}}]});
        let out = CryptoPanicAdapter::transform_social_sentiment(&raw, "ETH").unwrap();
        assert_eq!(out["score"], 0.0);
    }

    #[test]
    fn empty_results_is_not_found() {
        let raw = json!({"results": []});
        let err = CryptoPanicAdapter::transform_social_sentiment(&raw, "BTC").unwrap_err();
        assert_eq!(err.kind(), crate::error::DataSourceErrorKind::NotFound);
    }
}
