//! LunarCrush adapter: social-volume-weighted sentiment, used as the
//! fallback source behind [`super::CryptoPanicAdapter`] for the
//! `social_sentiment` capability.
//!
//! Grounded on `tools/sentiment/aggregator.py`'s Twitter/X channel
//! (`SOURCE_WEIGHTS[SentimentSource.TWITTER]`, the heaviest-weighted of the
//! four original channels), simplified to LunarCrush's single `galaxy_score`
//! metric rather than a raw post sample.

use async_trait::async_trait;
use serde_json::Value;

use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const DEFAULT_BASE_URL: &str = "https://lunarcrush.com/api4/public";

/// LunarCrush REST adapter.
pub struct LunarCrushAdapter {
    http: HttpHelper,
}

impl LunarCrushAdapter {
    /// Build an adapter. The API key rides in an `Authorization: Bearer`
    /// header.
    #[must_use]
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: std::time::Duration) -> Self {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(key) = api_key {
            headers.push(("Authorization".to_string(), format!("Bearer {key}")));
        }
        Self {
            http: HttpHelper::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()), timeout, headers),
        }
    }

    /// `galaxy_score` is `0..=100`; rescale to the crate-wide `-1.0..=1.0`
    /// convention around a neutral midpoint of 50.
    fn transform_social_sentiment(raw: &Value, symbol: &str) -> AdapterResult<Value> {
        let data = raw.get("data").cloned().unwrap_or(Value::Null);
        let Some(galaxy_score) = data.get("galaxy_score").and_then(Value::as_f64) else {
            return Err(AdapterError::Decode("lunarcrush: missing galaxy_score".to_string()));
        };
        let score = (galaxy_score - 50.0) / 50.0;
        let mention_count = data.get("social_volume_24h").and_then(Value::as_u64);

        Ok(serde_json::to_value(DataType::SocialSentiment {
            symbol: symbol.to_string(),
            score,
            mention_count,
        })
        .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Adapter for LunarCrushAdapter {
    fn name(&self) -> &str {
        "lunarcrush"
    }

    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let query = super::coingecko::json_object_to_query_pairs(params);
        self.http.get_json(endpoint, &query, None).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        match data_type {
            "social_sentiment" => {
                let symbol = raw.get("data").and_then(|d| d.get("symbol")).and_then(Value::as_str).unwrap_or("UNKNOWN").to_uppercase();
                Self::transform_social_sentiment(&raw, &symbol)
            }
            other => Err(AdapterError::Decode(format!("lunarcrush adapter does not support data_type '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transform_social_sentiment_rescales_galaxy_score_around_neutral() {
        let raw = json!({"data": {"galaxy_score": 75.0, "social_volume_24h": 12_000}});
        let out = LunarCrushAdapter::transform_social_sentiment(&raw, "BTC").unwrap();
        assert_eq!(out["score"], 0.5);
        assert_eq!(out["mention_count"], 12_000);
    }

    #[test]
    fn below_neutral_galaxy_score_is_negative() {
        let raw = json!({"data": {"galaxy_score": 20.0}});
        let out = LunarCrushAdapter::transform_social_sentiment(&raw, "ETH").unwrap();
        assert_eq!(out["score"], -0.6);
    }

    #[test]
    fn missing_galaxy_score_is_a_decode_error() {
        let raw = json!({"data": {}});
        let err = LunarCrushAdapter::transform_social_sentiment(&raw, "BTC").unwrap_err();
        assert_eq!(err.kind(), crate::error::DataSourceErrorKind::Decode);
    }
}
