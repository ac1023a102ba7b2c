//! GitHub adapter: developer activity for a project's primary repository.
//!
//! Grounded on `data_sources/github/client.py`'s `_transform_dev_activity`:
//! active-contributor count from `recent_activity` flags, and the
//! increasing/stable/decreasing trend from the 30d-vs-90d commit ratio.

use async_trait::async_trait;
use serde_json::Value;

use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// GitHub REST adapter. Works unauthenticated at a much stricter rate
/// limit; a token raises the ceiling and is sent as a bearer credential.
pub struct GithubAdapter {
    http: HttpHelper,
}

impl GithubAdapter {
    /// Build an adapter.
    #[must_use]
    pub fn new(base_url: Option<String>, token: Option<String>, timeout: std::time::Duration) -> Self {
        let mut headers = vec![
            ("Accept".to_string(), "application/vnd.github.v3+json".to_string()),
            ("User-Agent".to_string(), "fabric-gateway".to_string()),
        ];
        if let Some(token) = token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        Self {
            http: HttpHelper::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()), timeout, headers),
        }
    }

    fn transform_dev_activity(raw: &Value) -> Value {
        let commits_30d = raw.get("commits_30d").and_then(Value::as_u64).unwrap_or(0);
        let commits_90d = raw.get("commits_90d").and_then(Value::as_u64).unwrap_or(0);
        let contributors = raw.get("contributors").and_then(Value::as_array).cloned().unwrap_or_default();
        let active_contributors_30d = contributors.iter().filter(|c| c.get("recent_activity").and_then(Value::as_bool).unwrap_or(false)).count() as u64;

        let trend = if commits_90d > 0 {
            let ratio_30_to_90 = commits_30d as f64 / (commits_90d as f64 / 3.0);
            if ratio_30_to_90 > 1.2 {
                "increasing"
            } else if ratio_30_to_90 < 0.8 {
                "decreasing"
            } else {
                "stable"
            }
        } else {
            "stable"
        };

        serde_json::to_value(DataType::DevActivity {
            commits_30d,
            commits_90d,
            active_contributors_30d,
            trend: trend.to_string(),
        })
        .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl Adapter for GithubAdapter {
    fn name(&self) -> &str {
        "github"
    }

    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let query = super::coingecko::json_object_to_query_pairs(params);
        self.http.get_json(endpoint, &query, None).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        match data_type {
            "dev_activity" => Ok(Self::transform_dev_activity(&raw)),
            other => Err(AdapterError::Decode(format!("github adapter does not support data_type '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn transform_dev_activity_counts_active_contributors() {
        let raw = json!({
            "commits_30d": 50,
            "commits_90d": 90,
            "contributors": [
                {"recent_activity": true},
                {"recent_activity": false},
                {"recent_activity": true}
            ]
        });
        let out = GithubAdapter::transform_dev_activity(&raw);
        assert_eq!(out["active_contributors_30d"], 2);
    }

    #[test]
    fn transform_dev_activity_flags_increasing_trend() {
        let raw = json!({"commits_30d": 120, "commits_90d": 90, "contributors": []});
        let out = GithubAdapter::transform_dev_activity(&raw);
        assert_eq!(out["trend"], "increasing");
    }

    #[test]
    fn transform_dev_activity_flags_decreasing_trend() {
        let raw = json!({"commits_30d": 10, "commits_90d": 90, "contributors": []});
        let out = GithubAdapter::transform_dev_activity(&raw);
        assert_eq!(out["trend"], "decreasing");
    }

    #[test]
    fn transform_dev_activity_defaults_to_stable_with_no_history() {
        let raw = json!({"contributors": []});
        let out = GithubAdapter::transform_dev_activity(&raw);
        assert_eq!(out["trend"], "stable");
    }
}
