//! The Graph adapter: protocol TVL via subgraph GraphQL query, used as a
//! secondary source behind DefiLlama.
//!
//! Grounded on `data_sources/thegraph/__init__.py`'s `SUBGRAPH_ENDPOINTS`
//! table and its `get_uniswap_v3_pool` query shape (`totalValueLockedUSD`).

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Adapter, AdapterError, AdapterResult, HttpHelper};
use crate::model::DataType;

const DEFAULT_BASE_URL: &str = "https://api.thegraph.com";

const SUBGRAPH_ENDPOINTS: &[(&str, &str)] = &[
    ("uniswap_v3_ethereum", "/subgraphs/name/uniswap/uniswap-v3"),
    ("uniswap_v3_arbitrum", "/subgraphs/name/ianlapham/uniswap-arbitrum-one"),
    ("uniswap_v3_polygon", "/subgraphs/name/ianlapham/uniswap-v3-polygon"),
    ("uniswap_v2", "/subgraphs/name/uniswap/uniswap-v2"),
    ("aave_v3", "/subgraphs/name/aave/protocol-v3"),
    ("curve", "/subgraphs/name/messari/curve-finance-ethereum"),
];

const POOL_QUERY: &str = "query GetPool($poolId: ID!) { pool(id: $poolId) { totalValueLockedUSD } }";

/// The Graph subgraph adapter. Queries are POSTed as GraphQL, not GET, so
/// `fetch_raw` ignores the helper's query-string path entirely.
pub struct TheGraphAdapter {
    http: HttpHelper,
}

impl TheGraphAdapter {
    /// Build an adapter. `api_key`, if set, is sent as a bearer token for
    /// gateway-hosted subgraphs; the free public endpoints ignore it.
    #[must_use]
    pub fn new(api_key: Option<String>, timeout: std::time::Duration) -> Self {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(key) = api_key {
            headers.push(("Authorization".to_string(), format!("Bearer {key}")));
        }
        Self {
            http: HttpHelper::new(DEFAULT_BASE_URL, timeout, headers),
        }
    }

    fn subgraph_path(subgraph: &str) -> &str {
        SUBGRAPH_ENDPOINTS.iter().find(|(name, _)| *name == subgraph).map_or(SUBGRAPH_ENDPOINTS[0].1, |(_, path)| path)
    }

    fn transform_tvl(raw: &Value, protocol: &str) -> AdapterResult<Value> {
        if let Some(errors) = raw.get("errors") {
            return Err(AdapterError::Decode(format!("thegraph: GraphQL error {errors}")));
        }
        let tvl_usd = raw
            .get("data")
            .and_then(|d| d.get("pool"))
            .and_then(|p| p.get("totalValueLockedUSD"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| AdapterError::Decode("thegraph: missing totalValueLockedUSD".to_string()))?;

        Ok(serde_json::to_value(DataType::Tvl {
            protocol: protocol.to_string(),
            tvl_usd,
        })
        .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Adapter for TheGraphAdapter {
    fn name(&self) -> &str {
        "thegraph"
    }

    async fn fetch_raw(&self, endpoint: &str, params: &Value) -> AdapterResult<Value> {
        let subgraph = params.get("subgraph").and_then(Value::as_str).unwrap_or("uniswap_v3_ethereum");
        let pool_id = params.get("pool_id").and_then(Value::as_str).unwrap_or_default();
        let path = Self::subgraph_path(subgraph);
        let body = json!({"query": POOL_QUERY, "variables": {"poolId": pool_id}});
        self.http.post_json(if endpoint.is_empty() { path } else { endpoint }, &body).await
    }

    fn transform(&self, raw: Value, data_type: &str) -> AdapterResult<Value> {
        match data_type {
            "tvl" => Self::transform_tvl(&raw, "unknown"),
            other => Err(AdapterError::Decode(format!("thegraph adapter does not support data_type '{other}'"))),
        }
    }
}
