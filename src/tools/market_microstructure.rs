//! `market_microstructure`: exchange-level ticker (cross-checked) and order
//! book depth for a trading pair.
//!
//! Grounded on `data_sources/binance/websocket.py`'s ticker/depth streams,
//! adapted to the crate's request-scoped REST adapters. The ticker
//! cross-check uses [`CrossCheckStrategy::LatestTimestamp`] rather than
//! averaging: a spot price and an exchange's last trade are not the same
//! measurement, so whichever side observed most recently is preferred
//! outright instead of blended.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::model::Envelope;
use crate::orchestrator::EnvelopeBuilder;
use crate::validation::{FieldKind, FieldSchema, ToolInputSchema};
use crate::{Error, Result};

use super::{CrossCheckStrategy, ToolContext, ToolFacade, requested_capabilities};

const DEFAULT_CAPABILITIES: &[&str] = &["ticker", "orderbook"];

const SCHEMA: ToolInputSchema = ToolInputSchema {
    fields: &[
        FieldSchema {
            name: "pair",
            kind: FieldKind::String,
            required: true,
            enum_values: None,
        },
        FieldSchema {
            name: "include_fields",
            kind: FieldKind::StringArray,
            required: false,
            enum_values: Some(&["ticker", "orderbook", "all"]),
        },
    ],
};

/// Exchange ticker and order-book tool.
pub struct MarketMicrostructureTool;

impl MarketMicrostructureTool {
    async fn fetch_ticker(ctx: &ToolContext, pair: &str, builder: &mut EnvelopeBuilder) {
        let symbol = pair.replace('/', "");
        let params = json!({"symbol": symbol, "id": pair.split('/').next().unwrap_or(pair).to_lowercase()});
        match ctx
            .fetch_cross_checked("market_microstructure", "ticker", "/ticker", &params, "ticker", "last_price", CrossCheckStrategy::LatestTimestamp)
            .await
        {
            Ok(outcome) => {
                builder.set_field("ticker", outcome.payload);
                for meta in outcome.source_meta {
                    builder.push_source_meta(meta);
                }
                if let Some(conflict) = outcome.conflict {
                    builder.push_conflict(conflict);
                }
                if let Some(warning) = outcome.warning {
                    builder.warn(warning);
                }
            }
            Err(err) => builder.warn(format!("ticker: {err}")),
        }
    }

    async fn fetch_orderbook(ctx: &ToolContext, pair: &str, builder: &mut EnvelopeBuilder) {
        let symbol = pair.replace('/', "");
        let params = json!({"symbol": symbol, "limit": 20});
        match ctx.fetch("market_microstructure", "orderbook", "/depth", &params, "orderbook", Some(pair)).await {
            Ok((payload, meta)) => {
                builder.set_field("orderbook", payload);
                builder.push_source_meta(meta);
            }
            Err(err) => builder.warn(format!("orderbook: {err}")),
        }
    }
}

#[async_trait]
impl ToolFacade for MarketMicrostructureTool {
    fn name(&self) -> &'static str {
        "market_microstructure"
    }

    fn description(&self) -> &'static str {
        "Exchange-level ticker (cross-checked across sources) and order book depth for a trading pair."
    }

    fn input_schema(&self) -> &'static ToolInputSchema {
        &SCHEMA
    }

    fn capabilities(&self) -> &'static [&'static str] {
        DEFAULT_CAPABILITIES
    }

    fn example_arguments(&self) -> Value {
        json!({"pair": "BTC/USDT", "include_fields": ["ticker", "orderbook"]})
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> Result<Envelope> {
        let pair = arguments.get("pair").and_then(Value::as_str).ok_or_else(|| Error::Validation("missing required field 'pair'".to_string()))?.to_uppercase();

        let capabilities = requested_capabilities(&arguments, DEFAULT_CAPABILITIES);
        let mut builder = EnvelopeBuilder::new();

        for capability in &capabilities {
            match *capability {
                "ticker" => Self::fetch_ticker(ctx, &pair, &mut builder).await,
                "orderbook" => Self::fetch_orderbook(ctx, &pair, &mut builder).await,
                other => builder.warn(format!("unknown capability '{other}'")),
            }
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_schema_requires_pair() {
        assert!(SCHEMA.validate(&json!({})).is_err());
        assert!(SCHEMA.validate(&json!({"pair": "BTC/USDT"})).is_ok());
    }
}
