//! `derivatives_overview`: perpetual funding rate and open interest for a
//! trading pair.
//!
//! Grounded on `data_sources/coinglass/client.py`'s `get_funding_rate` /
//! `get_open_interest_history`, the only source this crate has for either
//! figure — so there's no fallback chain depth beyond `coinglass` itself,
//! matching the original's single-provider design for derivatives data.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::model::Envelope;
use crate::orchestrator::EnvelopeBuilder;
use crate::validation::{FieldKind, FieldSchema, ToolInputSchema};
use crate::{Error, Result};

use super::{ToolContext, ToolFacade, requested_capabilities};

const DEFAULT_CAPABILITIES: &[&str] = &["funding_rate", "open_interest"];

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
            enum_values: Some(&["funding_rate", "open_interest", "all"]),
        },
    ],
};

/// Perpetual funding rate and open interest tool.
pub struct DerivativesOverviewTool;

impl DerivativesOverviewTool {
    async fn fetch_funding_rate(ctx: &ToolContext, pair: &str, builder: &mut EnvelopeBuilder) {
        let params = json!({"symbol": pair});
        match ctx.fetch("derivatives_overview", "funding_rate", "/api/futures/fundingRate/history", &params, "funding_rate", Some(pair)).await {
            Ok((payload, meta)) => {
                builder.set_field("funding_rate", payload);
                builder.push_source_meta(meta);
            }
            Err(err) => builder.warn(format!("funding_rate: {err}")),
        }
    }

    async fn fetch_open_interest(ctx: &ToolContext, pair: &str, builder: &mut EnvelopeBuilder) {
        let params = json!({"symbol": pair});
        match ctx
            .fetch("derivatives_overview", "open_interest", "/api/futures/openInterest/history", &params, "open_interest", Some(pair))
            .await
        {
            Ok((payload, meta)) => {
                builder.set_field("open_interest", payload);
                builder.push_source_meta(meta);
            }
            Err(err) => builder.warn(format!("open_interest: {err}")),
        }
    }
}

#[async_trait]
impl ToolFacade for DerivativesOverviewTool {
    fn name(&self) -> &'static str {
        "derivatives_overview"
    }

    fn description(&self) -> &'static str {
        "Perpetual futures funding rate and open interest for a trading pair."
    }

    fn input_schema(&self) -> &'static ToolInputSchema {
        &SCHEMA
    }

    fn capabilities(&self) -> &'static [&'static str] {
        DEFAULT_CAPABILITIES
    }

    fn example_arguments(&self) -> Value {
        json!({"pair": "BTC/USDT"})
    }

    fn limitations(&self) -> &'static [&'static str] {
        &["funding_rate and open_interest have a single configured source (coinglass); no fallback chain depth beyond it"]
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> Result<Envelope> {
        let pair = arguments.get("pair").and_then(Value::as_str).ok_or_else(|| Error::Validation("missing required field 'pair'".to_string()))?.to_uppercase();

        let capabilities = requested_capabilities(&arguments, DEFAULT_CAPABILITIES);
        let mut builder = EnvelopeBuilder::new();

        for capability in &capabilities {
            match *capability {
                "funding_rate" => Self::fetch_funding_rate(ctx, &pair, &mut builder).await,
                "open_interest" => Self::fetch_open_interest(ctx, &pair, &mut builder).await,
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
        assert!(SCHEMA.validate(&json!({"pair": "BTCUSDT"})).is_ok());
    }
}
