//! `onchain_whale_activity`: large on-chain transfer monitoring.
//!
//! Grounded on `tools/onchain/whale_transfers.py`'s
//! `OnchainWhaleTransfersTool.execute`: a single Whale Alert call windowed
//! by `lookback_hours` and floored by `min_value_usd`, with no cross-source
//! comparison (the original has exactly one collaborator, `WhaleAlertClient`).

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::model::Envelope;
use crate::orchestrator::EnvelopeBuilder;
use crate::validation::{FieldKind, FieldSchema, ToolInputSchema};
use crate::{Error, Result};

use super::{ToolContext, ToolFacade, requested_capabilities};

const DEFAULT_CAPABILITIES: &[&str] = &["whale_activity"];
const DEFAULT_MIN_VALUE_USD: f64 = 500_000.0;
const DEFAULT_LOOKBACK_HOURS: u64 = 24;

const SCHEMA: ToolInputSchema = ToolInputSchema {
    fields: &[
        FieldSchema {
            name: "symbol",
            kind: FieldKind::String,
            required: true,
            enum_values: None,
        },
        FieldSchema {
            name: "include_fields",
            kind: FieldKind::StringArray,
            required: false,
            enum_values: Some(&["whale_activity", "all"]),
        },
    ],
};

/// Large on-chain transfer monitoring tool.
pub struct OnchainWhaleActivityTool;

impl OnchainWhaleActivityTool {
    async fn fetch_whale_activity(ctx: &ToolContext, symbol: &str, min_value_usd: f64, lookback_hours: u64, builder: &mut EnvelopeBuilder) {
        let params = json!({
            "currency": symbol.to_lowercase(),
            "min_value": min_value_usd,
            "lookback_hours": lookback_hours,
            "limit": 100,
        });
        match ctx
            .fetch("onchain_whale_activity", "whale_activity", "/transactions", &params, "whale_activity", Some(symbol))
            .await
        {
            Ok((payload, meta)) => {
                builder.set_field("whale_activity", payload);
                builder.push_source_meta(meta);
            }
            Err(err) => builder.warn(format!("whale_activity: {err}")),
        }
    }
}

#[async_trait]
impl ToolFacade for OnchainWhaleActivityTool {
    fn name(&self) -> &'static str {
        "onchain_whale_activity"
    }

    fn description(&self) -> &'static str {
        "Large on-chain transfer ('whale') activity for a symbol over a lookback window."
    }

    fn input_schema(&self) -> &'static ToolInputSchema {
        &SCHEMA
    }

    fn capabilities(&self) -> &'static [&'static str] {
        DEFAULT_CAPABILITIES
    }

    fn example_arguments(&self) -> Value {
        json!({"symbol": "BTC", "min_value_usd": 500_000, "lookback_hours": 24})
    }

    fn limitations(&self) -> &'static [&'static str] {
        &["single-source (whale_alert); no cross-source comparison or fallback chain"]
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> Result<Envelope> {
        let symbol = arguments.get("symbol").and_then(Value::as_str).ok_or_else(|| Error::Validation("missing required field 'symbol'".to_string()))?.to_uppercase();
        let min_value_usd = arguments.get("min_value_usd").and_then(Value::as_f64).unwrap_or(DEFAULT_MIN_VALUE_USD);
        let lookback_hours = arguments.get("lookback_hours").and_then(Value::as_u64).unwrap_or(DEFAULT_LOOKBACK_HOURS);

        let capabilities = requested_capabilities(&arguments, DEFAULT_CAPABILITIES);
        let mut builder = EnvelopeBuilder::new();

        for capability in &capabilities {
            match *capability {
                "whale_activity" => Self::fetch_whale_activity(ctx, &symbol, min_value_usd, lookback_hours, &mut builder).await,
                other => builder.warn(format!("unknown capability '{other}'")),
            }
        }

        Ok(builder.build())
    }
}
