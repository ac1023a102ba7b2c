//! `sentiment_overview`: aggregated social/news sentiment for a symbol.
//!
//! Grounded on `tools/sentiment/aggregator.py`'s weighted multi-channel
//! score, narrowed to the two channels this crate has adapters for: news
//! (`cryptopanic`) and social volume (`lunarcrush`, the heavier-weighted
//! `SentimentSource.TWITTER` channel in the original). Cross-checked with
//! [`CrossCheckStrategy::AverageOrPrimary`] on `score` rather than the
//! original's four-way weighted blend.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::model::Envelope;
use crate::orchestrator::EnvelopeBuilder;
use crate::validation::{FieldKind, FieldSchema, ToolInputSchema};
use crate::{Error, Result};

use super::{CrossCheckStrategy, ToolContext, ToolFacade, requested_capabilities};

const DEFAULT_CAPABILITIES: &[&str] = &["social_sentiment"];

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
            enum_values: Some(&["social_sentiment", "all"]),
        },
    ],
};

/// Aggregated social/news sentiment tool.
pub struct SentimentOverviewTool;

impl SentimentOverviewTool {
    async fn fetch_social_sentiment(ctx: &ToolContext, symbol: &str, builder: &mut EnvelopeBuilder) {
        let params = json!({"currencies": symbol.to_lowercase(), "symbol": symbol});
        match ctx
            .fetch_cross_checked("sentiment_overview", "social_sentiment", "/sentiment", &params, "social_sentiment", "score", CrossCheckStrategy::AverageOrPrimary)
            .await
        {
            Ok(outcome) => {
                builder.set_field("social_sentiment", outcome.payload);
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
            Err(err) => builder.warn(format!("social_sentiment: {err}")),
        }
    }
}

#[async_trait]
impl ToolFacade for SentimentOverviewTool {
    fn name(&self) -> &'static str {
        "sentiment_overview"
    }

    fn description(&self) -> &'static str {
        "Aggregated social and news sentiment for a symbol, cross-checked across channels."
    }

    fn input_schema(&self) -> &'static ToolInputSchema {
        &SCHEMA
    }

    fn capabilities(&self) -> &'static [&'static str] {
        DEFAULT_CAPABILITIES
    }

    fn example_arguments(&self) -> Value {
        json!({"symbol": "BTC"})
    }

    fn limitations(&self) -> &'static [&'static str] {
        &["blends two channels (news, social volume) rather than the full four-channel weighting a broader sentiment pipeline might use"]
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> Result<Envelope> {
        let symbol = arguments.get("symbol").and_then(Value::as_str).ok_or_else(|| Error::Validation("missing required field 'symbol'".to_string()))?.to_uppercase();

        let capabilities = requested_capabilities(&arguments, DEFAULT_CAPABILITIES);
        let mut builder = EnvelopeBuilder::new();

        for capability in &capabilities {
            match *capability {
                "social_sentiment" => Self::fetch_social_sentiment(ctx, &symbol, &mut builder).await,
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
    fn input_schema_requires_symbol() {
        assert!(SCHEMA.validate(&json!({})).is_err());
        assert!(SCHEMA.validate(&json!({"symbol": "BTC"})).is_ok());
    }
}
