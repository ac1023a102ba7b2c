//! `crypto_overview`: token identity, market price (cross-checked), supply,
//! holder distribution, and developer activity.
//!
//! Grounded on `tools/crypto/overview.py`'s `CryptoOverviewTool.execute`:
//! same capability set (minus `social`/`sector`, which no adapter in this
//! crate backs), the same `_detect_price_conflict` → average-or-primary
//! resolution for `market`, and the same "holders needs chain + token
//! address" guard, word for word.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::model::Envelope;
use crate::orchestrator::EnvelopeBuilder;
use crate::validation::{FieldKind, FieldSchema, ToolInputSchema};
use crate::{Error, Result};

use super::{CrossCheckStrategy, ToolContext, ToolFacade, requested_capabilities};

const DEFAULT_CAPABILITIES: &[&str] = &["basic", "market", "supply", "holders", "dev_activity"];

/// Symbols common enough that chain ambiguity doesn't need a warning.
const MAJOR_SYMBOLS: &[&str] = &["BTC", "ETH", "USDT", "USDC", "BNB", "SOL", "XRP", "ADA", "DOGE"];

/// Repositories `dev_activity` resolves without an explicit `repo`
/// parameter. The normalized `basic` payload carries no homepage link (its
/// shape is a fixed [`crate::model::DataType::Basic`] tag, not CoinGecko's
/// raw `links` object), so this table stands in for parsing one out of a
/// raw upstream response.
const KNOWN_REPOS: &[(&str, &str)] = &[("BTC", "bitcoin/bitcoin"), ("ETH", "ethereum/go-ethereum"), ("SOL", "solana-labs/solana"), ("ADA", "input-output-hk/cardano-node")];

const SCHEMA: ToolInputSchema = ToolInputSchema {
    fields: &[
        FieldSchema {
            name: "symbol",
            kind: FieldKind::String,
            required: true,
            enum_values: None,
        },
        FieldSchema {
            name: "chain",
            kind: FieldKind::String,
            required: false,
            enum_values: None,
        },
        FieldSchema {
            name: "token_address",
            kind: FieldKind::String,
            required: false,
            enum_values: None,
        },
        FieldSchema {
            name: "repo",
            kind: FieldKind::String,
            required: false,
            enum_values: None,
        },
        FieldSchema {
            name: "include_fields",
            kind: FieldKind::StringArray,
            required: false,
            enum_values: Some(&["basic", "market", "supply", "holders", "dev_activity", "all"]),
        },
    ],
};

/// Token identity, market, supply, holders, and developer-activity tool.
pub struct CryptoOverviewTool;

impl CryptoOverviewTool {
    fn known_repo(symbol: &str) -> Option<&'static str> {
        KNOWN_REPOS.iter().find(|(s, _)| *s == symbol).map(|(_, repo)| *repo)
    }

    async fn fetch_basic(ctx: &ToolContext, symbol: &str, chain: Option<&str>, builder: &mut EnvelopeBuilder) {
        let params = json!({"id": symbol.to_lowercase(), "symbol": symbol});
        match ctx.fetch("crypto_overview", "basic", "/coins/lookup", &params, "basic", Some(symbol)).await {
            Ok((payload, meta)) => {
                builder.set_field("basic", payload);
                builder.push_source_meta(meta);
            }
            Err(err) => builder.warn(format!("basic: {err}")),
        };
        if !MAJOR_SYMBOLS.contains(&symbol) && chain.is_none() {
            builder.warn(format!("'{symbol}' is not a widely-recognized symbol; defaulting to Ethereum mainnet unless 'chain' is specified"));
        }
    }

    async fn fetch_market(ctx: &ToolContext, symbol: &str, builder: &mut EnvelopeBuilder) {
        let params = json!({"id": symbol.to_lowercase(), "symbol": format!("{symbol}USDT")});
        match ctx.fetch_cross_checked("crypto_overview", "market", "/market", &params, "market", "price", CrossCheckStrategy::AverageOrPrimary).await {
            Ok(outcome) => {
                builder.set_field("market", outcome.payload);
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
            Err(err) => builder.warn(format!("market: {err}")),
        }
    }

    async fn fetch_supply(ctx: &ToolContext, symbol: &str, builder: &mut EnvelopeBuilder) {
        let params = json!({"id": symbol.to_lowercase()});
        match ctx.fetch("crypto_overview", "supply", "/supply", &params, "supply", Some(symbol)).await {
            Ok((payload, meta)) => {
                builder.set_field("supply", payload);
                builder.push_source_meta(meta);
            }
            Err(err) => builder.warn(format!("supply: {err}")),
        }
    }

    async fn fetch_holders(ctx: &ToolContext, symbol: &str, chain: Option<&str>, token_address: Option<&str>, builder: &mut EnvelopeBuilder) {
        let (Some(chain), Some(token_address)) = (chain, token_address) else {
            builder.warn("holders: requires 'chain' and 'token_address' parameters");
            return;
        };
        let params = json!({"module": "token", "action": "tokenholderlist", "contractaddress": token_address, "page": 1, "offset": 10});
        match ctx.fetch(&format!("crypto_overview:{chain}"), "holders", "", &params, "holders", Some(symbol)).await {
            Ok((payload, meta)) => {
                builder.set_field("holders", payload);
                builder.push_source_meta(meta);
            }
            Err(err) => builder.warn(format!("holders: {err}")),
        }
    }

    async fn fetch_dev_activity(ctx: &ToolContext, symbol: &str, explicit_repo: Option<&str>, builder: &mut EnvelopeBuilder) {
        let Some(repo) = explicit_repo.or_else(|| Self::known_repo(symbol)) else {
            builder.warn(format!("dev_activity: no known repository for '{symbol}'; supply a 'repo' parameter"));
            return;
        };
        let Some((owner, name)) = repo.split_once('/') else {
            builder.warn(format!("dev_activity: malformed 'repo' parameter '{repo}', expected 'owner/name'"));
            return;
        };
        let params = json!({"owner": owner, "repo": name});
        match ctx.fetch("crypto_overview", "dev_activity", &format!("/repos/{owner}/{name}"), &params, "dev_activity", Some(symbol)).await {
            Ok((payload, meta)) => {
                builder.set_field("dev_activity", payload);
                builder.push_source_meta(meta);
            }
            Err(err) => builder.warn(format!("dev_activity: {err}")),
        }
    }
}

#[async_trait]
impl ToolFacade for CryptoOverviewTool {
    fn name(&self) -> &'static str {
        "crypto_overview"
    }

    fn description(&self) -> &'static str {
        "Token identity, market price (cross-checked), supply, holder distribution, and developer activity."
    }

    fn input_schema(&self) -> &'static ToolInputSchema {
        &SCHEMA
    }

    fn capabilities(&self) -> &'static [&'static str] {
        DEFAULT_CAPABILITIES
    }

    fn example_arguments(&self) -> Value {
        json!({"symbol": "BTC", "include_fields": ["basic", "market", "supply"]})
    }

    fn limitations(&self) -> &'static [&'static str] {
        &["holders requires both 'chain' and 'token_address'; omitting either leaves data.holders unset with a warning", "dev_activity falls back to a fixed symbol→repo table unless an explicit 'repo' parameter is given"]
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> Result<Envelope> {
        let symbol = arguments.get("symbol").and_then(Value::as_str).ok_or_else(|| Error::Validation("missing required field 'symbol'".to_string()))?.to_uppercase();
        let chain = arguments.get("chain").and_then(Value::as_str);
        let token_address = arguments.get("token_address").and_then(Value::as_str);
        let repo = arguments.get("repo").and_then(Value::as_str);

        let capabilities = requested_capabilities(&arguments, DEFAULT_CAPABILITIES);
        let mut builder = EnvelopeBuilder::new();

        for capability in &capabilities {
            match *capability {
                "basic" => Self::fetch_basic(ctx, &symbol, chain, &mut builder).await,
                "market" => Self::fetch_market(ctx, &symbol, &mut builder).await,
                "supply" => Self::fetch_supply(ctx, &symbol, &mut builder).await,
                "holders" => Self::fetch_holders(ctx, &symbol, chain, token_address, &mut builder).await,
                "dev_activity" => Self::fetch_dev_activity(ctx, &symbol, repo, &mut builder).await,
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
    fn known_repo_resolves_major_symbols() {
        assert_eq!(CryptoOverviewTool::known_repo("BTC"), Some("bitcoin/bitcoin"));
        assert_eq!(CryptoOverviewTool::known_repo("NOPE"), None);
    }

    #[test]
    fn input_schema_requires_symbol() {
        assert!(SCHEMA.validate(&json!({})).is_err());
        assert!(SCHEMA.validate(&json!({"symbol": "BTC"})).is_ok());
    }
}
