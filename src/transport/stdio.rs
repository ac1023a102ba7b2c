//! Line-oriented JSON-RPC 2.0 server loop over stdin/stdout.
//!
//! Grounded on the teacher's subprocess client transport
//! (`transport/stdio.rs`), which frames each message as a single line of
//! JSON written to a child's stdin/read from its stdout via
//! `BufReader::lines()` / `AsyncWriteExt::write_all`. This is the server
//! side of that same framing: requests arrive on our stdin, responses go
//! to our stdout.

use std::sync::Arc;

use serde_json::json;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::protocol::{Content, JsonRpcMessage, JsonRpcResponse, RequestId, Tool, ToolsCallParams, ToolsCallResult, ToolsListResult};
use crate::security::sanitize_json_value;
use crate::tools::{ToolContext, ToolRegistry};
use crate::{Error, Result};

/// Serves `tools/list` and `tools/call` over stdin/stdout until EOF.
pub struct StdioTransport {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
}

impl StdioTransport {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, context: ToolContext) -> Self {
        Self { registry, context }
    }

    /// Run the read-dispatch-write loop until stdin closes.
    pub async fn run(&self) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        while let Some(line) = lines.next_line().await.map_err(Error::Io)? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some(response) = self.handle_line(trimmed).await else {
                continue;
            };

            let mut bytes = serde_json::to_vec(&response)?;
            bytes.push(b'\n');
            stdout.write_all(&bytes).await.map_err(Error::Io)?;
            stdout.flush().await.map_err(Error::Io)?;
        }

        Ok(())
    }

    /// Parse and dispatch a single line. Returns `None` for notifications,
    /// which have no response.
    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let message: JsonRpcMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "Failed to parse JSON-RPC message");
                return Some(JsonRpcResponse::error(None, -32700, format!("Parse error: {e}")));
            }
        };

        let request = match message {
            JsonRpcMessage::Notification(n) => {
                debug!(method = %n.method, "Ignoring notification");
                return None;
            }
            JsonRpcMessage::Response(_) => {
                debug!("Ignoring unsolicited response on server stdio transport");
                return None;
            }
            JsonRpcMessage::Request(r) => r,
        };

        Some(self.dispatch(request.id, &request.method, request.params).await)
    }

    async fn dispatch(&self, id: RequestId, method: &str, params: Option<serde_json::Value>) -> JsonRpcResponse {
        match method {
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, params).await,
            other => JsonRpcResponse::error(Some(id), -32601, format!("Method not found: {other}")),
        }
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let tools = self
            .registry
            .list()
            .iter()
            .filter(|facade| self.context.is_tool_enabled(facade.name()))
            .map(|facade| Tool {
                name: facade.name().to_string(),
                description: facade.description().to_string(),
                input_schema: facade.input_schema().to_json_schema(),
            })
            .collect();

        let result = ToolsListResult { tools, next_cursor: None };
        JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(json!({})))
    }

    /// Spec §6: `call_tool` never surfaces a JSON-RPC protocol error for a
    /// failure internal to the tool invocation — it always answers with a
    /// single text content item, `"Error: <message>"` on failure or
    /// `"Unknown tool: <name>"` for a name this gateway doesn't serve
    /// (disabled tools are treated the same as unknown, per spec §6's
    /// "refuse to register or invoke a tool that configuration marks
    /// disabled"). Only malformed JSON-RPC framing (missing/unparseable
    /// `params`) is a protocol-level error.
    async fn handle_tools_call(&self, id: RequestId, params: Option<serde_json::Value>) -> JsonRpcResponse {
        let params: ToolsCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(p)) => p,
            Ok(None) => return JsonRpcResponse::error(Some(id), -32602, "Missing params"),
            Err(e) => return JsonRpcResponse::error(Some(id), -32602, format!("Invalid params: {e}")),
        };

        let known = self.registry.get(&params.name);
        let Some(facade) = known.filter(|_| self.context.is_tool_enabled(&params.name)) else {
            return Self::text_result(id, format!("Unknown tool: {}", params.name), true);
        };

        let arguments = match sanitize_json_value(&params.arguments) {
            Ok(v) => v,
            Err(e) => return Self::text_result(id, format!("Error: {e}"), true),
        };

        if let Err(e) = facade.input_schema().validate(&arguments) {
            return Self::text_result(id, format!("Error: {e}"), true);
        }

        let asset = crate::tools::evidence_asset(&params.name, &arguments);
        match facade.invoke(&self.context, arguments).await {
            Ok(envelope) => {
                self.context.emit_evidence(&asset, &envelope);
                let text = serde_json::to_string(&envelope).unwrap_or_default();
                Self::text_result(id, text, false)
            }
            Err(err) => Self::text_result(id, format!("Error: {err}"), true),
        }
    }

    fn text_result(id: RequestId, text: String, is_error: bool) -> JsonRpcResponse {
        let result = ToolsCallResult {
            content: vec![Content::Text { text }],
            is_error,
        };
        JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(json!({})))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::cache::ResponseCache;
    use crate::config::{Config, FailsafeConfig};
    use crate::credentials::CredentialResolver;
    use crate::orchestrator::{CrossSourceVerifier, FallbackEngine};
    use crate::registry::SourceRegistry;

    fn transport_with(config: Config) -> StdioTransport {
        let config = Arc::new(config);
        let source_registry = Arc::new(SourceRegistry::from_config(&config, &CredentialResolver::new()).unwrap());
        let engine = Arc::new(FallbackEngine::new(Arc::clone(&source_registry), Arc::new(ResponseCache::new()), FailsafeConfig::default()));
        let verifier = Arc::new(CrossSourceVerifier::new(Arc::clone(&engine)));
        let context = ToolContext::new(engine, verifier, config, Arc::new(crate::evidence::LoggingEvidencePersister));
        StdioTransport::new(Arc::new(ToolRegistry::new()), context)
    }

    fn content_text(response: &JsonRpcResponse) -> String {
        response.result.as_ref().unwrap()["content"][0]["text"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn unknown_tool_yields_text_result_not_protocol_error() {
        let transport = transport_with(Config::default());
        let response = transport
            .handle_tools_call(
                RequestId::Number(1),
                Some(json!({"name": "nonexistent_tool", "arguments": {}})),
            )
            .await;
        assert!(response.error.is_none());
        assert_eq!(content_text(&response), "Unknown tool: nonexistent_tool");
    }

    #[tokio::test]
    async fn disabled_tool_is_reported_as_unknown() {
        let mut config = Config::default();
        config.tools_enabled.insert("crypto_overview".to_string(), false);
        let transport = transport_with(config);
        let response = transport
            .handle_tools_call(RequestId::Number(1), Some(json!({"name": "crypto_overview", "arguments": {"symbol": "BTC"}})))
            .await;
        assert_eq!(content_text(&response), "Unknown tool: crypto_overview");
    }

    #[tokio::test]
    async fn invocation_with_no_configured_sources_returns_warned_envelope_not_an_error() {
        // `Config::default()` has no configured source chains, so every
        // capability's fallback chain is empty and fails. Spec: a fully
        // empty, all-warnings envelope is still a valid (non-error) result.
        let transport = transport_with(Config::default());
        let response = transport
            .handle_tools_call(RequestId::Number(1), Some(json!({"name": "crypto_overview", "arguments": {"symbol": "BTC"}})))
            .await;
        assert!(response.error.is_none());
        assert_eq!(response.result.as_ref().unwrap()["isError"], false);
        let text = content_text(&response);
        assert!(!text.starts_with("Error: "));
        let envelope: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(envelope["data"].as_object().unwrap().is_empty());
        assert!(!envelope["warnings"].as_array().unwrap().is_empty());
    }

    #[test]
    fn tools_list_omits_disabled_tools() {
        let mut config = Config::default();
        config.tools_enabled.insert("sentiment_overview".to_string(), false);
        let transport = transport_with(config);
        let response = transport.handle_tools_list(RequestId::Number(1));
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert!(tools.iter().all(|t| t["name"] != "sentiment_overview"));
        assert!(tools.iter().any(|t| t["name"] == "crypto_overview"));
    }
}
