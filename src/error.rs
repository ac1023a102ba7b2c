//! Error types for the Fabric Gateway
//!
//! Kinds here mirror the error taxonomy of the orchestration core: adapter
//! failures are recoverable within the fallback engine, capability-level
//! exhaustion is recoverable within a tool façade, and validation/config
//! errors propagate to the transport.

use std::collections::HashMap;
use std::io;

use thiserror::Error;

/// Result type alias for the Fabric Gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Fabric Gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration at startup. Fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single adapter's failure, collected by the fallback engine.
    #[error("data source error ({kind}) from {source}: {reason}")]
    DataSource {
        /// Which source produced the error
        source: String,
        /// Error classification
        kind: DataSourceErrorKind,
        /// Human-readable detail
        reason: String,
    },

    /// The fallback chain for `(tool, capability)` was exhausted: every
    /// configured source failed. Carries every source's reason so the tool
    /// façade can surface a complete warning.
    #[error("all sources failed for capability '{capability}': {errors:?}")]
    AllSourcesFailed {
        /// Capability that could not be satisfied
        capability: String,
        /// Per-source failure reasons
        errors: HashMap<String, String>,
    },

    /// Input was under-specified to resolve a multi-chain / multi-market
    /// symbol (e.g. no `chain` or `token_address` given).
    #[error("ambiguous symbol '{symbol}': {reason}")]
    AmbiguousSymbol {
        /// The symbol that could not be disambiguated
        symbol: String,
        /// What additional parameter would resolve it
        reason: String,
    },

    /// Cache backend unreachable. Never fatal: the core degrades silently
    /// to a cache miss and logs a warning.
    #[error("cache error: {0}")]
    Cache(String),

    /// Input did not satisfy the declared schema for a tool.
    #[error("validation error: {0}")]
    Validation(String),

    /// The named tool is disabled by configuration.
    #[error("tool '{0}' is disabled")]
    ToolDisabled(String),

    /// No tool is registered under the requested name.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Protocol-level error (malformed JSON-RPC, unknown method/tool).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal/programming error. Should not normally surface.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classification of an upstream adapter failure.
///
/// Distinct from [`Error`] itself so the fallback engine can match on
/// failure *kind* without constructing full `Error` values for every
/// chain attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceErrorKind {
    /// The upstream call exceeded its configured timeout.
    Timeout,
    /// HTTP 429 or equivalent; the source's bucket is exhausted.
    RateLimit,
    /// HTTP 401/403 or equivalent; credentials missing or rejected.
    Auth,
    /// HTTP 404 or equivalent; the requested resource does not exist.
    NotFound,
    /// Connection refused, DNS failure, TLS failure, or similar.
    Transport,
    /// The response body could not be parsed into the expected shape.
    Decode,
}

impl DataSourceErrorKind {
    /// Stable lowercase label, used in log fields and error payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Transport => "transport",
            Self::Decode => "decode",
        }
    }
}

impl std::fmt::Display for DataSourceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Build a `DataSource` error.
    pub fn data_source(source: impl Into<String>, kind: DataSourceErrorKind, reason: impl Into<String>) -> Self {
        Self::DataSource {
            source: source.into(),
            kind,
            reason: reason.into(),
        }
    }

    /// `true` when this error should be caught by the fallback engine and
    /// treated as "try the next source" rather than a hard failure.
    #[must_use]
    pub fn is_recoverable_adapter_error(&self) -> bool {
        matches!(self, Self::DataSource { .. })
    }

    /// Map to a JSON-RPC error code for the stdio tool transport.
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::Protocol(_) => rpc_codes::INVALID_REQUEST,
            Self::Validation(_) => rpc_codes::INVALID_PARAMS,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }

    /// Map to an HTTP status code for the REST transport.
    #[must_use]
    pub fn to_http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::ToolDisabled(_) => 503,
            Self::UnknownTool(_) => 404,
            Self::Config(_) | Self::Internal(_) | Self::Io(_) | Self::Json(_) | Self::Http(_) => 500,
            _ => 500,
        }
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.to_http_status()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        // Spec §6: validation failures carry field-level detail (already
        // folded into the message by `ToolInputSchema::validate`), and
        // unhandled/5xx failures carry `{ detail, error }`. `detail` always
        // echoes the error kind's name so a caller can branch on it without
        // parsing the human-readable `error` string.
        let detail = match &self {
            Self::Validation(msg) => msg.clone(),
            other => other.to_string(),
        };
        let body = axum::Json(serde_json::json!({"error": self.to_string(), "detail": detail}));
        (status, body).into_response()
    }
}

/// Standard JSON-RPC error codes, used by the stdio tool transport.
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
}
