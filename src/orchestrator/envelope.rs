//! Provenance & envelope builder: collects per-capability contributions
//! into the single surface contract every tool façade returns.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::model::{Conflict, Envelope, SourceMeta};

/// Accumulates one tool invocation's results before producing an
/// [`Envelope`]. Never strips `SourceMeta`; a capability's failure adds a
/// warning and leaves its field unset rather than removing anything
/// already collected.
#[derive(Default)]
pub struct EnvelopeBuilder {
    data: Map<String, Value>,
    source_meta: Vec<SourceMeta>,
    conflicts: Vec<Conflict>,
    warnings: Vec<String>,
}

impl EnvelopeBuilder {
    /// Start an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one capability's payload field on the envelope's `data` object.
    pub fn set_field(&mut self, name: &str, value: Value) -> &mut Self {
        self.data.insert(name.to_string(), value);
        self
    }

    /// Append one contribution's provenance. Order is the order responses
    /// were finalized, not chain priority order.
    pub fn push_source_meta(&mut self, meta: SourceMeta) -> &mut Self {
        self.source_meta.push(meta);
        self
    }

    /// Record a resolved divergence.
    pub fn push_conflict(&mut self, conflict: Conflict) -> &mut Self {
        self.conflicts.push(conflict);
        self
    }

    /// Record a human-readable warning, e.g. from an exhausted fallback
    /// chain or an ambiguous input.
    pub fn warn(&mut self, message: impl Into<String>) -> &mut Self {
        self.warnings.push(message.into());
        self
    }

    /// Whether any capability populated data so far.
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// Finalize into an [`Envelope`]. `as_of_utc` is stamped as the later of
    /// "now" and the latest collected `SourceMeta::as_of_utc`, preserving
    /// the invariant that the envelope is never older than any
    /// contribution.
    #[must_use]
    pub fn build(self) -> Envelope {
        let latest_source = self.source_meta.iter().map(|m| m.as_of_utc).max();
        let as_of_utc = latest_source.map_or_else(Utc::now, |latest| latest.max(Utc::now()));

        Envelope {
            data: Value::Object(self.data),
            source_meta: self.source_meta,
            conflicts: self.conflicts,
            warnings: self.warnings,
            as_of_utc,
            cached: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_builder_has_no_data_and_current_timestamp() {
        let envelope = EnvelopeBuilder::new().build();
        assert!(envelope.data.as_object().unwrap().is_empty());
        assert!(envelope.source_meta.is_empty());
    }

    #[test]
    fn as_of_utc_is_never_older_than_any_source_meta() {
        let meta = SourceMeta::new("coingecko", "/x", 30, 10);
        let as_of = meta.as_of_utc;
        let mut builder = EnvelopeBuilder::new();
        builder.push_source_meta(meta);
        let envelope = builder.build();
        assert!(envelope.as_of_utc >= as_of);
    }

    #[test]
    fn warnings_and_partial_data_coexist() {
        let mut builder = EnvelopeBuilder::new();
        builder.set_field("market", json!({"price": 1.0}));
        builder.warn("holders: requires chain and token_address");
        let envelope = builder.build();
        assert_eq!(envelope.data["market"]["price"], 1.0);
        assert_eq!(envelope.warnings.len(), 1);
        assert!(envelope.data.get("holders").is_none());
    }
}
