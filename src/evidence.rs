//! Persistence sidecar collaborator interface (spec §6).
//!
//! The core optionally emits an [`EvidenceBundle`] per tool invocation for a
//! downstream persister (object store / relational index / columnar store)
//! to consume. The core neither reads nor depends on the persister's
//! success — emission is fire-and-forget, matching spec §1's "Persistence
//! sidecars ... are out of scope; the core emits bundles; persistence is
//! fire-and-forget."

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::model::{Envelope, SourceMeta};

/// One upstream contribution folded into an evidence bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Provenance for this contribution.
    pub source_meta: SourceMeta,
    /// The normalized payload this source contributed.
    pub payload: Value,
}

/// A tamper-evident record of one tool invocation's provenance, built from
/// the envelope it produced. `hash` is a content hash over the bundle's
/// items, so downstream consumers can detect a bundle that was altered
/// after emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Opaque identifier for this bundle.
    pub bundle_id: String,
    /// When the bundle was built.
    pub as_of: DateTime<Utc>,
    /// The latest `as_of_utc` among contributing sources; the bundle's
    /// freshness watermark.
    pub watermark: DateTime<Utc>,
    /// Subject of the invocation (e.g. the symbol or protocol queried).
    pub asset: String,
    /// One entry per contributing source.
    pub items: Vec<EvidenceItem>,
    /// Number of conflicts detected and resolved for this invocation.
    pub conflicts_count: usize,
    /// SHA-256 hex digest over the bundle's items, for tamper detection.
    pub hash: String,
    /// Whether every item's freshness met its capability's TTL-derived SLA.
    pub freshness_sla_met: bool,
}

impl EvidenceBundle {
    /// Build a bundle from a finished [`Envelope`] and the subject it was
    /// computed for. `bundle_id` is caller-supplied (see
    /// [`crate::tools::ToolContext::emit_evidence`], which mints one per
    /// invocation) so this constructor stays a pure function of its inputs.
    #[must_use]
    pub fn from_envelope(bundle_id: impl Into<String>, asset: impl Into<String>, envelope: &Envelope) -> Self {
        let items: Vec<EvidenceItem> = envelope
            .source_meta
            .iter()
            .map(|meta| EvidenceItem {
                source_meta: meta.clone(),
                payload: envelope.data.clone(),
            })
            .collect();

        let watermark = envelope.source_meta.iter().map(|m| m.as_of_utc).max().unwrap_or(envelope.as_of_utc);

        let freshness_sla_met = envelope
            .source_meta
            .iter()
            .all(|m| (envelope.as_of_utc - m.as_of_utc).num_seconds() <= i64::try_from(m.ttl_seconds).unwrap_or(i64::MAX));

        let hash = Self::hash_items(&items);

        Self {
            bundle_id: bundle_id.into(),
            as_of: envelope.as_of_utc,
            watermark,
            asset: asset.into(),
            conflicts_count: envelope.conflicts.len(),
            items,
            hash,
            freshness_sla_met,
        }
    }

    fn hash_items(items: &[EvidenceItem]) -> String {
        let mut hasher = Sha256::new();
        for item in items {
            hasher.update(item.source_meta.provider.as_bytes());
            hasher.update(item.payload.to_string().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Collaborator contract a persistence sidecar implements. The default
/// [`LoggingEvidencePersister`] is the only implementation this crate
/// ships; real sinks (object store / relational index / columnar store)
/// are out-of-scope external collaborators per spec §1.
#[async_trait::async_trait]
pub trait EvidencePersister: Send + Sync {
    /// Persist a bundle. Failures are logged by the implementation, never
    /// propagated back into the request path.
    async fn persist(&self, bundle: &EvidenceBundle);
}

/// No-op persister that logs what it would have written. Stands in for the
/// real object-store/relational/columnar sinks, which are external
/// collaborators outside this crate's scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEvidencePersister;

#[async_trait::async_trait]
impl EvidencePersister for LoggingEvidencePersister {
    async fn persist(&self, bundle: &EvidenceBundle) {
        tracing::info!(
            bundle_id = %bundle.bundle_id,
            asset = %bundle.asset,
            items = bundle.items.len(),
            conflicts = bundle.conflicts_count,
            freshness_sla_met = bundle.freshness_sla_met,
            "evidence bundle ready for persistence (no-op sink)"
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::SourceMeta;

    fn envelope_with(meta: SourceMeta, data: Value) -> Envelope {
        let mut envelope = Envelope::empty();
        envelope.data = data;
        envelope.as_of_utc = meta.as_of_utc;
        envelope.source_meta.push(meta);
        envelope
    }

    #[test]
    fn bundle_hash_is_stable_for_identical_items() {
        let meta = SourceMeta::new("coingecko", "/simple/price", 60, 10);
        let envelope = envelope_with(meta, json!({"price": 1.0}));
        let bundle_a = EvidenceBundle::from_envelope("b1", "BTC", &envelope);
        let bundle_b = EvidenceBundle::from_envelope("b2", "BTC", &envelope);
        assert_eq!(bundle_a.hash, bundle_b.hash);
    }

    #[test]
    fn watermark_is_the_latest_source_meta_timestamp() {
        let meta = SourceMeta::new("coingecko", "/x", 60, 10);
        let as_of = meta.as_of_utc;
        let envelope = envelope_with(meta, Value::Null);
        let bundle = EvidenceBundle::from_envelope("b1", "BTC", &envelope);
        assert_eq!(bundle.watermark, as_of);
    }

    #[test]
    fn freshness_sla_met_when_within_ttl() {
        let meta = SourceMeta::new("coingecko", "/x", 300, 10);
        let envelope = envelope_with(meta, Value::Null);
        let bundle = EvidenceBundle::from_envelope("b1", "BTC", &envelope);
        assert!(bundle.freshness_sla_met);
    }
}
