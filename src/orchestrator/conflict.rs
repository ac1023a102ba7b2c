//! Conflict resolver: compares a numeric field across two sources,
//! classifies divergence against a per-field threshold, and decides which
//! value propagates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::model::{Conflict, ResolutionStrategy};

/// One source's observed value for a cross-checked field.
pub struct FieldObservation<'a> {
    /// Provider name.
    pub provider: &'a str,
    /// Observed numeric value.
    pub value: f64,
    /// When this observation was fetched.
    pub as_of_utc: DateTime<Utc>,
}

/// Stateless comparison/resolution logic for one field between two
/// sources.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Average-or-primary resolution: at or below `threshold_percent`,
    /// average the two values; above it, the primary wins outright.
    #[must_use]
    pub fn resolve_average_or_primary(field: &str, primary: &FieldObservation<'_>, secondary: &FieldObservation<'_>, threshold_percent: f64) -> Conflict {
        let diff_absolute = (primary.value - secondary.value).abs();
        let diff_percent = if primary.value == 0.0 { 0.0 } else { diff_absolute / primary.value * 100.0 };

        let (resolution, final_value) = if diff_percent <= threshold_percent {
            (ResolutionStrategy::Average, (primary.value + secondary.value) / 2.0)
        } else {
            (ResolutionStrategy::PrimarySource, primary.value)
        };

        Self::build(field, primary, secondary, Some(diff_percent), Some(diff_absolute), resolution, final_value)
    }

    /// Latest-timestamp resolution: whichever observation is more recent
    /// wins, regardless of divergence magnitude.
    #[must_use]
    pub fn resolve_latest_timestamp(field: &str, primary: &FieldObservation<'_>, secondary: &FieldObservation<'_>) -> Conflict {
        let final_value = if secondary.as_of_utc > primary.as_of_utc { secondary.value } else { primary.value };
        let diff_absolute = (primary.value - secondary.value).abs();
        let diff_percent = if primary.value == 0.0 { 0.0 } else { diff_absolute / primary.value * 100.0 };

        Self::build(field, primary, secondary, Some(diff_percent), Some(diff_absolute), ResolutionStrategy::LatestTimestamp, final_value)
    }

    /// Manual resolution: recorded but never auto-applied; the primary's
    /// value always propagates.
    #[must_use]
    pub fn resolve_manual(field: &str, primary: &FieldObservation<'_>, secondary: &FieldObservation<'_>) -> Conflict {
        Self::build(field, primary, secondary, None, None, ResolutionStrategy::Manual, primary.value)
    }

    fn build(
        field: &str,
        primary: &FieldObservation<'_>,
        secondary: &FieldObservation<'_>,
        diff_percent: Option<f64>,
        diff_absolute: Option<f64>,
        resolution: ResolutionStrategy,
        final_value: f64,
    ) -> Conflict {
        let mut values = HashMap::new();
        values.insert(primary.provider.to_string(), primary.value);
        values.insert(secondary.provider.to_string(), secondary.value);

        Conflict {
            field: field.to_string(),
            values,
            diff_percent,
            diff_absolute,
            resolution,
            final_value,
        }
    }

    /// Write `conflict.final_value` into `payload[conflict.field]`, unless
    /// the resolution is `Manual` — manual conflicts are recorded but never
    /// auto-applied, so the primary payload is left untouched.
    pub fn apply(payload: &mut Value, conflict: &Conflict) {
        if conflict.resolution == ResolutionStrategy::Manual {
            return;
        }
        if let Some(obj) = payload.as_object_mut() {
            obj.insert(conflict.field.clone(), json!(conflict.final_value));
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    use super::*;

    fn obs(provider: &str, value: f64, as_of_utc: DateTime<Utc>) -> FieldObservation<'_> {
        FieldObservation { provider, value, as_of_utc }
    }

    #[test]
    fn small_divergence_averages() {
        let now = Utc::now();
        let primary = obs("primary", 95_000.0, now);
        let secondary = obs("secondary", 95_100.0, now);
        let conflict = ConflictResolver::resolve_average_or_primary("price", &primary, &secondary, 0.5);
        assert_eq!(conflict.resolution, ResolutionStrategy::Average);
        assert_eq!(conflict.final_value, 95_050.0);
    }

    #[test]
    fn large_divergence_keeps_primary() {
        let now = Utc::now();
        let primary = obs("primary", 95_000.0, now);
        let secondary = obs("secondary", 96_000.0, now);
        let conflict = ConflictResolver::resolve_average_or_primary("price", &primary, &secondary, 0.5);
        assert_eq!(conflict.resolution, ResolutionStrategy::PrimarySource);
        assert_eq!(conflict.final_value, 95_000.0);
        assert!((conflict.diff_percent.unwrap() - 1.052_631_6).abs() < 1e-4);
    }

    #[test]
    fn exactly_at_threshold_averages() {
        let now = Utc::now();
        let primary = obs("primary", 1_000.0, now);
        let secondary = obs("secondary", 1_005.0, now);
        let conflict = ConflictResolver::resolve_average_or_primary("price", &primary, &secondary, 0.5);
        assert_eq!(conflict.resolution, ResolutionStrategy::Average);
    }

    #[test]
    fn latest_timestamp_prefers_more_recent_observation() {
        let earlier = Utc::now() - ChronoDuration::minutes(5);
        let later = Utc::now();
        let primary = obs("primary", 10.0, earlier);
        let secondary = obs("secondary", 20.0, later);
        let conflict = ConflictResolver::resolve_latest_timestamp("rate", &primary, &secondary);
        assert_eq!(conflict.final_value, 20.0);
    }

    #[test]
    fn manual_resolution_never_mutates_payload() {
        let now = Utc::now();
        let primary = obs("primary", 10.0, now);
        let secondary = obs("secondary", 20.0, now);
        let conflict = ConflictResolver::resolve_manual("score", &primary, &secondary);
        let mut payload = json!({"score": 10.0});
        ConflictResolver::apply(&mut payload, &conflict);
        assert_eq!(payload["score"], 10.0);
    }

    #[test]
    fn average_resolution_overwrites_payload_field() {
        let now = Utc::now();
        let primary = obs("primary", 95_000.0, now);
        let secondary = obs("secondary", 95_100.0, now);
        let conflict = ConflictResolver::resolve_average_or_primary("price", &primary, &secondary, 0.5);
        let mut payload = json!({"price": 95_000.0});
        ConflictResolver::apply(&mut payload, &conflict);
        assert_eq!(payload["price"], 95_050.0);
    }
}
