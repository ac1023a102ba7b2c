//! The orchestration core: fallback engine, cross-source verifier, conflict
//! resolver, and envelope builder. Everything else in this crate (adapters,
//! transports, config loading, tool façades) is glue around this module.

mod conflict;
mod envelope;
mod fallback;
mod verifier;

pub use conflict::{ConflictResolver, FieldObservation};
pub use envelope::EnvelopeBuilder;
pub use fallback::FallbackEngine;
pub use verifier::{CrossSourceVerifier, VerifyOutcome};
