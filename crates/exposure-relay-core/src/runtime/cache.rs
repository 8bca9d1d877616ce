// crates/exposure-relay-core/src/runtime/cache.rs
// ============================================================================
// Module: Exposure Relay Conditional Cache Gate
// Description: Client cache-validator comparison for day-bucket reads.
// Purpose: Skip body fetch and serialization when the dataset is unchanged.
// Dependencies: none
// ============================================================================

//! ## Overview
//! High-frequency pollers send the fingerprint of their last download; when
//! it matches the bucket's current fingerprint byte-for-byte the response
//! carries no body. Any mismatch, including quoting differences, is treated
//! as `Fresh` and the body is recomputed with the current tag attached —
//! never the stale client-supplied one.

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Outcome of comparing a client validator against the current fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Validator matches; respond without a body.
    NotModified,
    /// No validator or a mismatch; fetch and return the full body.
    Fresh,
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Compares client-supplied cache validators against the current fingerprint.
///
/// # Invariants
/// - `NotModified` is returned only on exact byte equality.
/// - The gate itself never fetches the body; callers fetch only on `Fresh`.
pub struct ConditionalCacheGate;

impl ConditionalCacheGate {
    /// Decides whether the response body is needed.
    #[must_use]
    pub fn decide(client_validator: Option<&str>, current_etag: &str) -> CacheDecision {
        match client_validator {
            Some(validator) if validator == current_etag => CacheDecision::NotModified,
            Some(_) | None => CacheDecision::Fresh,
        }
    }
}
