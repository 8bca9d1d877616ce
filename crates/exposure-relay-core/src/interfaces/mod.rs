// crates/exposure-relay-core/src/interfaces/mod.rs
// ============================================================================
// Module: Exposure Relay Interfaces
// Description: Storage and replay-registry seams for the publishing pipeline.
// Purpose: Define the traits hosts implement and the error taxonomy they use.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The pipeline mutates exactly two shared resources: the day-bucket key
//! store and the single-use token registry. Both are reached through traits
//! so deployments can wire durable implementations while tests use in-memory
//! ones. All mutation must be atomic at the implementation level (conditional
//! insert, identity column); callers never wrap these traits in locks.
//!
//! Security posture: store contents and registry keys derive from untrusted
//! client input; error messages must not embed raw key material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::AppSource;
use crate::core::ExposedKey;
use crate::core::KeyDay;
use crate::core::UnixMillis;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Exposed-key store errors.
///
/// # Invariants
/// - Messages avoid embedding raw key payloads.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// Underlying storage is unreachable or a transaction failed. Callers may
    /// retry with the same idempotent payload.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The row is malformed or violates a store limit.
    #[error("store rejected row: {0}")]
    Invalid(String),
}

/// Replay registry errors.
#[derive(Debug, Error, Clone)]
pub enum ReplayRegistryError {
    /// Underlying registry storage is unreachable or a transaction failed.
    #[error("replay registry unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SECTION: Exposed Key Store
// ============================================================================

/// Day-partitioned persistence for exposed keys.
///
/// Implementations must provide an atomic conditional insert: concurrent
/// upserts of an identical `(payload, day)` pair result in exactly one stored
/// row and no error to either caller.
pub trait ExposedKeyStore: Send + Sync {
    /// Inserts the key if no row exists for `(key.payload, key.day)`;
    /// otherwise leaves the existing row untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write cannot be committed.
    fn upsert(&self, key: &ExposedKey, app_source: &AppSource) -> Result<(), StoreError>;

    /// Returns all rows for the day bucket ordered by descending identifier
    /// (most recently inserted first).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn sorted_for_day(&self, day: KeyDay) -> Result<Vec<ExposedKey>, StoreError>;

    /// Returns the highest row identifier in the day bucket, or `0` when the
    /// bucket is empty. Never decreases as rows are added.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn max_id_for_day(&self, day: KeyDay) -> Result<i64, StoreError>;
}

// ============================================================================
// SECTION: Replay Registry
// ============================================================================

/// Outcome of a conditional token consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    /// The subject had not been consumed before; it is now recorded.
    FirstUse,
    /// The subject was already consumed by a prior submission.
    AlreadyConsumed,
}

/// Durable record of which single-use tokens have authorized a submission.
///
/// Entries must survive at least for the token's validity window. In-memory
/// implementations are acceptable only when submissions are routed to a
/// single authoritative instance.
pub trait ReplayRegistry: Send + Sync {
    /// Atomically records the subject as consumed unless it already is.
    ///
    /// Implementations may evict entries whose `expires_at` is at or before
    /// `now`; an expired entry never blocks consumption because expired
    /// tokens are rejected upstream.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayRegistryError`] when the registry cannot be reached.
    fn consume(
        &self,
        subject: &str,
        expires_at: UnixMillis,
        now: UnixMillis,
    ) -> Result<TokenUse, ReplayRegistryError>;

    /// Removes a consumption record so the subject can authorize again.
    ///
    /// Used only to undo a consumption after a downstream storage failure;
    /// releasing an absent subject is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayRegistryError`] when the registry cannot be reached.
    fn release(&self, subject: &str) -> Result<(), ReplayRegistryError>;
}
