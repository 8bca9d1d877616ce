// crates/exposure-relay-core/src/runtime/service.rs
// ============================================================================
// Module: Exposure Relay Publishing Service
// Description: Orchestrates submissions and fingerprint-gated day reads.
// Purpose: Enforce the authenticate -> validate -> upsert pipeline order.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The publishing service is the single entry point for both directions of
//! the pipeline. Submissions run authenticate, then temporal validation, then
//! the idempotent upsert; an authentication failure stops the pipeline before
//! any storage access. Reads derive the bucket fingerprint from the maximum
//! row identifier and fetch the sorted key set only when the cache gate
//! reports the body is needed.
//!
//! Security posture: the ordering is itself a security invariant —
//! unauthenticated or replayed requests must never reach storage, even as a
//! no-op.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::AppSource;
use crate::core::ExposedKey;
use crate::core::KeyDay;
use crate::core::TokenClaims;
use crate::core::UnixMillis;
use crate::core::compute_etag;
use crate::interfaces::ExposedKeyStore;
use crate::interfaces::StoreError;
use crate::runtime::authenticator::AuthError;
use crate::runtime::authenticator::SubmissionAuthenticator;
use crate::runtime::cache::CacheDecision;
use crate::runtime::cache::ConditionalCacheGate;
use crate::runtime::store::SharedExposedKeyStore;
use crate::runtime::validation::SubmissionValidator;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type fingerprints are derived for.
const FINGERPRINT_CONTENT_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pipeline error taxonomy surfaced to the HTTP layer.
///
/// # Invariants
/// - Messages avoid embedding raw key payloads or token subjects.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Authentication or replay failure; not retryable.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Temporal-policy or payload violation; the client must correct and
    /// resend.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Storage failure; safe to retry with the same idempotent payload.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The key was upserted into its day bucket (or was already present).
    Stored,
    /// The submission was a decoy; nothing was persisted.
    Decoy,
}

/// Result of a fingerprint-gated day read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayRead {
    /// Client validator matched the current state; no body was fetched.
    NotModified {
        /// Current bucket fingerprint.
        etag: String,
    },
    /// Body fetched and returned with the current fingerprint.
    Fresh {
        /// Current bucket fingerprint.
        etag: String,
        /// Bucket rows ordered by descending identifier.
        keys: Vec<ExposedKey>,
    },
}

impl DayRead {
    /// Returns the fingerprint carried by the read result.
    #[must_use]
    pub fn etag(&self) -> &str {
        match self {
            Self::NotModified {
                etag,
            }
            | Self::Fresh {
                etag, ..
            } => etag,
        }
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Orchestrates the publishing pipeline over explicit collaborators.
///
/// # Invariants
/// - Authentication runs before any storage access on the submission path.
/// - The read path fetches the body only when the cache gate says so.
pub struct ExposurePublishingService {
    /// Day-partitioned exposed-key store.
    store: SharedExposedKeyStore,
    /// Single-use token enforcement.
    authenticator: SubmissionAuthenticator,
    /// Temporal policy on submitted key dates.
    validator: SubmissionValidator,
    /// Origin tag recorded with each stored row.
    app_source: AppSource,
}

impl ExposurePublishingService {
    /// Creates a service from its collaborators.
    #[must_use]
    pub const fn new(
        store: SharedExposedKeyStore,
        authenticator: SubmissionAuthenticator,
        validator: SubmissionValidator,
        app_source: AppSource,
    ) -> Self {
        Self {
            store,
            authenticator,
            validator,
            app_source,
        }
    }

    /// Runs the submission pipeline for one authenticated request.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Unauthorized`] on token failure before any
    /// storage access, [`PublishError::BadRequest`] on temporal-policy
    /// violation, and [`PublishError::StorageUnavailable`] when the upsert
    /// cannot be committed. On a storage failure after a real token was
    /// consumed the consumption is released so the same token can retry.
    pub fn submit(
        &self,
        key: &ExposedKey,
        claims: &TokenClaims,
        now: UnixMillis,
    ) -> Result<SubmissionOutcome, PublishError> {
        let auth = self.authenticator.authenticate(claims, now).map_err(map_auth_error)?;
        if let Err(err) = self.validator.validate(key.day, now) {
            return Err(PublishError::BadRequest(err.to_string()));
        }
        if auth.fake {
            return Ok(SubmissionOutcome::Decoy);
        }
        match self.store.upsert(key, &self.app_source) {
            Ok(()) => Ok(SubmissionOutcome::Stored),
            Err(StoreError::Invalid(message)) => Err(PublishError::BadRequest(message)),
            Err(StoreError::Unavailable(message)) => {
                // Undo the consumption so a legitimate retry can succeed; the
                // upsert is idempotent either way.
                let _ = self.authenticator.release(&claims.subject);
                Err(PublishError::StorageUnavailable(message))
            }
        }
    }

    /// Runs a fingerprint-gated read of a day bucket.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::StorageUnavailable`] when the store cannot be
    /// reached.
    pub fn day_read(
        &self,
        day: KeyDay,
        client_validator: Option<&str>,
    ) -> Result<DayRead, PublishError> {
        let max_id = self.store.max_id_for_day(day).map_err(map_store_error)?;
        let etag = compute_etag(max_id, FINGERPRINT_CONTENT_TYPE);
        match ConditionalCacheGate::decide(client_validator, &etag) {
            CacheDecision::NotModified => Ok(DayRead::NotModified {
                etag,
            }),
            CacheDecision::Fresh => {
                let keys = self.store.sorted_for_day(day).map_err(map_store_error)?;
                Ok(DayRead::Fresh {
                    etag,
                    keys,
                })
            }
        }
    }
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps authenticator failures onto the pipeline taxonomy.
fn map_auth_error(err: AuthError) -> PublishError {
    match err {
        AuthError::Expired | AuthError::MissingSubject | AuthError::Replayed => {
            PublishError::Unauthorized(err.to_string())
        }
        AuthError::Registry(inner) => PublishError::StorageUnavailable(inner.to_string()),
    }
}

/// Maps store failures onto the pipeline taxonomy for the read path.
fn map_store_error(err: StoreError) -> PublishError {
    match err {
        StoreError::Unavailable(message) | StoreError::Invalid(message) => {
            PublishError::StorageUnavailable(message)
        }
    }
}
