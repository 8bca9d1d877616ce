// crates/exposure-relay-core/src/runtime/authenticator.rs
// ============================================================================
// Module: Exposure Relay Submission Authenticator
// Description: Single-use token enforcement with a fake/decoy bypass lane.
// Purpose: Provide fail-closed replay protection for key submissions.
// Dependencies: crate::{core, interfaces}, thiserror
// ============================================================================

//! ## Overview
//! A real token authorizes at most one successful submission: the first use
//! records the subject in the replay registry, every later use is rejected.
//! Fake tokens are accepted without any bookkeeping so that decoy traffic is
//! indistinguishable from real submissions on the wire, but expiry is
//! enforced for every token, fake included.
//!
//! Security posture: tokens are attacker-supplied; all decisions fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::TokenClaims;
use crate::core::UnixMillis;
use crate::interfaces::ReplayRegistry;
use crate::interfaces::ReplayRegistryError;
use crate::interfaces::TokenUse;
use crate::runtime::store::SharedReplayRegistry;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication failures for submission tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token expiry is at or before the current time.
    #[error("token expired")]
    Expired,
    /// Token subject claim is missing or empty.
    #[error("token subject missing")]
    MissingSubject,
    /// Non-fake token was already consumed by a prior submission.
    #[error("token already used")]
    Replayed,
    /// Replay registry could not be reached; the caller may retry.
    #[error(transparent)]
    Registry(#[from] ReplayRegistryError),
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Result of a successful authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Whether the token belongs to the fake/decoy lane.
    pub fake: bool,
}

// ============================================================================
// SECTION: Authenticator
// ============================================================================

/// Enforces single-use token semantics for key submissions.
///
/// # Invariants
/// - Expiry is checked before the fake flag; an expired fake token is
///   rejected.
/// - Fake tokens never touch the replay registry and are never recorded.
pub struct SubmissionAuthenticator {
    /// Durable record of consumed token subjects.
    registry: SharedReplayRegistry,
}

impl SubmissionAuthenticator {
    /// Creates an authenticator backed by the given replay registry.
    #[must_use]
    pub const fn new(registry: SharedReplayRegistry) -> Self {
        Self {
            registry,
        }
    }

    /// Authenticates a decoded claim set at the given instant.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the token is expired, replayed, malformed,
    /// or the registry is unreachable.
    pub fn authenticate(
        &self,
        claims: &TokenClaims,
        now: UnixMillis,
    ) -> Result<AuthOutcome, AuthError> {
        let expires_at =
            UnixMillis::from_unix_seconds(claims.expires_at_secs).ok_or(AuthError::Expired)?;
        if expires_at <= now {
            return Err(AuthError::Expired);
        }
        if claims.fake {
            return Ok(AuthOutcome {
                fake: true,
            });
        }
        if claims.subject.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        match self.registry.consume(&claims.subject, expires_at, now)? {
            TokenUse::FirstUse => Ok(AuthOutcome {
                fake: false,
            }),
            TokenUse::AlreadyConsumed => Err(AuthError::Replayed),
        }
    }

    /// Removes the consumption record for a subject after a downstream
    /// storage failure, so the same token can retry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Registry`] when the registry is unreachable.
    pub fn release(&self, subject: &str) -> Result<(), AuthError> {
        self.registry.release(subject).map_err(AuthError::from)
    }
}
