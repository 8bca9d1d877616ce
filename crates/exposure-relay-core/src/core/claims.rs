// crates/exposure-relay-core/src/core/claims.rs
// ============================================================================
// Module: Exposure Relay Token Claims
// Description: Decoded submission-token claim set consumed by the pipeline.
// Purpose: Represent already-verified claims without any crypto dependency.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Token issuance and signature verification are external collaborators; the
//! pipeline consumes a decoded, already-signature-verified claim set. The
//! subject claim keys the replay registry, the expiry bounds the token's
//! validity window, and the fake flag marks the decoy submission lane.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Decoded claim set of a submission token.
///
/// # Invariants
/// - Claims arrive signature-verified; this type performs no verification.
/// - `subject` is the stable replay-registry key for non-fake tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Stable subject identifier used as the replay-registry key.
    #[serde(rename = "sub")]
    pub subject: String,
    /// Expiry as unix epoch seconds; the token is invalid at and after this
    /// instant.
    #[serde(rename = "exp")]
    pub expires_at_secs: i64,
    /// Marks the token as belonging to the synthetic/decoy submission lane.
    #[serde(default)]
    pub fake: bool,
}

impl TokenClaims {
    /// Creates a non-fake claim set.
    #[must_use]
    pub fn new(subject: impl Into<String>, expires_at_secs: i64) -> Self {
        Self {
            subject: subject.into(),
            expires_at_secs,
            fake: false,
        }
    }

    /// Returns a copy flagged as a fake/decoy token.
    #[must_use]
    pub fn into_fake(mut self) -> Self {
        self.fake = true;
        self
    }
}
