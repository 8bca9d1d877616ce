// crates/exposure-relay-core/src/core/model.rs
// ============================================================================
// Module: Exposure Relay Key Model
// Description: Persisted exposed-key rows and origin identifiers.
// Purpose: Provide the canonical row shape shared by stores and the pipeline.
// Dependencies: crate::core::day, serde
// ============================================================================

//! ## Overview
//! An exposed key is a rotating identifier published by a diagnosed client,
//! bucketed by the UTC calendar day it belongs to. The key payload is opaque
//! to the server: it is validated as base64 at the HTTP boundary and stored
//! verbatim. Row identifiers are assigned by the store and are never
//! client-controlled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::day::KeyDay;

// ============================================================================
// SECTION: Origin Identifiers
// ============================================================================

/// Origin tag identifying the client application family of a submission.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this
///   type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppSource(String);

impl AppSource {
    /// Creates a new origin tag.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// Returns the origin tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AppSource {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AppSource {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Exposed Keys
// ============================================================================

/// Exposed key row bucketed by UTC calendar day.
///
/// # Invariants
/// - `id` is store-assigned and monotonically increasing within a day
///   bucket; it is `None` until the row has been persisted.
/// - `(payload, day)` is unique within the store; resubmission is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedKey {
    /// Store-assigned row identifier (internal only).
    pub id: Option<i64>,
    /// Opaque base64 key payload as supplied by the client.
    pub payload: String,
    /// UTC day bucket the key belongs to.
    pub day: KeyDay,
}

impl ExposedKey {
    /// Creates an unpersisted exposed key for the given day bucket.
    #[must_use]
    pub fn new(payload: impl Into<String>, day: KeyDay) -> Self {
        Self {
            id: None,
            payload: payload.into(),
            day,
        }
    }
}
