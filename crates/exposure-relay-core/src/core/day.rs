// crates/exposure-relay-core/src/core/day.rs
// ============================================================================
// Module: Exposure Relay Day Buckets
// Description: Canonical UTC calendar-day bucket and millisecond timestamps.
// Purpose: Provide deterministic day truncation for partitioning and policy.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Exposed keys are partitioned by the UTC calendar day they belong to.
//! [`KeyDay`] enforces the mandatory truncation from client-supplied epoch
//! milliseconds to day granularity; two timestamps within the same UTC day
//! always map to the same bucket. The core never reads wall-clock time
//! directly; hosts supply [`UnixMillis`] values explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::Date;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when converting timestamps into day buckets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DayError {
    /// Timestamp is outside the representable calendar range.
    #[error("timestamp out of calendar range: {0}")]
    OutOfRange(i64),
}

// ============================================================================
// SECTION: Millisecond Timestamps
// ============================================================================

/// Unix epoch milliseconds supplied explicitly by the host.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads
///   wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixMillis(i64);

impl UnixMillis {
    /// Creates a timestamp from raw epoch milliseconds.
    #[must_use]
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// Creates a timestamp from epoch seconds (returns `None` on overflow).
    #[must_use]
    pub const fn from_unix_seconds(seconds: i64) -> Option<Self> {
        match seconds.checked_mul(1_000) {
            Some(millis) => Some(Self(millis)),
            None => None,
        }
    }

    /// Returns the raw epoch millisecond value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UnixMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Day Buckets
// ============================================================================

/// UTC calendar-day bucket for exposed keys.
///
/// # Invariants
/// - Always represents a whole UTC day; construction truncates sub-day
///   precision.
/// - Ordering follows calendar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyDay(Date);

impl KeyDay {
    /// Creates a day bucket by truncating epoch milliseconds to the UTC day.
    ///
    /// # Errors
    ///
    /// Returns [`DayError::OutOfRange`] when the timestamp does not map to a
    /// representable calendar date.
    pub fn from_unix_millis(millis: i64) -> Result<Self, DayError> {
        let seconds = millis.div_euclid(1_000);
        let moment = OffsetDateTime::from_unix_timestamp(seconds)
            .map_err(|_| DayError::OutOfRange(millis))?;
        Ok(Self(moment.date()))
    }

    /// Creates a day bucket from an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DayError::OutOfRange`] when the timestamp does not map to a
    /// representable calendar date.
    pub fn from_timestamp(at: UnixMillis) -> Result<Self, DayError> {
        Self::from_unix_millis(at.get())
    }

    /// Returns the epoch milliseconds at the start of the day (UTC midnight).
    #[must_use]
    pub fn start_unix_millis(self) -> i64 {
        self.0.midnight().assume_utc().unix_timestamp().saturating_mul(1_000)
    }

    /// Returns the number of whole calendar days from `self` to `other`.
    ///
    /// Positive when `other` is later than `self`.
    #[must_use]
    pub fn days_until(self, other: Self) -> i64 {
        (other.0 - self.0).whole_days()
    }
}

impl fmt::Display for KeyDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
