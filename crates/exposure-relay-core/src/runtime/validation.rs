// crates/exposure-relay-core/src/runtime/validation.rs
// ============================================================================
// Module: Exposure Relay Submission Validation
// Description: Temporal policy for submitted key dates.
// Purpose: Reject future-dated and stale key submissions before storage.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Submitted key dates must fall inside a bounded window: never after the
//! current UTC day, and never older than the configured retention window.
//! The boundary day itself is accepted: a key dated exactly
//! `retention_days` before today passes. Validation is stateless and pure;
//! it never touches storage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::DayError;
use crate::core::KeyDay;
use crate::core::UnixMillis;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default retention window for submitted key dates, in days.
pub const DEFAULT_RETENTION_DAYS: u16 = 21;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Temporal-policy violations for submitted key dates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Key date is after the current UTC day.
    #[error("key date {day} is in the future")]
    FutureKeyDate {
        /// Rejected day bucket.
        day: KeyDay,
    },
    /// Key date is older than the retention window.
    #[error("key date {day} is older than {retention_days} days")]
    StaleKeyDate {
        /// Rejected day bucket.
        day: KeyDay,
        /// Configured retention window in days.
        retention_days: u16,
    },
    /// Current time does not map to a representable calendar day.
    #[error(transparent)]
    InvalidNow(#[from] DayError),
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Stateless temporal-policy validator for key submissions.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionValidator {
    /// Maximum accepted key-date age in whole days.
    retention_days: u16,
}

impl Default for SubmissionValidator {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_DAYS)
    }
}

impl SubmissionValidator {
    /// Creates a validator with the given retention window.
    #[must_use]
    pub const fn new(retention_days: u16) -> Self {
        Self {
            retention_days,
        }
    }

    /// Returns the configured retention window in days.
    #[must_use]
    pub const fn retention_days(&self) -> u16 {
        self.retention_days
    }

    /// Validates a submitted key date against the current instant.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the date is in the future or older
    /// than the retention window.
    pub fn validate(&self, day: KeyDay, now: UnixMillis) -> Result<(), ValidationError> {
        let today = KeyDay::from_timestamp(now)?;
        if day > today {
            return Err(ValidationError::FutureKeyDate {
                day,
            });
        }
        if day.days_until(today) > i64::from(self.retention_days) {
            return Err(ValidationError::StaleKeyDate {
                day,
                retention_days: self.retention_days,
            });
        }
        Ok(())
    }
}
