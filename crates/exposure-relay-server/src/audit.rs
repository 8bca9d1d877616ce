// crates/exposure-relay-server/src/audit.rs
// ============================================================================
// Module: Exposure Relay Audit Logging
// Description: Structured audit events for submission and read handling.
// Purpose: Emit redacted audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for request logging.
//! It is intentionally lightweight so deployments can route events to their
//! preferred logging pipeline without redesign. Events carry outcome labels
//! and day buckets only — never key payloads or token subjects, since the
//! whole point of the protocol is that submissions stay unlinkable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Submission audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Outcome label (`accepted` or `rejected`).
    pub outcome: &'static str,
    /// Whether the submission rode the decoy lane.
    pub decoy: bool,
    /// HTTP status code returned.
    pub status: u16,
    /// Failure reason label (for rejections).
    pub reason: Option<String>,
}

impl SubmissionAuditEvent {
    /// Builds an accepted-submission event.
    #[must_use]
    pub fn accepted(peer_ip: Option<String>, decoy: bool) -> Self {
        Self {
            event: "exposure_submission",
            timestamp_ms: unix_millis(),
            peer_ip,
            outcome: "accepted",
            decoy,
            status: 200,
            reason: None,
        }
    }

    /// Builds a rejected-submission event.
    #[must_use]
    pub fn rejected(peer_ip: Option<String>, status: u16, reason: impl Into<String>) -> Self {
        Self {
            event: "exposure_submission",
            timestamp_ms: unix_millis(),
            peer_ip,
            outcome: "rejected",
            decoy: false,
            status,
            reason: Some(reason.into()),
        }
    }
}

/// Day-bucket read audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct DayReadAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Day bucket label (ISO date).
    pub day: String,
    /// Whether the conditional gate short-circuited the body.
    pub cache_hit: bool,
    /// Number of rows returned (absent on cache hits and failures).
    pub row_count: Option<usize>,
    /// HTTP status code returned.
    pub status: u16,
}

impl DayReadAuditEvent {
    /// Builds a day-read event.
    #[must_use]
    pub fn new(
        peer_ip: Option<String>,
        day: String,
        cache_hit: bool,
        row_count: Option<usize>,
        status: u16,
    ) -> Self {
        Self {
            event: "exposure_day_read",
            timestamp_ms: unix_millis(),
            peer_ip,
            day,
            cache_hit,
            row_count,
            status,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for relay request events.
pub trait RelayAuditSink: Send + Sync {
    /// Records a submission event.
    fn record_submission(&self, event: &SubmissionAuditEvent);

    /// Records a day-read event.
    fn record_day_read(&self, event: &DayReadAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl RelayAuditSink for StderrAuditSink {
    fn record_submission(&self, event: &SubmissionAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_day_read(&self, event: &DayReadAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// Append-mode log file guarded by a mutex.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens (or creates) the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, std::io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RelayAuditSink for FileAuditSink {
    fn record_submission(&self, event: &SubmissionAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
        }
    }

    fn record_day_read(&self, event: &DayReadAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
        }
    }
}

/// No-op audit sink for tests.
pub struct NoopAuditSink;

impl RelayAuditSink for NoopAuditSink {
    fn record_submission(&self, _event: &SubmissionAuditEvent) {}

    fn record_day_read(&self, _event: &DayReadAuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current unix time in milliseconds.
fn unix_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
