// crates/exposure-relay-server/src/payload.rs
// ============================================================================
// Module: Exposure Relay Wire Codecs
// Description: Explicit request/response codecs for the HTTP surface.
// Purpose: Validate untrusted wire payloads before they reach the pipeline.
// Dependencies: exposure-relay-core, base64, serde, serde_json
// ============================================================================

//! ## Overview
//! Wire structs are deliberately separate from the persisted model: the
//! submission body is decoded and validated here (base64 key, day
//! truncation, flag range) and only then converted into core types. The day
//! overview response mirrors the original wire contract
//! (`{"exposed": [{"key", "keyDate"}, ...]}`).
//!
//! Security posture: bodies are attacker-supplied; decoding fails closed and
//! errors never echo the payload back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use exposure_relay_core::ExposedKey;
use exposure_relay_core::KeyDay;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted decoded key length in bytes.
const MAX_DECODED_KEY_BYTES: usize = 384;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Wire payload decoding errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Body is not a valid submission document.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

// ============================================================================
// SECTION: Submission Request
// ============================================================================

/// Raw submission body as received on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionBody {
    /// Base64 key payload.
    key: String,
    /// Key date as epoch milliseconds.
    key_date: i64,
    /// Decoy flag (0 or 1).
    #[serde(default)]
    is_fake: u8,
}

/// Validated submission decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubmission {
    /// Exposed key ready for the pipeline.
    pub key: ExposedKey,
    /// Decoy flag as asserted by the client body.
    pub client_fake_flag: bool,
}

/// Decodes and validates a submission body.
///
/// # Errors
///
/// Returns [`PayloadError`] when the JSON is malformed, the key is not valid
/// base64, the key is empty or oversized, the flag is out of range, or the
/// date does not map to a calendar day.
pub fn decode_submission(bytes: &[u8]) -> Result<ParsedSubmission, PayloadError> {
    let body: SubmissionBody = serde_json::from_slice(bytes)
        .map_err(|err| PayloadError::Malformed(format!("invalid json: {err}")))?;
    let decoded = BASE64_STANDARD
        .decode(body.key.as_bytes())
        .map_err(|_| PayloadError::Malformed("key is not valid base64".to_string()))?;
    if decoded.is_empty() {
        return Err(PayloadError::Malformed("key must not be empty".to_string()));
    }
    if decoded.len() > MAX_DECODED_KEY_BYTES {
        return Err(PayloadError::Malformed(format!(
            "key exceeds {MAX_DECODED_KEY_BYTES} bytes"
        )));
    }
    if body.is_fake > 1 {
        return Err(PayloadError::Malformed("isFake must be 0 or 1".to_string()));
    }
    let day = KeyDay::from_unix_millis(body.key_date)
        .map_err(|err| PayloadError::Malformed(err.to_string()))?;
    Ok(ParsedSubmission {
        key: ExposedKey::new(body.key, day),
        client_fake_flag: body.is_fake == 1,
    })
}

// ============================================================================
// SECTION: Day Overview Response
// ============================================================================

/// One exposed key on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExposedKeyView {
    /// Base64 key payload.
    pub key: String,
    /// Key date as epoch milliseconds at the start of the UTC day.
    pub key_date: i64,
}

/// Day-bucket overview response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayOverviewBody {
    /// Bucket rows ordered most-recently-inserted first.
    pub exposed: Vec<ExposedKeyView>,
}

/// Builds the wire overview from pipeline rows, preserving their order.
#[must_use]
pub fn build_overview(keys: &[ExposedKey]) -> DayOverviewBody {
    DayOverviewBody {
        exposed: keys
            .iter()
            .map(|key| ExposedKeyView {
                key: key.payload.clone(),
                key_date: key.day.start_unix_millis(),
            })
            .collect(),
    }
}
