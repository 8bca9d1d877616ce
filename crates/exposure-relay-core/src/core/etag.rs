// crates/exposure-relay-core/src/core/etag.rs
// ============================================================================
// Module: Exposure Relay Dataset Fingerprints
// Description: Deterministic ETag derivation from day-bucket cursors.
// Purpose: Provide stable, collision-resistant cache validators.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! A day bucket's fingerprint is derived from its maximum row identifier and
//! the response content type. Fingerprints are pure functions of their inputs
//! with no salt, so clients can cache them across sessions and process
//! restarts. Distinct cursors must yield distinct tags: the cache gate's
//! correctness depends on no two dataset states sharing a fingerprint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Domain separator for fingerprint preimages.
const ETAG_DOMAIN: &str = "exposure-relay/day-bucket";

// ============================================================================
// SECTION: Fingerprint Derivation
// ============================================================================

/// Computes the cache validator for a dataset cursor and content type.
///
/// Deterministic across calls and process restarts; distinct seeds yield
/// distinct tags with overwhelming probability. The returned value is
/// lowercase hex with no quoting.
#[must_use]
pub fn compute_etag(seed: i64, content_type: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ETAG_DOMAIN.as_bytes());
    hasher.update(b":");
    hasher.update(seed.to_be_bytes());
    hasher.update(b":");
    hasher.update(content_type.as_bytes());
    hex_encode(&hasher.finalize())
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
