// crates/exposure-relay-core/tests/cache_gate.rs
// ============================================================================
// Module: Conditional Cache Gate Tests
// Description: Verifies validator comparison semantics.
// ============================================================================
//! ## Overview
//! Pins the gate contract: exact byte equality yields `NotModified`; a
//! missing or mismatched validator yields `Fresh`.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use exposure_relay_core::CacheDecision;
use exposure_relay_core::ConditionalCacheGate;

#[test]
fn missing_validator_is_fresh() {
    assert_eq!(ConditionalCacheGate::decide(None, "abc123"), CacheDecision::Fresh);
}

#[test]
fn matching_validator_is_not_modified() {
    assert_eq!(ConditionalCacheGate::decide(Some("abc123"), "abc123"), CacheDecision::NotModified);
}

#[test]
fn mismatched_validator_is_fresh() {
    assert_eq!(ConditionalCacheGate::decide(Some("stale"), "abc123"), CacheDecision::Fresh);
}

#[test]
fn quoting_differences_do_not_match() {
    // Comparison is byte-for-byte including any quoting convention.
    assert_eq!(ConditionalCacheGate::decide(Some("\"abc123\""), "abc123"), CacheDecision::Fresh);
}

#[test]
fn empty_validator_is_fresh_against_nonempty_tag() {
    assert_eq!(ConditionalCacheGate::decide(Some(""), "abc123"), CacheDecision::Fresh);
}
