// crates/exposure-relay-server/src/server/tests.rs
// ============================================================================
// Module: Relay Server Unit Tests
// Description: Handler-level tests for submission and day-read endpoints.
// Purpose: Validate status mapping and conditional caching with fixtures.
// Dependencies: exposure-relay-server
// ============================================================================

//! ## Overview
//! Exercises the HTTP handlers directly with in-memory fixtures: status-code
//! mapping for the error taxonomy, the decoy lane, and the ETag round trip.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

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
    reason = "Test-only assertions and fixtures are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::body::Bytes;
use axum::body::to_bytes;
use axum::extract::ConnectInfo;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::ETAG;
use axum::http::header::IF_NONE_MATCH;
use exposure_relay_config::ExposureRelayConfig;
use exposure_relay_core::TokenClaims;
use serde_json::json;

use super::HELLO_BODY;
use super::ServerState;
use super::build_server_state;
use super::handle_day;
use super::handle_hello;
use super::handle_submit;
use crate::auth::encode_gateway_token;
use crate::payload::DayOverviewBody;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds an in-memory server state with a silent audit sink.
fn test_state() -> Arc<ServerState> {
    let config = ExposureRelayConfig::from_toml(
        "[store]\ntype = \"memory\"\n\n[audit]\nsink = \"none\"\n",
    )
    .unwrap();
    Arc::new(build_server_state(&config).unwrap())
}

/// Returns a fixed test peer address.
fn peer() -> ConnectInfo<SocketAddr> {
    ConnectInfo("127.0.0.1:40000".parse().unwrap())
}

/// Returns the current unix time in seconds.
fn now_secs() -> i64 {
    i64::try_from(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs())
        .unwrap_or(i64::MAX)
}

/// Returns the current unix time in milliseconds.
fn now_millis() -> i64 {
    now_secs() * 1_000
}

/// Builds an Authorization header map for the given claims.
fn auth_headers(claims: &TokenClaims) -> HeaderMap {
    let token = encode_gateway_token(claims).unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers
}

/// Builds a submission body for the given key and date.
fn submission_body(key: &str, key_date: i64, is_fake: u8) -> Bytes {
    Bytes::from(
        json!({
            "key": key,
            "keyDate": key_date,
            "isFake": is_fake,
            "authData": {}
        })
        .to_string(),
    )
}

/// Submits a key with a fresh valid token and asserts acceptance.
async fn submit_ok(state: &Arc<ServerState>, subject: &str, key: &str) {
    let claims = TokenClaims::new(subject, now_secs() + 300);
    let status = handle_submit(
        State(Arc::clone(state)),
        peer(),
        auth_headers(&claims),
        submission_body(key, now_millis(), 0),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// SECTION: Liveness
// ============================================================================

#[tokio::test]
async fn hello_returns_liveness_body() {
    assert_eq!(handle_hello().await, HELLO_BODY);
}

// ============================================================================
// SECTION: Submission Endpoint
// ============================================================================

#[tokio::test]
async fn valid_submission_is_accepted() {
    let state = test_state();
    submit_ok(&state, "s-1", "dGVzdA==").await;
}

#[tokio::test]
async fn missing_authorization_is_unauthorized() {
    let state = test_state();
    let status = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        HeaderMap::new(),
        submission_body("dGVzdA==", now_millis(), 0),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reused_token_is_unauthorized() {
    let state = test_state();
    let claims = TokenClaims::new("s-1", now_secs() + 300);
    let first = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        auth_headers(&claims),
        submission_body("dGVzdA==", now_millis(), 0),
    )
    .await;
    assert_eq!(first, StatusCode::OK);
    let second = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        auth_headers(&claims),
        submission_body("dGVzdA==", now_millis(), 0),
    )
    .await;
    assert_eq!(second, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn fake_token_can_be_reused() {
    let state = test_state();
    let claims = TokenClaims::new("decoy", now_secs() + 300).into_fake();
    for _ in 0 .. 2 {
        let status = handle_submit(
            State(Arc::clone(&state)),
            peer(),
            auth_headers(&claims),
            submission_body("dGVzdA==", now_millis(), 1),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let state = test_state();
    let claims = TokenClaims::new("s-1", now_secs() - 300);
    let status = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        auth_headers(&claims),
        submission_body("dGVzdA==", now_millis(), 0),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let state = test_state();
    let claims = TokenClaims::new("s-1", now_secs() + 300);
    let status = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        auth_headers(&claims),
        Bytes::from_static(b"not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_base64_key_is_a_bad_request() {
    let state = test_state();
    let claims = TokenClaims::new("s-1", now_secs() + 300);
    let status = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        auth_headers(&claims),
        submission_body("@@not-base64@@", now_millis(), 0),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn future_key_date_is_a_bad_request() {
    let state = test_state();
    let claims = TokenClaims::new("s-1", now_secs() + 300);
    let status = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        auth_headers(&claims),
        submission_body("dGVzdA==", now_millis() + 2 * 86_400_000, 0),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stale_key_date_is_a_bad_request() {
    let state = test_state();
    let claims = TokenClaims::new("s-1", now_secs() + 300);
    let status = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        auth_headers(&claims),
        submission_body("dGVzdA==", now_millis() - 22 * 86_400_000, 0),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let state = test_state();
    let claims = TokenClaims::new("s-1", now_secs() + 300);
    let oversized = vec![b' '; state.max_body_bytes + 1];
    let status = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        auth_headers(&claims),
        Bytes::from(oversized),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

// ============================================================================
// SECTION: Day Read Endpoint
// ============================================================================

#[tokio::test]
async fn day_read_returns_body_and_etag() {
    let state = test_state();
    submit_ok(&state, "s-1", "dGVzdA==").await;

    let response =
        handle_day(State(Arc::clone(&state)), peer(), Path(now_millis()), HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response.headers().get(ETAG).cloned().unwrap();
    assert!(!etag.to_str().unwrap().is_empty());

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: DayOverviewBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.exposed.len(), 1);
    assert_eq!(body.exposed[0].key, "dGVzdA==");
}

#[tokio::test]
async fn matching_validator_returns_not_modified_with_empty_body() {
    let state = test_state();
    submit_ok(&state, "s-1", "dGVzdA==").await;

    let first =
        handle_day(State(Arc::clone(&state)), peer(), Path(now_millis()), HeaderMap::new()).await;
    let etag = first.headers().get(ETAG).cloned().unwrap();

    let mut conditional = HeaderMap::new();
    conditional.insert(IF_NONE_MATCH, etag.clone());
    let second =
        handle_day(State(Arc::clone(&state)), peer(), Path(now_millis()), conditional).await;
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(second.headers().get(ETAG), Some(&etag));
    let bytes = to_bytes(second.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn new_submission_invalidates_the_validator() {
    let state = test_state();
    submit_ok(&state, "s-1", "Zmlyc3Q=").await;

    let first =
        handle_day(State(Arc::clone(&state)), peer(), Path(now_millis()), HeaderMap::new()).await;
    let stale_etag = first.headers().get(ETAG).cloned().unwrap();

    submit_ok(&state, "s-2", "c2Vjb25k").await;

    let mut conditional = HeaderMap::new();
    conditional.insert(IF_NONE_MATCH, stale_etag.clone());
    let second =
        handle_day(State(Arc::clone(&state)), peer(), Path(now_millis()), conditional).await;
    assert_eq!(second.status(), StatusCode::OK);
    let fresh_etag = second.headers().get(ETAG).cloned().unwrap();
    assert_ne!(fresh_etag, stale_etag);

    let bytes = to_bytes(second.into_body(), usize::MAX).await.unwrap();
    let body: DayOverviewBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.exposed.len(), 2);
    assert_eq!(body.exposed[0].key, "c2Vjb25k");
}

#[tokio::test]
async fn empty_bucket_reads_ok_with_a_stable_etag() {
    let state = test_state();
    let first =
        handle_day(State(Arc::clone(&state)), peer(), Path(now_millis()), HeaderMap::new()).await;
    assert_eq!(first.status(), StatusCode::OK);
    let etag = first.headers().get(ETAG).cloned().unwrap();

    let second =
        handle_day(State(Arc::clone(&state)), peer(), Path(now_millis()), HeaderMap::new()).await;
    assert_eq!(second.headers().get(ETAG), Some(&etag));
}

#[tokio::test]
async fn decoy_submission_leaves_the_bucket_unchanged() {
    let state = test_state();
    let before =
        handle_day(State(Arc::clone(&state)), peer(), Path(now_millis()), HeaderMap::new()).await;
    let etag_before = before.headers().get(ETAG).cloned().unwrap();

    let decoy = TokenClaims::new("decoy", now_secs() + 300).into_fake();
    let status = handle_submit(
        State(Arc::clone(&state)),
        peer(),
        auth_headers(&decoy),
        submission_body("dGVzdA==", now_millis(), 1),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let after =
        handle_day(State(Arc::clone(&state)), peer(), Path(now_millis()), HeaderMap::new()).await;
    assert_eq!(after.headers().get(ETAG), Some(&etag_before));
}
