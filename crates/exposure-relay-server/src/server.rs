// crates/exposure-relay-server/src/server.rs
// ============================================================================
// Module: Exposure Relay HTTP Server
// Description: Router, handlers, and wiring for the publishing pipeline.
// Purpose: Serve the liveness, submission, and day-bucket read endpoints.
// Dependencies: exposure-relay-core, exposure-relay-config, axum, tokio
// ============================================================================

//! ## Overview
//! The server exposes three endpoints: `GET /v1` (liveness),
//! `POST /v1/exposed` (authenticated submission), and
//! `GET /v1/exposed/{dayMillis}` (conditionally-cached day read). Handlers
//! translate wire failures into the pipeline's error taxonomy — 401 for
//! authentication and replay, 400 for malformed or out-of-window payloads,
//! 503 for storage failures that are safe to retry. Wall-clock time is read
//! here, at the boundary, and passed into the core explicitly.
//!
//! Security posture: all request inputs are untrusted; handlers validate
//! before any pipeline call and never echo payloads back to the client.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::ETAG;
use axum::http::header::IF_NONE_MATCH;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use exposure_relay_config::AuditSinkKind;
use exposure_relay_config::ExposureRelayConfig;
use exposure_relay_config::StoreType;
use exposure_relay_core::AppSource;
use exposure_relay_core::DayRead;
use exposure_relay_core::ExposurePublishingService;
use exposure_relay_core::InMemoryExposedKeyStore;
use exposure_relay_core::InMemoryReplayRegistry;
use exposure_relay_core::KeyDay;
use exposure_relay_core::PublishError;
use exposure_relay_core::SharedExposedKeyStore;
use exposure_relay_core::SharedReplayRegistry;
use exposure_relay_core::SubmissionAuthenticator;
use exposure_relay_core::SubmissionOutcome;
use exposure_relay_core::SubmissionValidator;
use exposure_relay_core::UnixMillis;
use exposure_relay_store_sqlite::SqliteExposedKeyStore;
use exposure_relay_store_sqlite::SqliteReplayRegistry;
use thiserror::Error;

use crate::audit::DayReadAuditEvent;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::RelayAuditSink;
use crate::audit::StderrAuditSink;
use crate::audit::SubmissionAuditEvent;
use crate::auth::ClaimsVerifier;
use crate::auth::GatewayClaimsVerifier;
use crate::auth::parse_bearer_token;
use crate::payload::build_overview;
use crate::payload::decode_submission;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Liveness response body.
const HELLO_BODY: &str = "Hello from Exposure Relay";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server construction and serving errors.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Configuration is invalid for serving.
    #[error("server config error: {0}")]
    Config(String),
    /// Storage backend failed to open.
    #[error("server store error: {0}")]
    Store(String),
    /// Transport-level failure (bind or serve).
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared state for HTTP handlers.
pub struct ServerState {
    /// Publishing pipeline.
    pub service: ExposurePublishingService,
    /// Claims verification seam.
    pub verifier: Arc<dyn ClaimsVerifier>,
    /// Audit event sink.
    pub audit: Arc<dyn RelayAuditSink>,
    /// Maximum allowed request body size.
    pub max_body_bytes: usize,
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Exposure Relay HTTP server instance.
pub struct RelayServer {
    /// Validated deployment configuration.
    config: ExposureRelayConfig,
}

impl RelayServer {
    /// Builds a new server from configuration.
    #[must_use]
    pub const fn new(config: ExposureRelayConfig) -> Self {
        Self {
            config,
        }
    }

    /// Runs the server until the process is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError`] when wiring, binding, or serving fails.
    pub async fn serve(self) -> Result<(), ServeError> {
        let addr: SocketAddr = self
            .config
            .server
            .bind
            .parse()
            .map_err(|_| ServeError::Config("invalid bind address".to_string()))?;
        let state = Arc::new(build_server_state(&self.config)?);
        let app = build_router(state);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ServeError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ServeError::Transport("http server failed".to_string()))
    }
}

/// Builds the axum router over the shared state.
#[must_use]
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/v1", get(handle_hello))
        .route("/v1/exposed", post(handle_submit))
        .route("/v1/exposed/{day_millis}", get(handle_day))
        .with_state(state)
}

/// Wires the pipeline, stores, and audit sink from configuration.
///
/// # Errors
///
/// Returns [`ServeError`] when a configured backend cannot be opened.
pub fn build_server_state(config: &ExposureRelayConfig) -> Result<ServerState, ServeError> {
    let (store, registry) = build_storage(config)?;
    let service = ExposurePublishingService::new(
        store,
        SubmissionAuthenticator::new(registry),
        SubmissionValidator::new(config.policy.retention_days),
        AppSource::new(config.server.app_source.clone()),
    );
    Ok(ServerState {
        service,
        verifier: Arc::new(GatewayClaimsVerifier::new()),
        audit: build_audit_sink(config)?,
        max_body_bytes: config.server.max_body_bytes,
    })
}

/// Opens the configured store and replay registry backends.
fn build_storage(
    config: &ExposureRelayConfig,
) -> Result<(SharedExposedKeyStore, SharedReplayRegistry), ServeError> {
    match config.store.store_type {
        StoreType::Memory => Ok((
            SharedExposedKeyStore::from_store(InMemoryExposedKeyStore::new()),
            SharedReplayRegistry::from_registry(InMemoryReplayRegistry::new()),
        )),
        StoreType::Sqlite => {
            let sqlite = config
                .store
                .sqlite
                .as_ref()
                .ok_or_else(|| ServeError::Config("missing [store.sqlite] section".to_string()))?;
            let store = SqliteExposedKeyStore::new(sqlite)
                .map_err(|err| ServeError::Store(err.to_string()))?;
            let registry = SqliteReplayRegistry::new(sqlite)
                .map_err(|err| ServeError::Store(err.to_string()))?;
            Ok((
                SharedExposedKeyStore::from_store(store),
                SharedReplayRegistry::from_registry(registry),
            ))
        }
    }
}

/// Builds the configured audit sink.
fn build_audit_sink(config: &ExposureRelayConfig) -> Result<Arc<dyn RelayAuditSink>, ServeError> {
    match config.audit.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config
                .audit
                .path
                .as_ref()
                .ok_or_else(|| ServeError::Config("missing audit.path".to_string()))?;
            let sink =
                FileAuditSink::open(path).map_err(|err| ServeError::Config(err.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles the liveness endpoint.
async fn handle_hello() -> &'static str {
    HELLO_BODY
}

/// Handles an exposed-key submission.
async fn handle_submit(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> StatusCode {
    let peer_ip = Some(peer.ip().to_string());
    if bytes.len() > state.max_body_bytes {
        state.audit.record_submission(&SubmissionAuditEvent::rejected(
            peer_ip,
            StatusCode::PAYLOAD_TOO_LARGE.as_u16(),
            "body exceeds size limit",
        ));
        return StatusCode::PAYLOAD_TOO_LARGE;
    }
    let auth_header = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    let claims = match parse_bearer_token(auth_header)
        .and_then(|token| state.verifier.verify(&token))
    {
        Ok(claims) => claims,
        Err(err) => {
            state.audit.record_submission(&SubmissionAuditEvent::rejected(
                peer_ip,
                StatusCode::UNAUTHORIZED.as_u16(),
                err.to_string(),
            ));
            return StatusCode::UNAUTHORIZED;
        }
    };
    let parsed = match decode_submission(&bytes) {
        Ok(parsed) => parsed,
        Err(err) => {
            state.audit.record_submission(&SubmissionAuditEvent::rejected(
                peer_ip,
                StatusCode::BAD_REQUEST.as_u16(),
                err.to_string(),
            ));
            return StatusCode::BAD_REQUEST;
        }
    };
    match state.service.submit(&parsed.key, &claims, now_unix_millis()) {
        Ok(outcome) => {
            let decoy = outcome == SubmissionOutcome::Decoy;
            state.audit.record_submission(&SubmissionAuditEvent::accepted(peer_ip, decoy));
            StatusCode::OK
        }
        Err(err) => {
            let status = status_for(&err);
            state.audit.record_submission(&SubmissionAuditEvent::rejected(
                peer_ip,
                status.as_u16(),
                err.to_string(),
            ));
            status
        }
    }
}

/// Handles a conditionally-cached day-bucket read.
async fn handle_day(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(day_millis): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let peer_ip = Some(peer.ip().to_string());
    let Ok(day) = KeyDay::from_unix_millis(day_millis) else {
        state.audit.record_day_read(&DayReadAuditEvent::new(
            peer_ip,
            day_millis.to_string(),
            false,
            None,
            StatusCode::BAD_REQUEST.as_u16(),
        ));
        return StatusCode::BAD_REQUEST.into_response();
    };
    let client_validator = headers.get(IF_NONE_MATCH).and_then(|value| value.to_str().ok());
    match state.service.day_read(day, client_validator) {
        Ok(DayRead::NotModified {
            etag,
        }) => {
            state.audit.record_day_read(&DayReadAuditEvent::new(
                peer_ip,
                day.to_string(),
                true,
                None,
                StatusCode::NOT_MODIFIED.as_u16(),
            ));
            (StatusCode::NOT_MODIFIED, [(ETAG, etag)]).into_response()
        }
        Ok(DayRead::Fresh {
            etag,
            keys,
        }) => {
            state.audit.record_day_read(&DayReadAuditEvent::new(
                peer_ip,
                day.to_string(),
                false,
                Some(keys.len()),
                StatusCode::OK.as_u16(),
            ));
            (StatusCode::OK, [(ETAG, etag)], axum::Json(build_overview(&keys))).into_response()
        }
        Err(err) => {
            let status = status_for(&err);
            state.audit.record_day_read(&DayReadAuditEvent::new(
                peer_ip,
                day.to_string(),
                false,
                None,
                status.as_u16(),
            ));
            status.into_response()
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps pipeline errors onto HTTP status codes.
fn status_for(err: &PublishError) -> StatusCode {
    match err {
        PublishError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        PublishError::BadRequest(_) => StatusCode::BAD_REQUEST,
        PublishError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Reads the boundary wall clock as unix milliseconds.
fn now_unix_millis() -> UnixMillis {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    UnixMillis::new(i64::try_from(millis).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests;
