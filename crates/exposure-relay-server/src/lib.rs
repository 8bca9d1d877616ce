// crates/exposure-relay-server/src/lib.rs
// ============================================================================
// Module: Exposure Relay Server Library
// Description: HTTP surface for the exposure publishing pipeline.
// Purpose: Expose the router, auth seam, codecs, and audit sinks.
// Dependencies: crate::{audit, auth, payload, server}
// ============================================================================

//! ## Overview
//! The server crate exposes the exposure publishing pipeline over HTTP:
//! a liveness endpoint, the authenticated submission endpoint, and the
//! conditionally-cached day-bucket read endpoint. Requests are handled
//! task-per-request; all shared mutation happens inside the storage layer.
//! Security posture: every request input is untrusted and validated at the
//! boundary before it reaches the core pipeline.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod payload;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::DayReadAuditEvent;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RelayAuditSink;
pub use audit::StderrAuditSink;
pub use audit::SubmissionAuditEvent;
pub use auth::AuthTokenError;
pub use auth::ClaimsVerifier;
pub use auth::GatewayClaimsVerifier;
pub use auth::parse_bearer_token;
pub use payload::PayloadError;
pub use server::RelayServer;
pub use server::ServeError;
pub use server::ServerState;
pub use server::build_router;
