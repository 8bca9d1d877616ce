// crates/exposure-relay-store-sqlite/src/lib.rs
// ============================================================================
// Module: Exposure Relay SQLite Store Library
// Description: Durable exposed-key store and replay registry backed by SQLite.
// Purpose: Expose the SQLite implementations and their configuration.
// Dependencies: crate::{replay, store}
// ============================================================================

//! ## Overview
//! SQLite-backed implementations of the core storage seams: the
//! day-partitioned exposed-key store (atomic conditional insert, identity
//! column cursor) and the durable single-use token registry. Both open the
//! same database format so a deployment can colocate them in one file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod replay;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use replay::SqliteReplayRegistry;
pub use store::MAX_PAYLOAD_BYTES;
pub use store::SqliteExposedKeyStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
