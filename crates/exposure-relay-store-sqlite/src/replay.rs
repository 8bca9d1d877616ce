// crates/exposure-relay-store-sqlite/src/replay.rs
// ============================================================================
// Module: SQLite Replay Registry
// Description: Durable single-use token registry backed by SQLite.
// Purpose: Share consumed-token state across concurrent server instances.
// Dependencies: exposure-relay-core, rusqlite
// ============================================================================

//! ## Overview
//! The replay registry records which single-use submission tokens have
//! already authorized a write. Consumption is a conditional insert on the
//! subject primary key, so concurrent submissions with the same token agree
//! on exactly one winner. Rows older than their token's validity window are
//! purged opportunistically on each consumption; the durable table can be
//! shared by multiple server instances behind a load balancer, including in
//! the same database file as the exposed-key store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use exposure_relay_core::ReplayRegistry;
use exposure_relay_core::ReplayRegistryError;
use exposure_relay_core::TokenUse;
use exposure_relay_core::UnixMillis;
use rusqlite::Connection;
use rusqlite::params;

use crate::store::SqliteStoreConfig;
use crate::store::SqliteStoreError;
use crate::store::initialize_schema;
use crate::store::open_connection;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// `SQLite`-backed replay registry.
///
/// # Invariants
/// - Consumption is atomic at the database level (conditional insert on the
///   subject primary key).
/// - Expired rows never block a consumption.
#[derive(Clone)]
pub struct SqliteReplayRegistry {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteReplayRegistry {
    /// Opens an `SQLite`-backed replay registry.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }
}

impl ReplayRegistry for SqliteReplayRegistry {
    fn consume(
        &self,
        subject: &str,
        expires_at: UnixMillis,
        now: UnixMillis,
    ) -> Result<TokenUse, ReplayRegistryError> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| ReplayRegistryError::Unavailable("registry mutex poisoned".to_string()))?;
        let tx = guard
            .transaction()
            .map_err(|err| ReplayRegistryError::Unavailable(err.to_string()))?;
        tx.execute("DELETE FROM consumed_tokens WHERE expires_at <= ?1", params![now.get()])
            .map_err(|err| ReplayRegistryError::Unavailable(err.to_string()))?;
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO consumed_tokens (subject, expires_at) VALUES (?1, ?2)",
                params![subject, expires_at.get()],
            )
            .map_err(|err| ReplayRegistryError::Unavailable(err.to_string()))?;
        tx.commit().map_err(|err| ReplayRegistryError::Unavailable(err.to_string()))?;
        if inserted == 1 {
            Ok(TokenUse::FirstUse)
        } else {
            Ok(TokenUse::AlreadyConsumed)
        }
    }

    fn release(&self, subject: &str) -> Result<(), ReplayRegistryError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| ReplayRegistryError::Unavailable("registry mutex poisoned".to_string()))?;
        guard
            .execute("DELETE FROM consumed_tokens WHERE subject = ?1", params![subject])
            .map_err(|err| ReplayRegistryError::Unavailable(err.to_string()))?;
        Ok(())
    }
}
