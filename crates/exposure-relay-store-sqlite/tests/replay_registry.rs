// crates/exposure-relay-store-sqlite/tests/replay_registry.rs
// ============================================================================
// Module: SQLite Replay Registry Tests
// Description: Validate durable single-use token consumption.
// Purpose: Ensure exactly-once semantics, TTL purge, and shared-file use.
// Dependencies: exposure-relay-store-sqlite, exposure-relay-core, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed replay registry: exactly-once
//! consumption under concurrency, release for retry, expiry-based purging,
//! and colocation with the exposed-key store in one database file.

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
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;

use exposure_relay_core::AppSource;
use exposure_relay_core::ExposedKey;
use exposure_relay_core::ExposedKeyStore;
use exposure_relay_core::KeyDay;
use exposure_relay_core::ReplayRegistry;
use exposure_relay_core::TokenUse;
use exposure_relay_core::UnixMillis;
use exposure_relay_store_sqlite::SqliteExposedKeyStore;
use exposure_relay_store_sqlite::SqliteReplayRegistry;
use exposure_relay_store_sqlite::SqliteStoreConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed reference instant in epoch milliseconds.
const NOW_MILLIS: i64 = 1_600_000_000_000;

/// Returns the fixed current instant.
fn now() -> UnixMillis {
    UnixMillis::new(NOW_MILLIS)
}

/// Returns a token expiry five minutes after the fixed now.
fn expiry() -> UnixMillis {
    UnixMillis::new(NOW_MILLIS + 300_000)
}

/// Opens a registry on a file inside the temp dir.
fn registry_for(temp: &TempDir) -> SqliteReplayRegistry {
    let config = SqliteStoreConfig::for_path(temp.path().join("relay.sqlite"));
    SqliteReplayRegistry::new(&config).expect("registry init")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn first_use_then_replay() {
    let temp = TempDir::new().unwrap();
    let registry = registry_for(&temp);
    assert_eq!(registry.consume("s-1", expiry(), now()).unwrap(), TokenUse::FirstUse);
    assert_eq!(registry.consume("s-1", expiry(), now()).unwrap(), TokenUse::AlreadyConsumed);
}

#[test]
fn consumption_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("relay.sqlite");
    {
        let registry =
            SqliteReplayRegistry::new(&SqliteStoreConfig::for_path(&path)).expect("registry init");
        registry.consume("s-1", expiry(), now()).unwrap();
    }
    let reopened =
        SqliteReplayRegistry::new(&SqliteStoreConfig::for_path(&path)).expect("registry reopen");
    assert_eq!(reopened.consume("s-1", expiry(), now()).unwrap(), TokenUse::AlreadyConsumed);
}

#[test]
fn concurrent_consumption_has_exactly_one_winner() {
    let temp = TempDir::new().unwrap();
    let registry = registry_for(&temp);
    let mut handles = Vec::new();
    for _ in 0 .. 8 {
        let registry = registry.clone();
        handles.push(thread::spawn(move || {
            registry
                .consume("contended", UnixMillis::new(NOW_MILLIS + 300_000), UnixMillis::new(NOW_MILLIS))
                .unwrap()
        }));
    }
    let outcomes: Vec<TokenUse> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = outcomes.iter().filter(|o| **o == TokenUse::FirstUse).count();
    assert_eq!(winners, 1);
}

#[test]
fn release_permits_reconsumption() {
    let temp = TempDir::new().unwrap();
    let registry = registry_for(&temp);
    registry.consume("s-1", expiry(), now()).unwrap();
    registry.release("s-1").unwrap();
    assert_eq!(registry.consume("s-1", expiry(), now()).unwrap(), TokenUse::FirstUse);
}

#[test]
fn expired_rows_are_purged_on_consume() {
    let temp = TempDir::new().unwrap();
    let registry = registry_for(&temp);
    registry.consume("s-1", expiry(), now()).unwrap();

    // Beyond the original validity window the subject can be recorded again.
    let later = UnixMillis::new(NOW_MILLIS + 600_000);
    let later_expiry = UnixMillis::new(NOW_MILLIS + 900_000);
    assert_eq!(registry.consume("s-1", later_expiry, later).unwrap(), TokenUse::FirstUse);
}

#[test]
fn registry_and_key_store_share_one_database_file() {
    let temp = TempDir::new().unwrap();
    let config = SqliteStoreConfig::for_path(temp.path().join("relay.sqlite"));
    let store = SqliteExposedKeyStore::new(&config).expect("store init");
    let registry = SqliteReplayRegistry::new(&config).expect("registry init");

    registry.consume("s-1", expiry(), now()).unwrap();
    let day = KeyDay::from_unix_millis(NOW_MILLIS).unwrap();
    store.upsert(&ExposedKey::new("a2V5MQ==", day), &AppSource::new("org.example.tracing")).unwrap();

    assert_eq!(registry.consume("s-1", expiry(), now()).unwrap(), TokenUse::AlreadyConsumed);
    assert_eq!(store.sorted_for_day(day).unwrap().len(), 1);
}
