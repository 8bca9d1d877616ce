// crates/exposure-relay-core/src/runtime/store.rs
// ============================================================================
// Module: Exposure Relay In-Memory Stores
// Description: In-memory key store and replay registry plus shared wrappers.
// Purpose: Provide deterministic implementations without external deps.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! This module provides in-memory implementations of [`ExposedKeyStore`] and
//! [`ReplayRegistry`] for tests and single-instance deployments, plus the
//! `Arc`-backed shared wrappers the service is wired with. The in-memory
//! replay registry satisfies the durability requirement only when
//! submissions are routed to a single authoritative instance.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::AppSource;
use crate::core::ExposedKey;
use crate::core::KeyDay;
use crate::core::UnixMillis;
use crate::interfaces::ExposedKeyStore;
use crate::interfaces::ReplayRegistry;
use crate::interfaces::ReplayRegistryError;
use crate::interfaces::StoreError;
use crate::interfaces::TokenUse;

// ============================================================================
// SECTION: In-Memory Key Store
// ============================================================================

/// Stored row with its assigned identifier and origin tag.
#[derive(Debug, Clone)]
struct StoredRow {
    /// Assigned row identifier.
    id: i64,
    /// Opaque base64 key payload.
    payload: String,
    /// UTC day bucket.
    day: KeyDay,
    /// Origin tag of the submitting application family.
    app_source: AppSource,
}

/// Mutable state behind the in-memory store mutex.
#[derive(Debug, Default)]
struct KeyStoreState {
    /// Next identifier to assign (monotonically increasing).
    next_id: i64,
    /// Rows keyed by `(day, payload)` for conditional insert.
    rows: BTreeMap<(KeyDay, String), StoredRow>,
}

/// In-memory exposed-key store for tests and single-instance deployments.
#[derive(Debug, Default, Clone)]
pub struct InMemoryExposedKeyStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<KeyStoreState>>,
}

impl InMemoryExposedKeyStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the origin tag recorded for a stored `(payload, day)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the mutex is poisoned.
    pub fn app_source_for(
        &self,
        payload: &str,
        day: KeyDay,
    ) -> Result<Option<AppSource>, StoreError> {
        let guard = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("key store mutex poisoned".to_string()))?;
        Ok(guard.rows.get(&(day, payload.to_string())).map(|row| row.app_source.clone()))
    }
}

impl ExposedKeyStore for InMemoryExposedKeyStore {
    fn upsert(&self, key: &ExposedKey, app_source: &AppSource) -> Result<(), StoreError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("key store mutex poisoned".to_string()))?;
        let state = &mut *guard;
        let bucket_key = (key.day, key.payload.clone());
        if let Entry::Vacant(slot) = state.rows.entry(bucket_key) {
            state.next_id += 1;
            slot.insert(StoredRow {
                id: state.next_id,
                payload: key.payload.clone(),
                day: key.day,
                app_source: app_source.clone(),
            });
        }
        Ok(())
    }

    fn sorted_for_day(&self, day: KeyDay) -> Result<Vec<ExposedKey>, StoreError> {
        let guard = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("key store mutex poisoned".to_string()))?;
        let mut rows: Vec<&StoredRow> =
            guard.rows.values().filter(|row| row.day == day).collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(rows
            .into_iter()
            .map(|row| ExposedKey {
                id: Some(row.id),
                payload: row.payload.clone(),
                day: row.day,
            })
            .collect())
    }

    fn max_id_for_day(&self, day: KeyDay) -> Result<i64, StoreError> {
        let guard = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("key store mutex poisoned".to_string()))?;
        Ok(guard.rows.values().filter(|row| row.day == day).map(|row| row.id).max().unwrap_or(0))
    }
}

// ============================================================================
// SECTION: In-Memory Replay Registry
// ============================================================================

/// In-memory replay registry for tests and single-instance deployments.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReplayRegistry {
    /// Consumed subjects mapped to their expiry, protected by a mutex.
    consumed: Arc<Mutex<BTreeMap<String, UnixMillis>>>,
}

impl InMemoryReplayRegistry {
    /// Creates an empty in-memory registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplayRegistry for InMemoryReplayRegistry {
    fn consume(
        &self,
        subject: &str,
        expires_at: UnixMillis,
        now: UnixMillis,
    ) -> Result<TokenUse, ReplayRegistryError> {
        let mut guard = self
            .consumed
            .lock()
            .map_err(|_| ReplayRegistryError::Unavailable("registry mutex poisoned".to_string()))?;
        guard.retain(|_, entry_expiry| *entry_expiry > now);
        match guard.entry(subject.to_string()) {
            Entry::Occupied(_) => Ok(TokenUse::AlreadyConsumed),
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(TokenUse::FirstUse)
            }
        }
    }

    fn release(&self, subject: &str) -> Result<(), ReplayRegistryError> {
        let mut guard = self
            .consumed
            .lock()
            .map_err(|_| ReplayRegistryError::Unavailable("registry mutex poisoned".to_string()))?;
        guard.remove(subject);
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Wrappers
// ============================================================================

/// Shared exposed-key store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedExposedKeyStore {
    /// Inner store implementation.
    inner: Arc<dyn ExposedKeyStore>,
}

impl SharedExposedKeyStore {
    /// Wraps a key store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl ExposedKeyStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn ExposedKeyStore>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl ExposedKeyStore for SharedExposedKeyStore {
    fn upsert(&self, key: &ExposedKey, app_source: &AppSource) -> Result<(), StoreError> {
        self.inner.upsert(key, app_source)
    }

    fn sorted_for_day(&self, day: KeyDay) -> Result<Vec<ExposedKey>, StoreError> {
        self.inner.sorted_for_day(day)
    }

    fn max_id_for_day(&self, day: KeyDay) -> Result<i64, StoreError> {
        self.inner.max_id_for_day(day)
    }
}

/// Shared replay registry backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedReplayRegistry {
    /// Inner registry implementation.
    inner: Arc<dyn ReplayRegistry>,
}

impl SharedReplayRegistry {
    /// Wraps a replay registry in a shared, clonable wrapper.
    #[must_use]
    pub fn from_registry(registry: impl ReplayRegistry + 'static) -> Self {
        Self {
            inner: Arc::new(registry),
        }
    }

    /// Wraps an existing shared registry.
    #[must_use]
    pub const fn new(registry: Arc<dyn ReplayRegistry>) -> Self {
        Self {
            inner: registry,
        }
    }
}

impl ReplayRegistry for SharedReplayRegistry {
    fn consume(
        &self,
        subject: &str,
        expires_at: UnixMillis,
        now: UnixMillis,
    ) -> Result<TokenUse, ReplayRegistryError> {
        self.inner.consume(subject, expires_at, now)
    }

    fn release(&self, subject: &str) -> Result<(), ReplayRegistryError> {
        self.inner.release(subject)
    }
}
