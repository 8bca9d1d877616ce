// crates/exposure-relay-core/tests/service.rs
// ============================================================================
// Module: Publishing Service Tests
// Description: Verifies pipeline ordering, dedup, the decoy lane, and reads.
// ============================================================================
//! ## Overview
//! Exercises the full submission pipeline over in-memory stores: ordering
//! (auth failures never reach storage), idempotent dedup across distinct
//! tokens, the decoy lane, the release-on-storage-failure retry path, and
//! fingerprint-gated reads.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use exposure_relay_core::AppSource;
use exposure_relay_core::DayRead;
use exposure_relay_core::ExposedKey;
use exposure_relay_core::ExposedKeyStore;
use exposure_relay_core::ExposurePublishingService;
use exposure_relay_core::InMemoryExposedKeyStore;
use exposure_relay_core::InMemoryReplayRegistry;
use exposure_relay_core::KeyDay;
use exposure_relay_core::PublishError;
use exposure_relay_core::SharedExposedKeyStore;
use exposure_relay_core::SharedReplayRegistry;
use exposure_relay_core::StoreError;
use exposure_relay_core::SubmissionAuthenticator;
use exposure_relay_core::SubmissionOutcome;
use exposure_relay_core::SubmissionValidator;
use exposure_relay_core::TokenClaims;
use exposure_relay_core::UnixMillis;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed "now" for deterministic tests, in epoch milliseconds.
const NOW_MILLIS: i64 = 1_600_000_000_000;
/// Fixed "now" in epoch seconds.
const NOW_SECS: i64 = NOW_MILLIS / 1_000;

/// Returns the fixed current instant.
fn now() -> UnixMillis {
    UnixMillis::new(NOW_MILLIS)
}

/// Returns today's day bucket under the fixed now.
fn today() -> KeyDay {
    KeyDay::from_unix_millis(NOW_MILLIS).unwrap()
}

/// Builds a valid non-fake claim set for the given subject.
fn claims(subject: &str) -> TokenClaims {
    TokenClaims::new(subject, NOW_SECS + 300)
}

/// Wires a service over fresh in-memory collaborators, returning the store
/// handle for direct inspection.
fn service() -> (ExposurePublishingService, InMemoryExposedKeyStore) {
    let store = InMemoryExposedKeyStore::new();
    let service = ExposurePublishingService::new(
        SharedExposedKeyStore::from_store(store.clone()),
        SubmissionAuthenticator::new(SharedReplayRegistry::from_registry(
            InMemoryReplayRegistry::new(),
        )),
        SubmissionValidator::default(),
        AppSource::new("org.example.tracing"),
    );
    (service, store)
}

/// Store double whose writes always fail as unavailable.
#[derive(Debug, Clone, Default)]
struct UnavailableStore;

impl ExposedKeyStore for UnavailableStore {
    fn upsert(&self, _key: &ExposedKey, _app_source: &AppSource) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("write refused".to_string()))
    }

    fn sorted_for_day(&self, _day: KeyDay) -> Result<Vec<ExposedKey>, StoreError> {
        Err(StoreError::Unavailable("read refused".to_string()))
    }

    fn max_id_for_day(&self, _day: KeyDay) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("read refused".to_string()))
    }
}

// ============================================================================
// SECTION: Submission Pipeline
// ============================================================================

#[test]
fn accepted_submission_is_stored() {
    let (service, store) = service();
    let key = ExposedKey::new("a2V5MQ==", today());
    let outcome = service.submit(&key, &claims("s-1"), now()).unwrap();
    assert_eq!(outcome, SubmissionOutcome::Stored);
    assert_eq!(store.sorted_for_day(today()).unwrap().len(), 1);
}

#[test]
fn stored_row_carries_the_service_app_source() {
    let (service, store) = service();
    let key = ExposedKey::new("a2V5MQ==", today());
    service.submit(&key, &claims("s-1"), now()).unwrap();
    let source = store.app_source_for("a2V5MQ==", today()).unwrap();
    assert_eq!(source, Some(AppSource::new("org.example.tracing")));
}

#[test]
fn replayed_token_never_reaches_storage() {
    let (service, store) = service();
    let first = ExposedKey::new("a2V5MQ==", today());
    service.submit(&first, &claims("s-1"), now()).unwrap();

    let second = ExposedKey::new("a2V5Mg==", today());
    let err = service.submit(&second, &claims("s-1"), now()).unwrap_err();
    assert!(matches!(err, PublishError::Unauthorized(_)));
    // Only the first key was persisted.
    assert_eq!(store.sorted_for_day(today()).unwrap().len(), 1);
}

#[test]
fn expired_token_never_reaches_storage() {
    let (service, store) = service();
    let key = ExposedKey::new("a2V5MQ==", today());
    let expired = TokenClaims::new("s-1", NOW_SECS - 60);
    let err = service.submit(&key, &expired, now()).unwrap_err();
    assert!(matches!(err, PublishError::Unauthorized(_)));
    assert!(store.sorted_for_day(today()).unwrap().is_empty());
}

#[test]
fn future_key_date_is_a_bad_request() {
    let (service, store) = service();
    let future = KeyDay::from_unix_millis(NOW_MILLIS + 2 * 86_400_000).unwrap();
    let key = ExposedKey::new("a2V5MQ==", future);
    let err = service.submit(&key, &claims("s-1"), now()).unwrap_err();
    assert!(matches!(err, PublishError::BadRequest(_)));
    assert!(store.sorted_for_day(future).unwrap().is_empty());
}

#[test]
fn same_key_submitted_with_two_tokens_yields_one_row() {
    let (service, store) = service();
    let key = ExposedKey::new("a2V5MQ==", today());
    service.submit(&key, &claims("s-1"), now()).unwrap();
    service.submit(&key, &claims("s-2"), now()).unwrap();
    let rows = store.sorted_for_day(today()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payload, "a2V5MQ==");
}

#[test]
fn decoy_submission_is_accepted_but_never_persisted() {
    let (service, store) = service();
    let key = ExposedKey::new("a2V5MQ==", today());
    let decoy = claims("decoy").into_fake();
    for _ in 0 .. 3 {
        let outcome = service.submit(&key, &decoy, now()).unwrap();
        assert_eq!(outcome, SubmissionOutcome::Decoy);
    }
    assert!(store.sorted_for_day(today()).unwrap().is_empty());
    assert_eq!(store.max_id_for_day(today()).unwrap(), 0);
}

#[test]
fn decoy_submission_still_fails_temporal_validation() {
    let (service, _store) = service();
    let stale = KeyDay::from_unix_millis(NOW_MILLIS - 30 * 86_400_000).unwrap();
    let key = ExposedKey::new("a2V5MQ==", stale);
    let err = service.submit(&key, &claims("decoy").into_fake(), now()).unwrap_err();
    assert!(matches!(err, PublishError::BadRequest(_)));
}

#[test]
fn storage_failure_releases_the_token_for_retry() {
    let registry = SharedReplayRegistry::from_registry(InMemoryReplayRegistry::new());
    let failing = ExposurePublishingService::new(
        SharedExposedKeyStore::from_store(UnavailableStore),
        SubmissionAuthenticator::new(registry.clone()),
        SubmissionValidator::default(),
        AppSource::new("org.example.tracing"),
    );
    let key = ExposedKey::new("a2V5MQ==", today());
    let err = failing.submit(&key, &claims("s-1"), now()).unwrap_err();
    assert!(matches!(err, PublishError::StorageUnavailable(_)));

    // The same token retries successfully against a healthy store.
    let healthy = ExposurePublishingService::new(
        SharedExposedKeyStore::from_store(InMemoryExposedKeyStore::new()),
        SubmissionAuthenticator::new(registry),
        SubmissionValidator::default(),
        AppSource::new("org.example.tracing"),
    );
    let outcome = healthy.submit(&key, &claims("s-1"), now()).unwrap();
    assert_eq!(outcome, SubmissionOutcome::Stored);
}

// ============================================================================
// SECTION: Fingerprint-Gated Reads
// ============================================================================

#[test]
fn read_without_validator_returns_body_and_tag() {
    let (service, _store) = service();
    let key = ExposedKey::new("a2V5MQ==", today());
    service.submit(&key, &claims("s-1"), now()).unwrap();

    let read = service.day_read(today(), None).unwrap();
    match read {
        DayRead::Fresh {
            etag,
            keys,
        } => {
            assert!(!etag.is_empty());
            assert_eq!(keys.len(), 1);
        }
        DayRead::NotModified {
            ..
        } => panic!("expected a fresh read"),
    }
}

#[test]
fn matching_validator_short_circuits_without_a_body() {
    let (service, _store) = service();
    let key = ExposedKey::new("a2V5MQ==", today());
    service.submit(&key, &claims("s-1"), now()).unwrap();

    let first = service.day_read(today(), None).unwrap();
    let tag = first.etag().to_string();
    let second = service.day_read(today(), Some(&tag)).unwrap();
    assert_eq!(
        second,
        DayRead::NotModified {
            etag: tag,
        }
    );
}

#[test]
fn new_write_invalidates_the_previous_tag() {
    let (service, _store) = service();
    service.submit(&ExposedKey::new("a2V5MQ==", today()), &claims("s-1"), now()).unwrap();
    let first_tag = service.day_read(today(), None).unwrap().etag().to_string();

    service.submit(&ExposedKey::new("a2V5Mg==", today()), &claims("s-2"), now()).unwrap();
    let read = service.day_read(today(), Some(&first_tag)).unwrap();
    match read {
        DayRead::Fresh {
            etag,
            keys,
        } => {
            assert_ne!(etag, first_tag);
            assert_eq!(keys.len(), 2);
        }
        DayRead::NotModified {
            ..
        } => panic!("expected a fresh read after a write"),
    }
}

#[test]
fn idempotent_resubmission_does_not_change_the_tag() {
    let (service, _store) = service();
    let key = ExposedKey::new("a2V5MQ==", today());
    service.submit(&key, &claims("s-1"), now()).unwrap();
    let tag = service.day_read(today(), None).unwrap().etag().to_string();

    service.submit(&key, &claims("s-2"), now()).unwrap();
    let read = service.day_read(today(), Some(&tag)).unwrap();
    assert!(matches!(
        read,
        DayRead::NotModified {
            ..
        }
    ));
}

#[test]
fn empty_bucket_reads_fresh_with_sentinel_tag() {
    let (service, _store) = service();
    let read = service.day_read(today(), None).unwrap();
    match read {
        DayRead::Fresh {
            keys, ..
        } => assert!(keys.is_empty()),
        DayRead::NotModified {
            ..
        } => panic!("expected a fresh read"),
    }
}

#[test]
fn read_ordering_is_descending_by_insertion() {
    let (service, _store) = service();
    service.submit(&ExposedKey::new("Zmlyc3Q=", today()), &claims("s-1"), now()).unwrap();
    service.submit(&ExposedKey::new("c2Vjb25k", today()), &claims("s-2"), now()).unwrap();
    let read = service.day_read(today(), None).unwrap();
    let DayRead::Fresh {
        keys, ..
    } = read
    else {
        panic!("expected a fresh read");
    };
    assert_eq!(keys[0].payload, "c2Vjb25k");
    assert_eq!(keys[1].payload, "Zmlyc3Q=");
}
