// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use lrep_adapters::{BlobCall, FakeBlobStore, LocalBlobStore};
use lrep_core::FakeClock;
use std::sync::Arc;
use yare::parameterized;

fn path() -> BlobPath {
    BlobPath::new("checkpoints", "node/counter.json")
}

fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_millis(1), attempts)
}

fn adapter(store: FakeBlobStore) -> BlobStorageAdapter<FakeBlobStore> {
    BlobStorageAdapter::new(store).with_policy(fast_policy(500))
}

fn count(calls: &[BlobCall], pred: impl Fn(&BlobCall) -> bool) -> usize {
    calls.iter().filter(|c| pred(c)).count()
}

#[tokio::test]
async fn read_never_creates_the_container() {
    let store = FakeBlobStore::new();
    let adapter = adapter(store.clone());

    let value = adapter.read(&OperationContext::new(), &path()).await.unwrap();

    assert!(value.is_none());
    assert!(!store.has_container("checkpoints"));
    assert_eq!(
        count(&store.calls(), |c| matches!(c, BlobCall::CreateContainer { .. })),
        0
    );
}

#[tokio::test]
async fn write_creates_the_missing_container() {
    let store = FakeBlobStore::new();
    let adapter = adapter(store.clone());

    adapter
        .write(&OperationContext::new(), &path(), b"42")
        .await
        .unwrap();

    assert!(store.has_container("checkpoints"));
    assert_eq!(store.get(&path()), Some(b"42".to_vec()));
}

#[tokio::test]
async fn ensure_container_reports_prior_existence() {
    let adapter = adapter(FakeBlobStore::new());
    let ctx = OperationContext::new();

    assert!(!adapter.ensure_container_exists(&ctx, "checkpoints").await.unwrap());
    assert!(adapter.ensure_container_exists(&ctx, "checkpoints").await.unwrap());
}

#[tokio::test]
async fn typed_state_survives_write_and_read() {
    let adapter = adapter(FakeBlobStore::new());
    let ctx = OperationContext::new();

    adapter
        .write_state(&ctx, &path(), &vec!["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    let value: Option<Vec<String>> = adapter.read_state(&ctx, &path()).await.unwrap();

    assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));
}

#[tokio::test]
async fn malformed_value_is_fatal() {
    let adapter = adapter(FakeBlobStore::new());
    let ctx = OperationContext::new();
    adapter.write(&ctx, &path(), b"not json").await.unwrap();

    let err = adapter.read_state::<u64>(&ctx, &path()).await.unwrap_err();

    assert!(matches!(err, AdapterError::Malformed { .. }));
    assert_eq!(err.class(), ErrorClass::Fatal);
}

#[tokio::test]
async fn first_write_of_absent_value_uses_if_none_match() {
    let store = FakeBlobStore::new();
    let adapter = adapter(store.clone());

    let old = adapter
        .read_modify_write_state(&OperationContext::new(), &path(), |old: Option<u64>| {
            (old, old.unwrap_or(0) + 1)
        })
        .await
        .unwrap();

    assert_eq!(old, None);
    let conditions: Vec<_> = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            BlobCall::Upload { condition, .. } => Some(condition),
            _ => None,
        })
        .collect();
    assert!(conditions
        .iter()
        .all(|c| *c == WriteCondition::IfNoneMatch));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let store = FakeBlobStore::new();
    let adapter = adapter(store.clone());
    store.fail_next(3);

    adapter
        .write(&OperationContext::new(), &path(), b"1")
        .await
        .unwrap();

    assert_eq!(store.get(&path()), Some(b"1".to_vec()));
}

#[tokio::test]
async fn fatal_errors_are_not_retried() {
    let store = FakeBlobStore::new();
    let adapter = adapter(store.clone());
    store.deny_access(true);

    let err = adapter
        .read(&OperationContext::new(), &path())
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Fatal);
    assert_eq!(
        count(&store.calls(), |c| matches!(c, BlobCall::Download { .. })),
        1
    );
}

#[tokio::test]
async fn exhaustion_wraps_the_last_error() {
    let store = FakeBlobStore::new();
    let adapter = BlobStorageAdapter::new(store.clone()).with_policy(fast_policy(3));
    store.fail_next(10);

    let err = adapter
        .read(&OperationContext::new(), &path())
        .await
        .unwrap_err();

    match &err {
        AdapterError::Exhausted { attempts, last, .. } => {
            assert_eq!(*attempts, 3);
            assert_eq!(last.class(), ErrorClass::Transient);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(err.class(), ErrorClass::Transient);
}

/// Store whose downloads take `step` of fake time
#[derive(Clone)]
struct SlowStore {
    inner: FakeBlobStore,
    clock: FakeClock,
    step: Duration,
}

#[async_trait]
impl BlobStore for SlowStore {
    fn supports_conditional_writes(&self) -> bool {
        true
    }

    async fn container_exists(&self, container: &str) -> Result<bool, BlobError> {
        self.inner.container_exists(container).await
    }

    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool, BlobError> {
        self.inner.create_container_if_not_exists(container).await
    }

    async fn download(&self, path: &BlobPath) -> Result<Option<Blob>, BlobError> {
        self.clock.advance(self.step);
        self.inner.download(path).await
    }

    async fn upload(
        &self,
        path: &BlobPath,
        data: Vec<u8>,
        condition: WriteCondition,
    ) -> Result<ETag, BlobError> {
        self.inner.upload(path, data, condition).await
    }

    async fn acquire_lease(&self, path: &BlobPath, duration: Duration) -> Result<LeaseId, BlobError> {
        self.inner.acquire_lease(path, duration).await
    }

    async fn release_lease(&self, path: &BlobPath, lease: &LeaseId) -> Result<(), BlobError> {
        self.inner.release_lease(path, lease).await
    }
}

#[tokio::test]
async fn elapsed_budget_stops_retries() {
    let clock = FakeClock::new();
    let inner = FakeBlobStore::new();
    inner.fail_next(1000);
    let store = SlowStore {
        inner: inner.clone(),
        clock: clock.clone(),
        step: Duration::from_millis(30),
    };
    let policy = RetryPolicy::fixed(Duration::from_millis(1), 1000)
        .with_max_attempts(None)
        .with_max_elapsed(Some(Duration::from_millis(100)));
    let adapter = BlobStorageAdapter::with_clock(store, clock).with_policy(policy);

    let err = adapter
        .read(&OperationContext::new(), &path())
        .await
        .unwrap_err();

    // 30, 60 and 90ms are inside the budget; the fourth failure lands at 120ms
    match err {
        AdapterError::Exhausted {
            attempts, elapsed, ..
        } => {
            assert_eq!(attempts, 4);
            assert_eq!(elapsed, Duration::from_millis(120));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_context_stops_before_the_first_attempt() {
    let store = FakeBlobStore::new();
    let adapter = adapter(store.clone());
    let ctx = OperationContext::new();
    ctx.cancel();

    let err = adapter.read(&ctx, &path()).await.unwrap_err();

    assert!(matches!(err, AdapterError::Cancelled));
    assert_eq!(err.class(), ErrorClass::Shutdown);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_backoff() {
    let store = FakeBlobStore::new();
    store.fail_next(100);
    let adapter = BlobStorageAdapter::new(store)
        .with_policy(RetryPolicy::fixed(Duration::from_secs(30), 10));
    let ctx = OperationContext::new();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        adapter.write(&ctx, &path(), b"x"),
    )
    .await
    .expect("cancellation should end the backoff sleep");
    assert!(matches!(result, Err(AdapterError::Cancelled)));
}

#[tokio::test]
async fn lease_is_released_after_a_failed_transform() {
    let store = FakeBlobStore::without_conditional_writes();
    let adapter = adapter(store.clone());
    let ctx = OperationContext::new();
    adapter.write(&ctx, &path(), b"not json").await.unwrap();

    let err = adapter
        .read_modify_write_state(&ctx, &path(), |old: Option<u64>| ((), old.unwrap_or(0) + 1))
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::Malformed { .. }));
    assert!(!store.is_leased(&path()));
    assert_eq!(
        count(&store.calls(), |c| matches!(c, BlobCall::ReleaseLease { .. })),
        1
    );
    assert_eq!(store.get(&path()), Some(b"not json".to_vec()));
}

#[tokio::test]
async fn lease_path_writes_under_a_lease_on_the_value() {
    let store = FakeBlobStore::without_conditional_writes();
    let adapter = adapter(store.clone());
    let ctx = OperationContext::new();

    for _ in 0..2 {
        adapter
            .read_modify_write_state(&ctx, &path(), |old: Option<u64>| ((), old.unwrap_or(0) + 1))
            .await
            .unwrap();
    }

    let calls = store.calls();
    assert!(calls
        .iter()
        .all(|c| !matches!(c, BlobCall::AcquireLease { path: p } if *p != path())));
    let conditions: Vec<_> = calls
        .into_iter()
        .filter_map(|c| match c {
            BlobCall::Upload { condition, .. } => Some(condition),
            _ => None,
        })
        .collect();
    // Empty placeholder (created after the container), then two leased writes
    assert_eq!(conditions.len(), 4);
    assert!(conditions[..2].iter().all(|c| *c == WriteCondition::IfNoneMatch));
    assert!(conditions[2..]
        .iter()
        .all(|c| matches!(c, WriteCondition::Lease(_))));
    assert_eq!(store.get(&path()), Some(b"2".to_vec()));
    assert!(!store.is_leased(&path()));
}

#[tokio::test]
async fn lease_placeholder_reads_as_absent() {
    let store = FakeBlobStore::without_conditional_writes();
    let adapter = adapter(store.clone());
    let ctx = OperationContext::new();
    adapter.ensure_container_exists(&ctx, "checkpoints").await.unwrap();
    store.put(&path(), Vec::new());

    assert!(adapter.read(&ctx, &path()).await.unwrap().is_none());
    let old = adapter
        .read_modify_write_state(&ctx, &path(), |old: Option<u64>| (old, 7))
        .await
        .unwrap();
    assert_eq!(old, None);
    assert_eq!(store.get(&path()), Some(b"7".to_vec()));
}

#[tokio::test]
async fn writer_whose_lease_expired_cannot_overwrite() {
    let store = FakeBlobStore::without_conditional_writes();
    let adapter = adapter(store.clone());
    let ctx = OperationContext::new();
    adapter.write_state(&ctx, &path(), &10u64).await.unwrap();

    let mut stalled = true;
    let other_writer = store.clone();
    let seen = adapter
        .read_modify_write_state(&ctx, &path(), |old: Option<u64>| {
            if std::mem::take(&mut stalled) {
                // Our lease runs out mid-cycle and another writer commits
                other_writer.expire_lease(&path());
                other_writer.put(&path(), b"20".to_vec());
            }
            (old, old.unwrap_or(0) + 1)
        })
        .await
        .unwrap();

    // The stale write was refused and the retry built on the other update
    assert_eq!(seen, Some(20));
    assert_eq!(store.get(&path()), Some(b"21".to_vec()));
    assert!(!store.is_leased(&path()));
    assert_eq!(
        count(&store.calls(), |c| matches!(
            c,
            BlobCall::Upload {
                condition: WriteCondition::Lease(_),
                ..
            }
        )),
        2
    );
}

#[parameterized(
    conditional = { false },
    leased = { true },
)]
#[test_macro(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_increments_are_not_lost(leased: bool) {
    const WRITERS: u64 = 16;

    let store = if leased {
        FakeBlobStore::without_conditional_writes()
    } else {
        FakeBlobStore::new()
    };
    store.set_failure_rate(0.05);
    let adapter = Arc::new(BlobStorageAdapter::new(store.clone()).with_policy(fast_policy(2000)));

    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let adapter = Arc::clone(&adapter);
        handles.push(tokio::spawn(async move {
            adapter
                .read_modify_write_state(&OperationContext::new(), &path(), |old: Option<u64>| {
                    ((), old.unwrap_or(0) + 1)
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    store.set_failure_rate(0.0);
    let total: Option<u64> = adapter
        .read_state(&OperationContext::new(), &path())
        .await
        .unwrap();
    assert_eq!(total, Some(WRITERS));
    assert!(!store.is_leased(&path()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn local_store_increments_are_not_lost() {
    const WRITERS: u64 = 8;

    let dir = tempfile::tempdir().unwrap();
    let adapter = Arc::new(
        BlobStorageAdapter::new(LocalBlobStore::new(dir.path())).with_policy(fast_policy(2000)),
    );

    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let adapter = Arc::clone(&adapter);
        handles.push(tokio::spawn(async move {
            adapter
                .read_modify_write_state(&OperationContext::new(), &path(), |old: Option<u64>| {
                    ((), old.unwrap_or(0) + 1)
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let total: Option<u64> = adapter
        .read_state(&OperationContext::new(), &path())
        .await
        .unwrap();
    assert_eq!(total, Some(WRITERS));
}
