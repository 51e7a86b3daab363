// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use lrep_adapters::BlobError;
use lrep_core::{FakeClock, SystemClock};
use std::time::Duration;
use yare::parameterized;

fn blob_config(root: &std::path::Path, folder: &str) -> BlobRegistryConfig {
    BlobRegistryConfig {
        store_root: root.to_path_buf(),
        folder: folder.to_string(),
        ..BlobRegistryConfig::default()
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_millis(1), 3)
}

#[tokio::test]
async fn blob_registry_from_config_persists_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = RegistryConfig::Blob(blob_config(dir.path(), "west"));
    let ctx = OperationContext::new();

    let registry = build_registry(&config, &policy(), SystemClock, "cache-01");
    registry
        .register_checkpoint(&ctx, CheckpointId::new("snap"), StreamPosition::from_sequence(3))
        .await
        .unwrap();

    // A second registry over the same directory sees the record
    let reopened = build_registry(&config, &policy(), SystemClock, "cache-02");
    let state = reopened.get_checkpoint_state(&ctx).await.unwrap().unwrap();
    assert_eq!(state.checkpoint_id, CheckpointId::new("snap"));
    assert_eq!(state.producer.as_deref(), Some("cache-01"));
    assert!(dir
        .path()
        .join("checkpoints")
        .join("west")
        .join("checkpoints.json")
        .exists());
}

#[tokio::test]
async fn transitioning_registry_from_config_reads_the_old_record() {
    let dir = tempfile::tempdir().unwrap();
    let old = blob_config(dir.path(), "old");
    let new = blob_config(dir.path(), "new");
    let ctx = OperationContext::new();

    build_registry(&RegistryConfig::Blob(old.clone()), &policy(), SystemClock, "n")
        .register_checkpoint(&ctx, CheckpointId::new("legacy"), StreamPosition::from_sequence(8))
        .await
        .unwrap();

    let registry = build_registry(
        &RegistryConfig::Transitioning {
            primary: new,
            fallback: old,
        },
        &policy(),
        SystemClock,
        "n",
    );

    // The new location is empty, which is an answer in itself
    assert!(registry.get_checkpoint_state(&ctx).await.unwrap().is_none());

    registry
        .register_checkpoint(&ctx, CheckpointId::new("fresh"), StreamPosition::from_sequence(9))
        .await
        .unwrap();
    let state = registry.get_checkpoint_state(&ctx).await.unwrap().unwrap();
    assert_eq!(state.checkpoint_id, CheckpointId::new("fresh"));
}

#[tokio::test]
async fn memory_registry_uses_the_injected_clock() {
    let clock = FakeClock::new();
    let registry = build_registry(&RegistryConfig::Memory, &policy(), clock.clone(), "n");
    let ctx = OperationContext::new();

    assert!(registry.get_checkpoint_state(&ctx).await.unwrap().is_none());
    let written = registry
        .register_checkpoint(&ctx, CheckpointId::new("m"), StreamPosition::START)
        .await
        .unwrap();

    assert_eq!(written.created_at, clock.utc_now());
    assert_eq!(registry.get_checkpoint_state(&ctx).await.unwrap(), Some(written));
}

fn store_error(source: BlobError) -> RegistryError {
    RegistryError::Store(AdapterError::Store {
        operation: "download",
        path: "checkpoints/x".to_string(),
        source,
    })
}

#[parameterized(
    unavailable = { store_error(BlobError::Unavailable("down".into())), ErrorClass::Transient },
    unauthorized = { store_error(BlobError::Unauthorized("no".into())), ErrorClass::Fatal },
    cancelled = { RegistryError::Store(AdapterError::Cancelled), ErrorClass::Shutdown },
    record = {
        RegistryError::Record(RecordError::UnsupportedVersion { found: 2, expected: 0 }),
        ErrorClass::Fatal
    },
)]
fn registry_errors_keep_their_class(error: RegistryError, expected: ErrorClass) {
    assert_eq!(error.class(), expected);
}
