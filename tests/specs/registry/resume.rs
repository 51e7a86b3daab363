//! Checkpoint resume specs
//!
//! A node that registers a checkpoint can be replaced by another node that
//! resumes from exactly the same place.

use crate::prelude::*;

#[tokio::test]
async fn a_new_node_resumes_from_the_registered_checkpoint() {
    let site = Site::new();
    let ctx = OperationContext::new();

    let old_node = site.config("cache-01");
    site.registry(&old_node)
        .register_checkpoint(
            &ctx,
            CheckpointId::new("snapshot-0042"),
            StreamPosition::from_sequence(1337),
        )
        .await
        .unwrap();

    let new_node = site.config("cache-02");
    let state = site
        .registry(&new_node)
        .get_checkpoint_state(&ctx)
        .await
        .unwrap()
        .expect("checkpoint should be visible to other nodes");

    assert_eq!(state.checkpoint_id, CheckpointId::new("snapshot-0042"));
    assert_eq!(state.stream_position, StreamPosition::from_sequence(1337));
    assert_eq!(state.producer.as_deref(), Some("cache-01"));
}

#[tokio::test]
async fn a_fresh_deployment_has_no_checkpoint() {
    let site = Site::new();

    let state = site
        .registry(&site.config("cache-01"))
        .get_checkpoint_state(&OperationContext::new())
        .await
        .unwrap();

    assert!(state.is_none());
    assert!(!site.blobs().join("checkpoints").exists());
}

#[tokio::test]
async fn the_record_on_disk_is_versioned_json() {
    let site = Site::new();
    site.registry(&site.config("cache-01"))
        .register_checkpoint(
            &OperationContext::new(),
            CheckpointId::new("snap"),
            StreamPosition::from_sequence(5),
        )
        .await
        .unwrap();

    let raw = std::fs::read(
        site.blobs()
            .join("checkpoints")
            .join("west")
            .join("checkpoints.json"),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();

    assert_eq!(json["version"], 0);
    assert_eq!(json["state"]["checkpoint_id"], "snap");
    assert_eq!(json["state"]["stream_position"], "seq:5");
}

#[tokio::test]
async fn a_corrupt_record_is_an_error_not_an_empty_registry() {
    let site = Site::new();
    let config = site.config("cache-01");
    let registry = site.registry(&config);
    let ctx = OperationContext::new();
    registry
        .register_checkpoint(&ctx, CheckpointId::new("snap"), StreamPosition::START)
        .await
        .unwrap();

    std::fs::write(
        site.blobs()
            .join("checkpoints")
            .join("west")
            .join("checkpoints.json"),
        b"{ truncated",
    )
    .unwrap();

    let err = registry.get_checkpoint_state(&ctx).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Fatal);
}
