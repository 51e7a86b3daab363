//! Registry migration specs
//!
//! During a transition the new location is authoritative, the old one is a
//! read-only safety net.

use crate::prelude::*;

fn transitioning(site: &Site) -> String {
    format!(
        r#"
[registry]
kind = "transitioning"

[registry.primary]
store_root = "{root}"
folder = "new"

[registry.fallback]
store_root = "{root}"
folder = "old"
"#,
        root = site.blobs().display()
    )
}

fn record_file(site: &Site, folder: &str) -> std::path::PathBuf {
    site.blobs()
        .join("checkpoints")
        .join(folder)
        .join("checkpoints.json")
}

async fn seed_old_location(site: &Site) {
    let old = site.config_with_registry("legacy", &site.blob_registry_toml("old"));
    site.registry(&old)
        .register_checkpoint(
            &OperationContext::new(),
            CheckpointId::new("legacy-snapshot"),
            StreamPosition::from_sequence(100),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn registering_during_transition_leaves_the_old_record_untouched() {
    let site = Site::new();
    seed_old_location(&site).await;
    let before = std::fs::read(record_file(&site, "old")).unwrap();

    let config = site.config_with_registry("cache-01", &transitioning(&site));
    let registry = site.registry(&config);
    let ctx = OperationContext::new();
    registry
        .register_checkpoint(
            &ctx,
            CheckpointId::new("fresh-snapshot"),
            StreamPosition::from_sequence(250),
        )
        .await
        .unwrap();

    let state = registry.get_checkpoint_state(&ctx).await.unwrap().unwrap();
    assert_eq!(state.checkpoint_id, CheckpointId::new("fresh-snapshot"));
    similar_asserts::assert_eq!(std::fs::read(record_file(&site, "old")).unwrap(), before);
}

#[tokio::test]
async fn an_empty_new_location_is_reported_as_empty() {
    let site = Site::new();
    seed_old_location(&site).await;

    let config = site.config_with_registry("cache-01", &transitioning(&site));
    let state = site
        .registry(&config)
        .get_checkpoint_state(&OperationContext::new())
        .await
        .unwrap();

    assert!(state.is_none());
}

#[tokio::test]
async fn an_unreadable_new_location_falls_back_to_the_old_one() {
    let site = Site::new();
    seed_old_location(&site).await;
    std::fs::create_dir_all(record_file(&site, "new").parent().unwrap()).unwrap();
    std::fs::write(record_file(&site, "new"), b"not a record").unwrap();

    let config = site.config_with_registry("cache-01", &transitioning(&site));
    let state = site
        .registry(&config)
        .get_checkpoint_state(&OperationContext::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state.checkpoint_id, CheckpointId::new("legacy-snapshot"));
    assert_eq!(state.stream_position, StreamPosition::from_sequence(100));
}

#[tokio::test]
async fn both_locations_unreadable_reports_both() {
    let site = Site::new();
    seed_old_location(&site).await;
    std::fs::write(record_file(&site, "old"), b"garbage").unwrap();
    std::fs::create_dir_all(record_file(&site, "new").parent().unwrap()).unwrap();
    std::fs::write(record_file(&site, "new"), b"garbage").unwrap();

    let config = site.config_with_registry("cache-01", &transitioning(&site));
    let err = site
        .registry(&config)
        .get_checkpoint_state(&OperationContext::new())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("primary registry failed"), "{message}");
    assert!(message.contains("fallback registry failed"), "{message}");
}
