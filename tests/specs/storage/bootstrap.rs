//! Container bootstrap specs
//!
//! Writes create a missing container; reads never do.

use crate::prelude::*;

fn adapter(site: &Site) -> BlobStorageAdapter<LocalBlobStore> {
    BlobStorageAdapter::new(LocalBlobStore::new(site.blobs()))
        .with_policy(RetryPolicy::fixed(Duration::from_millis(1), 5))
}

#[tokio::test]
async fn reading_from_a_missing_container_is_absent_and_creates_nothing() {
    let site = Site::new();
    let adapter = adapter(&site);

    let value = adapter
        .read(&OperationContext::new(), &BlobPath::new("fresh", "a/b.json"))
        .await
        .unwrap();

    assert!(value.is_none());
    assert!(!site.blobs().join("fresh").exists());
}

#[tokio::test]
async fn writing_to_a_missing_container_creates_it() {
    let site = Site::new();
    let adapter = adapter(&site);
    let ctx = OperationContext::new();
    let path = BlobPath::new("fresh", "a/b.json");

    let etag = adapter.write(&ctx, &path, b"{}").await.unwrap();
    let blob = adapter.read(&ctx, &path).await.unwrap().unwrap();

    assert!(site.blobs().join("fresh").is_dir());
    assert_eq!(blob.data, b"{}".to_vec());
    assert_eq!(blob.etag, etag);
}

#[tokio::test]
async fn every_write_changes_the_version_token() {
    let site = Site::new();
    let adapter = adapter(&site);
    let ctx = OperationContext::new();
    let path = BlobPath::new("fresh", "value.json");

    let first = adapter.write(&ctx, &path, b"1").await.unwrap();
    let second = adapter.write(&ctx, &path, b"1").await.unwrap();

    assert_ne!(first, second);
}

#[tokio::test]
async fn ensure_container_reports_whether_it_already_existed() {
    let site = Site::new();
    let adapter = adapter(&site);
    let ctx = OperationContext::new();

    assert!(!adapter.ensure_container_exists(&ctx, "fresh").await.unwrap());
    assert!(adapter.ensure_container_exists(&ctx, "fresh").await.unwrap());
}
