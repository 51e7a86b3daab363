//! Read-modify-write specs
//!
//! Concurrent writers never lose each other's updates, whether the store
//! offers conditional writes or only leases, and whether or not it is flaky.

use crate::prelude::*;
use serde_json::{Map, Value};

const NODES: usize = 4;
const UPDATES_PER_NODE: usize = 5;

fn path() -> BlobPath {
    BlobPath::new("inventory", "west/locations.json")
}

/// Each update records one location under its own key
async fn record_location<S: lrep_adapters::BlobStore>(
    adapter: &BlobStorageAdapter<S>,
    node: usize,
    update: usize,
) {
    let key = format!("node{}-loc{}", node, update);
    adapter
        .read_modify_write_state(&OperationContext::new(), &path(), |current: Option<Map<String, Value>>| {
            let mut locations = current.unwrap_or_default();
            locations.insert(key.clone(), Value::from(node as u64));
            ((), locations)
        })
        .await
        .unwrap();
}

async fn run_nodes<S: lrep_adapters::BlobStore>(
    make: impl Fn() -> BlobStorageAdapter<S>,
) -> Map<String, Value> {
    let mut tasks = Vec::new();
    for node in 0..NODES {
        let adapter = make();
        tasks.push(tokio::spawn(async move {
            for update in 0..UPDATES_PER_NODE {
                record_location(&adapter, node, update).await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    make()
        .read_state(&OperationContext::new(), &path())
        .await
        .unwrap()
        .unwrap()
}

fn expected_keys() -> Vec<String> {
    let mut keys: Vec<String> = (0..NODES)
        .flat_map(|n| (0..UPDATES_PER_NODE).map(move |u| format!("node{}-loc{}", n, u)))
        .collect();
    keys.sort();
    keys
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nodes_sharing_a_directory_lose_no_updates() {
    let site = Site::new();
    let root = site.blobs();

    // Separate adapters stand in for separate processes
    let locations = run_nodes(|| {
        BlobStorageAdapter::new(LocalBlobStore::new(root.clone()))
            .with_policy(RetryPolicy::fixed(Duration::from_millis(1), 1000))
    })
    .await;

    let keys: Vec<String> = locations.keys().cloned().collect();
    similar_asserts::assert_eq!(keys, expected_keys());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn flaky_conditional_store_loses_no_updates() {
    let store = FakeBlobStore::new();
    store.set_failure_rate(0.1);

    let locations = run_nodes(|| {
        BlobStorageAdapter::new(store.clone())
            .with_policy(RetryPolicy::fixed(Duration::from_millis(1), 1000))
    })
    .await;

    let keys: Vec<String> = locations.keys().cloned().collect();
    similar_asserts::assert_eq!(keys, expected_keys());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn flaky_lease_only_store_loses_no_updates() {
    let store = FakeBlobStore::without_conditional_writes();
    store.set_failure_rate(0.05);

    let locations = run_nodes(|| {
        BlobStorageAdapter::new(store.clone())
            .with_policy(RetryPolicy::fixed(Duration::from_millis(1), 2000))
    })
    .await;

    let keys: Vec<String> = locations.keys().cloned().collect();
    similar_asserts::assert_eq!(keys, expected_keys());
}
