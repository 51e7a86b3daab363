//! Shared fixtures for behavioral specs
//!
//! A `Site` is a temporary directory holding everything one deployment
//! shares between nodes: the blob store root and the stream directory.

#![allow(dead_code)]

pub use lrep_adapters::{FakeBlobStore, LocalBlobStore, LocalStreamTransport};
pub use lrep_core::{
    BlobPath, CheckpointId, Classify, ErrorClass, Event, IdGen, OperationContext, ReceivedEvent,
    ReplicationConfig, RetryPolicy, StreamPosition, UuidIdGen,
};
pub use lrep_engine::{
    build_registry, BlobStorageAdapter, ChannelHandler, CheckpointRegistry, ClientState,
    EventStreamClient, ReceiveHandler,
};
pub use std::sync::Arc;
pub use std::time::Duration;

use std::path::PathBuf;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct Site {
    dir: TempDir,
}

impl Site {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn blobs(&self) -> PathBuf {
        self.dir.path().join("blobs")
    }

    pub fn stream_dir(&self) -> PathBuf {
        self.dir.path().join("stream")
    }

    /// Configuration of one node, as an operator would write it
    pub fn config(&self, node: &str) -> ReplicationConfig {
        self.config_with_registry(node, &self.blob_registry_toml("west"))
    }

    pub fn blob_registry_toml(&self, folder: &str) -> String {
        format!(
            r#"
[registry]
kind = "blob"
store_root = "{}"
folder = "{}"
"#,
            self.blobs().display(),
            folder
        )
    }

    pub fn config_with_registry(&self, node: &str, registry: &str) -> ReplicationConfig {
        let content = format!(
            r#"
node_name = "{node}"

[stream]
connection = "Endpoint=file://{stream};EntityPath=locations"
receive_wait = "20ms"
receiver_close_timeout = "2s"

[retry]
kind = "fixed"
minimum_window = "1ms"
maximum_window = "1ms"
max_attempts = 5
{registry}
"#,
            node = node,
            stream = self.stream_dir().display(),
            registry = registry,
        );
        ReplicationConfig::from_toml_str(&content).unwrap()
    }

    pub fn registry(&self, config: &ReplicationConfig) -> Arc<dyn CheckpointRegistry> {
        build_registry(
            &config.registry,
            &config.retry,
            lrep_core::SystemClock,
            &config.node_name,
        )
    }

    pub fn stream_client(
        &self,
        config: &ReplicationConfig,
    ) -> EventStreamClient<LocalStreamTransport> {
        let transport = LocalStreamTransport::new().with_poll_interval(Duration::from_millis(5));
        EventStreamClient::new(transport, config.stream.clone())
    }
}

/// Wait for `n` events and return their payloads as text
pub async fn collect(rx: &mut UnboundedReceiver<ReceivedEvent>, n: usize) -> Vec<String> {
    let mut payloads = Vec::with_capacity(n);
    while payloads.len() < n {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for events")
            .expect("event channel closed");
        payloads.push(String::from_utf8(event.event.payload).unwrap());
    }
    payloads
}

/// Receive events for `n` payloads, keeping their positions
pub async fn collect_received(
    rx: &mut UnboundedReceiver<ReceivedEvent>,
    n: usize,
) -> Vec<ReceivedEvent> {
    let mut events = Vec::with_capacity(n);
    while events.len() < n {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for events")
            .expect("event channel closed");
        events.push(event);
    }
    events
}

pub fn text(payload: &str) -> Event {
    Event::new(payload.as_bytes().to_vec())
}
