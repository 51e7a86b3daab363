// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event stream over local partition log files
//!
//! `file://<dir>` endpoints map each partition of an entity to
//! `<dir>/<entity>/<partition>.log`. Any number of processes may send to and
//! receive from the same files.

use super::{
    check_event_size, check_partition, PartitionReceiver, PartitionSender, StreamConnection,
    StreamError, StreamTransport,
};
use async_trait::async_trait;
use lrep_core::config::StreamIdentity;
use lrep_core::{
    Clock, Event, PartitionId, ReceivedEvent, StreamPosition, SystemClock, MAX_EVENT_BYTES,
};
use lrep_storage::{partition_log_path, LogCursor, LogWriter, StorageError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Transport for `file://` endpoints
#[derive(Clone)]
pub struct LocalStreamTransport<C: Clock = SystemClock> {
    clock: C,
    max_event_bytes: usize,
    poll_interval: Duration,
}

impl LocalStreamTransport<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for LocalStreamTransport<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> LocalStreamTransport<C> {
    /// Enqueue times are stamped from `clock`
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            max_event_bytes: MAX_EVENT_BYTES,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_max_event_bytes(mut self, limit: usize) -> Self {
        self.max_event_bytes = limit;
        self
    }

    /// How often an idle receiver re-checks its partition file
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl<C: Clock> StreamTransport for LocalStreamTransport<C> {
    type Connection = LocalConnection<C>;

    async fn connect(&self, identity: &StreamIdentity) -> Result<Self::Connection, StreamError> {
        let root = identity
            .local_path()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| StreamError::InvalidEndpoint(identity.endpoint.clone()))?;
        let entity = PathBuf::from(root).join(&identity.entity_path);

        tokio::fs::create_dir_all(&entity)
            .await
            .map_err(StorageError::from)?;

        tracing::debug!(root, entity = %identity.entity_path, "connected to local stream");
        Ok(LocalConnection {
            root: PathBuf::from(root),
            entity: identity.entity_path.clone(),
            transport: self.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Connection to one local stream entity
pub struct LocalConnection<C: Clock = SystemClock> {
    root: PathBuf,
    entity: String,
    transport: LocalStreamTransport<C>,
    closed: Arc<AtomicBool>,
}

impl<C: Clock> LocalConnection<C> {
    fn ensure_open(&self) -> Result<(), StreamError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StreamError::Closed("connection".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<C: Clock> StreamConnection for LocalConnection<C> {
    type Sender = LocalSender<C>;
    type Receiver = LocalReceiver;

    async fn create_sender(&self, partition: &PartitionId) -> Result<Self::Sender, StreamError> {
        self.ensure_open()?;
        let path = partition_log_path(&self.root, &self.entity, partition.as_str());
        let writer = blocking(move || LogWriter::open(&path)).await?;

        Ok(LocalSender {
            writer: Arc::new(Mutex::new(writer)),
            clock: self.transport.clock.clone(),
            max_event_bytes: self.transport.max_event_bytes,
            partition: partition.clone(),
            closed: AtomicBool::new(false),
            connection_closed: Arc::clone(&self.closed),
        })
    }

    async fn create_receiver(
        &self,
        consumer_group: &str,
        partition: &PartitionId,
        position: StreamPosition,
        identifier: &str,
    ) -> Result<Self::Receiver, StreamError> {
        self.ensure_open()?;
        let path = partition_log_path(&self.root, &self.entity, partition.as_str());
        tracing::debug!(
            consumer_group,
            partition = %partition,
            position = %position,
            identifier,
            "opening local receiver"
        );

        Ok(LocalReceiver {
            cursor: Arc::new(Mutex::new(LogCursor::open(&path, position))),
            poll_interval: self.transport.poll_interval,
            closed: false,
        })
    }

    async fn close(&self) -> Result<(), StreamError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Sender appending to one partition file
pub struct LocalSender<C: Clock = SystemClock> {
    writer: Arc<Mutex<LogWriter>>,
    clock: C,
    max_event_bytes: usize,
    partition: PartitionId,
    closed: AtomicBool,
    connection_closed: Arc<AtomicBool>,
}

#[async_trait]
impl<C: Clock> PartitionSender for LocalSender<C> {
    async fn send(&self, event: Event) -> Result<StreamPosition, StreamError> {
        if self.closed.load(Ordering::SeqCst) || self.connection_closed.load(Ordering::SeqCst) {
            return Err(StreamError::Closed(format!("sender for partition {}", self.partition)));
        }
        check_event_size(&event, self.max_event_bytes)?;
        check_partition(&event, &self.partition)?;

        let writer = Arc::clone(&self.writer);
        let enqueued_at = self.clock.utc_now();
        let sequence = blocking(move || {
            writer
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .append(enqueued_at, event)
        })
        .await?;
        Ok(StreamPosition::from_sequence(sequence))
    }

    async fn close(&self) -> Result<(), StreamError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Receiver tailing one partition file
pub struct LocalReceiver {
    cursor: Arc<Mutex<LogCursor>>,
    poll_interval: Duration,
    closed: bool,
}

#[async_trait]
impl PartitionReceiver for LocalReceiver {
    async fn receive(
        &mut self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedEvent>, StreamError> {
        if self.closed {
            return Err(StreamError::Closed("receiver".to_string()));
        }

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let cursor = Arc::clone(&self.cursor);
            let entries = blocking(move || {
                cursor
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .poll(max)
            })
            .await?;
            if !entries.is_empty() {
                return Ok(entries.into_iter().map(|e| e.into_received()).collect());
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.closed = true;
        Ok(())
    }
}

async fn blocking<T, F>(f: F) -> Result<T, StreamError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StreamError::Unavailable(format!("stream task failed: {}", e)))?
        .map_err(StreamError::from)
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
