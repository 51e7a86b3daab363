// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory event stream for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    check_event_size, check_partition, PartitionReceiver, PartitionSender, StreamConnection,
    StreamError, StreamTransport,
};
use async_trait::async_trait;
use chrono::Utc;
use lrep_core::config::StreamIdentity;
use lrep_core::{Event, PartitionId, ReceivedEvent, StreamPosition, MAX_EVENT_BYTES};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Recorded stream call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCall {
    Connect {
        endpoint: String,
        entity: String,
    },
    CreateSender {
        partition: PartitionId,
    },
    CreateReceiver {
        consumer_group: String,
        partition: PartitionId,
        position: StreamPosition,
        identifier: String,
    },
    Send {
        partition: PartitionId,
        bytes: usize,
    },
    CloseSender,
    CloseReceiver,
    CloseConnection,
}

#[derive(Default)]
struct FakeStreamState {
    /// Events keyed by "entity/partition"
    partitions: HashMap<String, Vec<ReceivedEvent>>,
    fail_connect: bool,
    fail_create_sender: bool,
    fail_sends: u32,
    hang_sends: bool,
    fail_receives: u32,
    fatal_receives: bool,
    hang_receiver_close: bool,
    open_connections: usize,
    open_receivers: usize,
}

/// In-memory stream transport with fault injection
#[derive(Clone)]
pub struct FakeStreamTransport {
    state: Arc<Mutex<FakeStreamState>>,
    calls: Arc<Mutex<Vec<StreamCall>>>,
    appended: Arc<Notify>,
    max_event_bytes: usize,
}

impl Default for FakeStreamTransport {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            calls: Arc::default(),
            appended: Arc::new(Notify::new()),
            max_event_bytes: MAX_EVENT_BYTES,
        }
    }
}

impl FakeStreamTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_event_bytes(mut self, limit: usize) -> Self {
        self.max_event_bytes = limit;
        self
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StreamCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Append an event as if another node had sent it
    pub fn append(&self, entity: &str, event: Event) -> StreamPosition {
        let key = partition_key(entity, &event.partition);
        let position = self.lock().push(&key, event);
        self.appended.notify_waiters();
        position
    }

    /// Payloads stored in one partition, in order
    pub fn payloads(&self, entity: &str, partition: &PartitionId) -> Vec<Vec<u8>> {
        self.lock()
            .partitions
            .get(&partition_key(entity, partition))
            .map(|events| events.iter().map(|e| e.event.payload.clone()).collect())
            .unwrap_or_default()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn fail_create_sender(&self, fail: bool) {
        self.lock().fail_create_sender = fail;
    }

    /// Fail the next `n` sends with a transient error
    pub fn fail_sends(&self, n: u32) {
        self.lock().fail_sends = n;
    }

    /// Make sends block until their sender or connection is closed
    pub fn hang_sends(&self, hang: bool) {
        self.lock().hang_sends = hang;
    }

    /// Fail the next `n` receives with a transient error
    pub fn fail_receives(&self, n: u32) {
        self.lock().fail_receives = n;
    }

    /// Fail every receive with an authorization error
    pub fn fatal_receives(&self, fatal: bool) {
        self.lock().fatal_receives = fatal;
    }

    /// Make receiver close never complete
    pub fn hang_receiver_close(&self, hang: bool) {
        self.lock().hang_receiver_close = hang;
    }

    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    pub fn open_receivers(&self) -> usize {
        self.lock().open_receivers
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeStreamState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: StreamCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

impl FakeStreamState {
    fn push(&mut self, key: &str, mut event: Event) -> StreamPosition {
        let events = self.partitions.entry(key.to_string()).or_default();
        let position = StreamPosition::from_sequence(events.len() as u64);
        // Keep the partition field consistent with where the event landed
        if let Some((_, partition)) = key.rsplit_once('/') {
            event.partition = PartitionId::new(partition);
        }
        events.push(ReceivedEvent {
            position,
            enqueued_at: Utc::now(),
            event,
        });
        position
    }
}

fn partition_key(entity: &str, partition: &PartitionId) -> String {
    format!("{}/{}", entity, partition)
}

#[async_trait]
impl StreamTransport for FakeStreamTransport {
    type Connection = FakeConnection;

    async fn connect(&self, identity: &StreamIdentity) -> Result<Self::Connection, StreamError> {
        self.record(StreamCall::Connect {
            endpoint: identity.endpoint.clone(),
            entity: identity.entity_path.clone(),
        });
        let mut state = self.lock();
        if state.fail_connect {
            return Err(StreamError::Unauthorized("connect denied by test".to_string()));
        }
        state.open_connections += 1;
        Ok(FakeConnection {
            transport: self.clone(),
            entity: identity.entity_path.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

pub struct FakeConnection {
    transport: FakeStreamTransport,
    entity: String,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl StreamConnection for FakeConnection {
    type Sender = FakeSender;
    type Receiver = FakeReceiver;

    async fn create_sender(&self, partition: &PartitionId) -> Result<Self::Sender, StreamError> {
        self.transport.record(StreamCall::CreateSender {
            partition: partition.clone(),
        });
        if self.closed.load(Ordering::SeqCst) {
            return Err(StreamError::Closed("connection".to_string()));
        }
        if self.transport.lock().fail_create_sender {
            return Err(StreamError::Unavailable("sender refused by test".to_string()));
        }
        Ok(FakeSender {
            transport: self.transport.clone(),
            key: partition_key(&self.entity, partition),
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
        self.transport.record(StreamCall::CreateReceiver {
            consumer_group: consumer_group.to_string(),
            partition: partition.clone(),
            position,
            identifier: identifier.to_string(),
        });
        if self.closed.load(Ordering::SeqCst) {
            return Err(StreamError::Closed("connection".to_string()));
        }
        self.transport.lock().open_receivers += 1;
        Ok(FakeReceiver {
            transport: self.transport.clone(),
            key: partition_key(&self.entity, partition),
            next: position,
            closed: false,
        })
    }

    async fn close(&self) -> Result<(), StreamError> {
        self.transport.record(StreamCall::CloseConnection);
        if !self.closed.swap(true, Ordering::SeqCst) {
            let mut state = self.transport.lock();
            state.open_connections = state.open_connections.saturating_sub(1);
        }
        Ok(())
    }
}

pub struct FakeSender {
    transport: FakeStreamTransport,
    key: String,
    partition: PartitionId,
    closed: AtomicBool,
    connection_closed: Arc<AtomicBool>,
}

#[async_trait]
impl PartitionSender for FakeSender {
    async fn send(&self, event: Event) -> Result<StreamPosition, StreamError> {
        self.transport.record(StreamCall::Send {
            partition: self.partition.clone(),
            bytes: event.size_bytes(),
        });
        if self.closed.load(Ordering::SeqCst) || self.connection_closed.load(Ordering::SeqCst) {
            return Err(StreamError::Closed("sender".to_string()));
        }
        check_event_size(&event, self.transport.max_event_bytes)?;
        check_partition(&event, &self.partition)?;

        let hang = self.transport.lock().hang_sends;
        if hang {
            while !self.closed.load(Ordering::SeqCst)
                && !self.connection_closed.load(Ordering::SeqCst)
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            return Err(StreamError::Closed("sender".to_string()));
        }

        let position = {
            let mut state = self.transport.lock();
            if state.fail_sends > 0 {
                state.fail_sends -= 1;
                return Err(StreamError::Unavailable("injected send failure".to_string()));
            }
            state.push(&self.key, event)
        };
        self.transport.appended.notify_waiters();
        Ok(position)
    }

    async fn close(&self) -> Result<(), StreamError> {
        self.transport.record(StreamCall::CloseSender);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeReceiver {
    transport: FakeStreamTransport,
    key: String,
    next: StreamPosition,
    closed: bool,
}

impl FakeReceiver {
    fn take(&mut self, max: usize) -> Result<Vec<ReceivedEvent>, StreamError> {
        let mut state = self.transport.lock();
        if state.fatal_receives {
            return Err(StreamError::Unauthorized("receive denied by test".to_string()));
        }
        if state.fail_receives > 0 {
            state.fail_receives -= 1;
            return Err(StreamError::Unavailable("injected receive failure".to_string()));
        }
        let start = self.next.sequence() as usize;
        let batch: Vec<ReceivedEvent> = state
            .partitions
            .get(&self.key)
            .map(|events| events.iter().skip(start).take(max).cloned().collect())
            .unwrap_or_default();
        if let Some(last) = batch.last() {
            self.next = last.position.next();
        }
        Ok(batch)
    }
}

#[async_trait]
impl PartitionReceiver for FakeReceiver {
    async fn receive(
        &mut self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedEvent>, StreamError> {
        if self.closed {
            return Err(StreamError::Closed("receiver".to_string()));
        }

        let appended = Arc::clone(&self.transport.appended);
        let notified = appended.notified();
        tokio::pin!(notified);
        // Register before checking so an append in between still wakes us
        notified.as_mut().enable();

        let batch = self.take(max)?;
        if !batch.is_empty() {
            return Ok(batch);
        }
        if tokio::time::timeout(wait, notified).await.is_err() {
            return Ok(Vec::new());
        }
        self.take(max)
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.transport.record(StreamCall::CloseReceiver);
        let hang = self.transport.lock().hang_receiver_close;
        if hang {
            std::future::pending::<()>().await;
        }
        if !self.closed {
            self.closed = true;
            let mut state = self.transport.lock();
            state.open_receivers = state.open_receivers.saturating_sub(1);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
