// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event stream transport adapters
//!
//! A transport opens connections; a connection hands out one sender and any
//! number of receivers for a partition. Receivers are pull-based; the stream
//! client turns them into a push-style pump.

mod local;

pub use local::LocalStreamTransport;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStreamTransport, StreamCall};

use async_trait::async_trait;
use lrep_core::config::StreamIdentity;
use lrep_core::{Classify, ErrorClass, Event, PartitionId, ReceivedEvent, StreamPosition};
use lrep_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Errors from stream operations
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("event of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },
    #[error("stream unavailable: {0}")]
    Unavailable(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("access denied: {0}")]
    Unauthorized(String),
    #[error("unsupported endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("event addressed to partition {found}, sender serves {expected}")]
    PartitionMismatch {
        expected: PartitionId,
        found: PartitionId,
    },
    #[error("{0} is closed")]
    Closed(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Classify for StreamError {
    fn class(&self) -> ErrorClass {
        match self {
            StreamError::Unavailable(_) | StreamError::Timeout(_) => ErrorClass::Transient,
            StreamError::MessageTooLarge { .. }
            | StreamError::Unauthorized(_)
            | StreamError::InvalidEndpoint(_)
            | StreamError::PartitionMismatch { .. } => ErrorClass::Fatal,
            StreamError::Closed(_) => ErrorClass::Shutdown,
            StreamError::Storage(e) => e.class(),
        }
    }
}

/// Reject events over the transport limit instead of truncating them
pub fn check_event_size(event: &Event, limit: usize) -> Result<(), StreamError> {
    let size = event.size_bytes();
    if size > limit {
        return Err(StreamError::MessageTooLarge { size, limit });
    }
    Ok(())
}

/// Reject events addressed to a partition other than the sender's
pub fn check_partition(event: &Event, partition: &PartitionId) -> Result<(), StreamError> {
    if event.partition != *partition {
        return Err(StreamError::PartitionMismatch {
            expected: partition.clone(),
            found: event.partition.clone(),
        });
    }
    Ok(())
}

/// Entry point to an event stream service
#[async_trait]
pub trait StreamTransport: Clone + Send + Sync + 'static {
    type Connection: StreamConnection;

    async fn connect(&self, identity: &StreamIdentity) -> Result<Self::Connection, StreamError>;
}

/// An open, authenticated connection to one stream
#[async_trait]
pub trait StreamConnection: Send + Sync + 'static {
    type Sender: PartitionSender;
    type Receiver: PartitionReceiver;

    async fn create_sender(&self, partition: &PartitionId) -> Result<Self::Sender, StreamError>;

    /// Open a receiver delivering events at and after `position`
    async fn create_receiver(
        &self,
        consumer_group: &str,
        partition: &PartitionId,
        position: StreamPosition,
        identifier: &str,
    ) -> Result<Self::Receiver, StreamError>;

    async fn close(&self) -> Result<(), StreamError>;
}

/// Appends events to a single partition
#[async_trait]
pub trait PartitionSender: Send + Sync + 'static {
    /// Append an event; returns the position it was stored at
    async fn send(&self, event: Event) -> Result<StreamPosition, StreamError>;

    async fn close(&self) -> Result<(), StreamError>;
}

/// Reads events from a single partition in order
#[async_trait]
pub trait PartitionReceiver: Send + 'static {
    /// Wait up to `wait` for at most `max` events; an empty batch means none arrived
    async fn receive(
        &mut self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedEvent>, StreamError>;

    async fn close(&mut self) -> Result<(), StreamError>;
}
