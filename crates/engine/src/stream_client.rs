// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event stream client: one sender and at most one receiver on one partition
//!
//! Lifecycle:
//!
//! ```text
//! Created --start_processing--> Started <--suspend/start--> Suspended
//!    |                             |                            |
//!    +----------shutdown-----------+----------shutdown----------+--> Disposed
//! ```
//!
//! `startup` opens the connection and sender without changing state;
//! sending works from then until `shutdown`.

use async_trait::async_trait;
use lrep_adapters::stream::{check_event_size, check_partition};
use lrep_adapters::{
    PartitionReceiver, PartitionSender, StreamConnection, StreamError, StreamTransport,
};
use lrep_core::config::StreamConfig;
use lrep_core::{
    Classify, ConfigError, ErrorClass, Event, OperationContext, ReceivedEvent, StreamPosition,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Batch size handlers get unless they ask for another
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Pause after a transient receive error before receiving again
const RECEIVE_ERROR_PAUSE: Duration = Duration::from_millis(50);

type Connection<T> = <T as StreamTransport>::Connection;
type Sender<T> = <Connection<T> as StreamConnection>::Sender;
type Receiver<T> = <Connection<T> as StreamConnection>::Receiver;

/// Errors from the stream client
#[derive(Debug, Error)]
pub enum StreamClientError {
    #[error("stream client has not been started")]
    NotStarted,
    #[error("stream client has been shut down")]
    Disposed,
    #[error("operation cancelled")]
    Cancelled,
    #[error("receiver did not close within {0:?}")]
    CloseTimeout(Duration),
    #[error("receive pump failed: {0}")]
    Pump(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl Classify for StreamClientError {
    fn class(&self) -> ErrorClass {
        match self {
            StreamClientError::NotStarted | StreamClientError::Pump(_) => ErrorClass::Fatal,
            StreamClientError::Disposed | StreamClientError::Cancelled => ErrorClass::Shutdown,
            StreamClientError::CloseTimeout(_) => ErrorClass::Transient,
            StreamClientError::Config(e) => e.class(),
            StreamClientError::Stream(e) => e.class(),
        }
    }
}

/// Where the client is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    Created,
    Started,
    Suspended,
    Disposed,
}

/// Consumer of received events
///
/// Batches arrive in stream order, one at a time.
#[async_trait]
pub trait ReceiveHandler: Send + Sync + 'static {
    /// Largest batch the handler wants; capped by the client configuration
    fn max_batch_size(&self) -> usize {
        DEFAULT_MAX_BATCH_SIZE
    }

    async fn process_events(&self, events: Vec<ReceivedEvent>);

    /// Called for every receive failure, transient or not
    async fn process_error(&self, error: &StreamError);
}

/// Handler that forwards events into a channel
pub struct ChannelHandler {
    events: mpsc::UnboundedSender<ReceivedEvent>,
    max_batch_size: usize,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReceivedEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                events,
                max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            },
            rx,
        )
    }

    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }
}

#[async_trait]
impl ReceiveHandler for ChannelHandler {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn process_events(&self, events: Vec<ReceivedEvent>) {
        for event in events {
            if self.events.send(event).is_err() {
                tracing::debug!("event channel closed, dropping batch");
                return;
            }
        }
    }

    async fn process_error(&self, error: &StreamError) {
        tracing::warn!(error = %error, class = %error.class(), "receive error");
    }
}

struct Pump<R> {
    stop: CancellationToken,
    task: JoinHandle<R>,
}

struct Inner<T: StreamTransport> {
    state: ClientState,
    connection: Option<Connection<T>>,
    pump: Option<Pump<Receiver<T>>>,
}

/// Client for one partition of one event stream
pub struct EventStreamClient<T: StreamTransport> {
    transport: T,
    config: StreamConfig,
    receiver_id: String,
    shutting_down: AtomicBool,
    /// Outside `inner` so sends never wait behind a slow suspend
    sender: Mutex<Option<Arc<Sender<T>>>>,
    inner: tokio::sync::Mutex<Inner<T>>,
}

impl<T: StreamTransport> EventStreamClient<T> {
    pub fn new(transport: T, config: StreamConfig) -> Self {
        Self {
            transport,
            config,
            receiver_id: uuid::Uuid::new_v4().to_string(),
            shutting_down: AtomicBool::new(false),
            sender: Mutex::new(None),
            inner: tokio::sync::Mutex::new(Inner {
                state: ClientState::Created,
                connection: None,
                pump: None,
            }),
        }
    }

    /// Identifier this client's receivers present to the stream
    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub async fn state(&self) -> ClientState {
        self.inner.lock().await.state
    }

    /// Whether a receive pump is running
    pub async fn is_processing(&self) -> bool {
        self.inner
            .lock()
            .await
            .pump
            .as_ref()
            .is_some_and(|pump| !pump.task.is_finished())
    }

    /// Connect and open the partition sender
    ///
    /// Calling it again after a successful startup does nothing. If the
    /// sender cannot be created the connection is closed again.
    pub async fn startup(&self, ctx: &OperationContext) -> Result<(), StreamClientError> {
        let mut inner = self.inner.lock().await;
        if inner.state == ClientState::Disposed {
            return Err(StreamClientError::Disposed);
        }
        if inner.connection.is_some() {
            return Ok(());
        }
        if ctx.is_cancelled() {
            return Err(StreamClientError::Cancelled);
        }

        let identity = self.config.identity()?;
        let connection = self.transport.connect(&identity).await?;
        let sender = match connection.create_sender(&self.config.partition_id).await {
            Ok(sender) => sender,
            Err(e) => {
                tracing::error!(error = %e, "sender creation failed, closing connection");
                if let Err(close) = connection.close().await {
                    tracing::warn!(error = %close, "connection close failed");
                }
                return Err(e.into());
            }
        };

        *self.sender_slot() = Some(Arc::new(sender));
        inner.connection = Some(connection);
        tracing::info!(
            entity = %identity.entity_path,
            partition = %self.config.partition_id,
            "stream client started"
        );
        Ok(())
    }

    /// Start delivering events at `position` to `handler`
    ///
    /// Does nothing if processing is already running. A pump that stopped on
    /// its own is closed and replaced.
    pub async fn start_processing(
        &self,
        ctx: &OperationContext,
        position: StreamPosition,
        handler: Arc<dyn ReceiveHandler>,
    ) -> Result<(), StreamClientError> {
        let mut inner = self.inner.lock().await;
        if inner.state == ClientState::Disposed {
            return Err(StreamClientError::Disposed);
        }
        if inner
            .pump
            .as_ref()
            .is_some_and(|pump| !pump.task.is_finished())
        {
            tracing::debug!("already processing");
            return Ok(());
        }
        if inner.pump.is_some() {
            // Pump stopped on a fatal receive error; reap it before restarting
            self.suspend_locked(&mut inner).await?;
        }
        if ctx.is_cancelled() {
            return Err(StreamClientError::Cancelled);
        }
        let Some(connection) = inner.connection.as_ref() else {
            return Err(StreamClientError::NotStarted);
        };

        let receiver = connection
            .create_receiver(
                &self.config.consumer_group,
                &self.config.partition_id,
                position,
                &self.receiver_id,
            )
            .await?;

        let stop = CancellationToken::new();
        let batch = handler.max_batch_size().clamp(1, self.config.max_batch_size.max(1));
        let task = tokio::spawn(pump(
            receiver,
            handler,
            stop.clone(),
            batch,
            self.config.receive_wait,
        ));
        inner.pump = Some(Pump { stop, task });
        inner.state = ClientState::Started;
        tracing::info!(position = %position, batch, "processing started");
        Ok(())
    }

    /// Stop delivering events and close the receiver
    ///
    /// Does nothing if processing is not running. A pump that does not stop
    /// and close its receiver within the configured timeout is abandoned and
    /// reported.
    pub async fn suspend_processing(&self, _ctx: &OperationContext) -> Result<(), StreamClientError> {
        let mut inner = self.inner.lock().await;
        if inner.state == ClientState::Disposed {
            return Err(StreamClientError::Disposed);
        }
        self.suspend_locked(&mut inner).await
    }

    /// Publish one event to the partition
    ///
    /// A failure caused by shutdown or by cancelling `ctx` is swallowed: the
    /// event is presumed not delivered and nothing is queued for later.
    pub async fn send(&self, ctx: &OperationContext, event: Event) -> Result<(), StreamClientError> {
        if ctx.is_cancelled() {
            return Err(StreamClientError::Cancelled);
        }
        let sender = self.sender_slot().clone();
        let Some(sender) = sender else {
            if self.shutting_down.load(Ordering::SeqCst) {
                return Err(StreamClientError::Disposed);
            }
            return Err(StreamClientError::NotStarted);
        };
        check_event_size(&event, self.config.max_event_bytes)?;
        check_partition(&event, &self.config.partition_id)?;

        let result = tokio::select! {
            result = sender.send(event) => result,
            _ = ctx.cancelled() => {
                tracing::debug!("send cancelled; event presumed not delivered");
                return Ok(());
            }
        };
        match result {
            Ok(position) => {
                tracing::trace!(position = %position, "event sent");
                Ok(())
            }
            Err(e) if ctx.is_cancelled() || self.shutting_down.load(Ordering::SeqCst) => {
                tracing::debug!(error = %e, "send interrupted by shutdown; event presumed not delivered");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Suspend processing, then close the sender and the connection
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned. Later calls do nothing.
    pub async fn shutdown(&self, _ctx: &OperationContext) -> Result<(), StreamClientError> {
        self.shutting_down.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        if inner.state == ClientState::Disposed {
            return Ok(());
        }

        let mut first_error = None;
        if let Err(e) = self.suspend_locked(&mut inner).await {
            tracing::warn!(error = %e, "suspend during shutdown failed");
            first_error.get_or_insert(e);
        }

        let sender = self.sender_slot().take();
        if let Some(sender) = sender {
            if let Err(e) = sender.close().await {
                tracing::warn!(error = %e, "sender close failed");
                first_error.get_or_insert(e.into());
            }
        }
        if let Some(connection) = inner.connection.take() {
            if let Err(e) = connection.close().await {
                tracing::warn!(error = %e, "connection close failed");
                first_error.get_or_insert(e.into());
            }
        }

        inner.state = ClientState::Disposed;
        tracing::info!("stream client shut down");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn suspend_locked(&self, inner: &mut Inner<T>) -> Result<(), StreamClientError> {
        let Some(pump) = inner.pump.take() else {
            return Ok(());
        };
        inner.state = ClientState::Suspended;

        let Pump { stop, mut task } = pump;
        stop.cancel();

        // Joining the pump and closing the receiver share one budget; a
        // handler stuck in process_events counts against it too
        let limit = self.config.receiver_close_timeout;
        let stopped = tokio::time::timeout(limit, async {
            let mut receiver = (&mut task)
                .await
                .map_err(|e| StreamClientError::Pump(e.to_string()))?;
            receiver.close().await.map_err(StreamClientError::from)
        })
        .await;

        match stopped {
            Ok(Ok(())) => {
                tracing::info!("processing suspended");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                task.abort();
                tracing::error!(timeout_ms = limit.as_millis() as u64, "receiver close timed out");
                Err(StreamClientError::CloseTimeout(limit))
            }
        }
    }

    fn sender_slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<Sender<T>>>> {
        self.sender.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Receive loop; hands the receiver back when stopped so it can be closed
async fn pump<R: PartitionReceiver>(
    mut receiver: R,
    handler: Arc<dyn ReceiveHandler>,
    stop: CancellationToken,
    batch: usize,
    wait: Duration,
) -> R {
    loop {
        let received = tokio::select! {
            _ = stop.cancelled() => break,
            received = receiver.receive(batch, wait) => received,
        };
        match received {
            Ok(events) if events.is_empty() => {}
            Ok(events) => handler.process_events(events).await,
            Err(e) => {
                handler.process_error(&e).await;
                if e.class() != ErrorClass::Transient {
                    tracing::error!(error = %e, class = %e.class(), "receive failed, pump stopped");
                    break;
                }
                tracing::debug!(error = %e, "transient receive failure");
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(RECEIVE_ERROR_PAUSE) => {}
                }
            }
        }
    }
    receiver
}

#[cfg(test)]
#[path = "stream_client_tests.rs"]
mod tests;
