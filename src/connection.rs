//! Lifecycle of the one-way event channel.
//!
//! The [`StreamConnectionManager`] owns at most one live transport.  Work that happens off the
//! owner's execution context (reading frames, waiting out the reconnect delay) runs in spawned
//! tasks that only ever report back through a [`SignalSink`]; every state change happens in
//! [`StreamConnectionManager::handle`], which the owner calls with `&mut self` one signal at a
//! time.
//!
//! Signals are stamped with the generation of the transport that produced them, so a frame or
//! failure from a transport that was already torn down can never affect the current one.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::observability::{
    STREAM_CONNECTS, STREAM_DROPPED_FRAMES, STREAM_FAILURES, STREAM_FRAMES, STREAM_RECONNECTS,
};
use crate::{Error, Result, StreamEvent};

/// The raw record payloads of one transport, in arrival order.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Where background tasks deliver their [`StreamSignal`]s.
pub type SignalSink = Arc<dyn Fn(StreamSignal) + Send + Sync>;

/// Opens the underlying event channel.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Connects and returns the stream of raw record payloads.
    ///
    /// An `Err` item on the returned stream is a transport failure, except for
    /// [`Error::Encoding`], which costs a single record.  The end of the stream is a failure
    /// too: the channel is expected to stay open for the life of the client.
    async fn connect(&self) -> Result<FrameStream>;
}

/// Connection status, readable by anyone and written only by the manager.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never opened, or closed by the owner.
    Disconnected,
    /// A transport is being established.
    Connecting,
    /// The transport is up and frames are flowing.
    Open,
    /// The transport failed; a reconnect is scheduled.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "error"),
        }
    }
}

/// Reports from the manager's background tasks.
#[derive(Debug)]
pub enum StreamSignal {
    /// The transport of `generation` is up.
    Opened {
        /// Transport generation.
        generation: u64,
    },
    /// A raw record arrived on the transport of `generation`.
    Frame {
        /// Transport generation.
        generation: u64,
        /// The record payload.
        raw: String,
    },
    /// The transport of `generation` failed or ended.
    Failed {
        /// Transport generation.
        generation: u64,
        /// What went wrong.
        error: Error,
    },
    /// The reconnect delay identified by `ticket` elapsed.
    ReconnectDue {
        /// Identifies the scheduled attempt.
        ticket: u64,
    },
}

/// What a handled signal means to the owner.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The channel is open.
    Opened,
    /// The channel failed and a reconnect has been scheduled.
    Failed(Error),
    /// A well-formed event arrived.
    Event(StreamEvent),
}

/// Owns the event channel: connect, detect failure, reconnect after a fixed delay.
pub struct StreamConnectionManager {
    transport: Arc<dyn EventTransport>,
    outbox: SignalSink,
    retry_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
    generation: u64,
    reader: Option<JoinHandle<()>>,
    transport_slot: Arc<Semaphore>,
    reconnect: Option<(u64, JoinHandle<()>)>,
    next_ticket: u64,
}

impl StreamConnectionManager {
    /// Creates a disconnected manager.
    pub fn new(
        transport: Arc<dyn EventTransport>,
        outbox: SignalSink,
        retry_delay: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            outbox,
            retry_delay,
            state_tx,
            generation: 0,
            reader: None,
            transport_slot: Arc::new(Semaphore::new(1)),
            reconnect: None,
            next_ticket: 0,
        }
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watches the connection state.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// True while a reconnect attempt is waiting for its delay.
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_some()
    }

    /// The configured delay between a failure and the next attempt.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Opens the channel, tearing down any existing transport first.
    ///
    /// Aborting the old reader is asynchronous, so the new reader waits for the single transport
    /// slot before it connects.  The slot is released only once the old stream has been dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&mut self) {
        self.teardown();
        self.generation += 1;
        let generation = self.generation;
        self.set_state(ConnectionState::Connecting);
        tracing::debug!(generation, "opening event channel");

        let transport = Arc::clone(&self.transport);
        let outbox = Arc::clone(&self.outbox);
        let slot = Arc::clone(&self.transport_slot);
        self.reader = Some(tokio::spawn(async move {
            let Ok(_slot) = slot.acquire_owned().await else {
                return;
            };
            STREAM_CONNECTS.click();
            let mut frames = match transport.connect().await {
                Ok(frames) => frames,
                Err(error) => {
                    outbox(StreamSignal::Failed { generation, error });
                    return;
                }
            };
            outbox(StreamSignal::Opened { generation });
            loop {
                match frames.next().await {
                    Some(Ok(raw)) => outbox(StreamSignal::Frame { generation, raw }),
                    Some(Err(err)) if err.is_encoding() => {
                        STREAM_DROPPED_FRAMES.click();
                        tracing::warn!(generation, error = %err, "dropping undecodable record");
                    }
                    Some(Err(error)) => {
                        outbox(StreamSignal::Failed { generation, error });
                        return;
                    }
                    None => {
                        let error = Error::streaming("Event stream closed by server", None);
                        outbox(StreamSignal::Failed { generation, error });
                        return;
                    }
                }
            }
        }));
    }

    /// Tears the channel down and stays disconnected.
    pub fn close(&mut self) {
        self.teardown();
        self.generation += 1;
        self.set_state(ConnectionState::Disconnected);
        tracing::debug!("event channel closed");
    }

    /// Applies one signal from a background task.
    ///
    /// Signals from superseded transports and cancelled reconnects are ignored.
    pub fn handle(&mut self, signal: StreamSignal) -> Option<ConnectionEvent> {
        match signal {
            StreamSignal::Opened { generation } => {
                if generation != self.generation {
                    return None;
                }
                tracing::info!(generation, "event channel open");
                self.set_state(ConnectionState::Open);
                Some(ConnectionEvent::Opened)
            }
            StreamSignal::Frame { generation, raw } => {
                if generation != self.generation {
                    return None;
                }
                STREAM_FRAMES.click();
                match serde_json::from_str::<StreamEvent>(&raw) {
                    Ok(event) => {
                        tracing::debug!(kind = event.kind(), "stream event");
                        Some(ConnectionEvent::Event(event))
                    }
                    Err(err) => {
                        STREAM_DROPPED_FRAMES.click();
                        tracing::warn!(error = %err, raw = %raw, "dropping malformed stream event");
                        None
                    }
                }
            }
            StreamSignal::Failed { generation, error } => {
                if generation != self.generation {
                    return None;
                }
                STREAM_FAILURES.click();
                tracing::warn!(generation, error = %error, "event channel failed");
                self.reader = None;
                self.set_state(ConnectionState::Reconnecting);
                self.schedule_reconnect();
                Some(ConnectionEvent::Failed(error))
            }
            StreamSignal::ReconnectDue { ticket } => {
                match self.reconnect.as_ref() {
                    Some((pending, _)) if *pending == ticket => {}
                    _ => return None,
                }
                self.reconnect = None;
                STREAM_RECONNECTS.click();
                tracing::info!(ticket, "reconnecting event channel");
                self.open();
                None
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        self.cancel_reconnect();
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let delay = self.retry_delay;
        let deadline = Instant::now() + delay;
        let outbox = Arc::clone(&self.outbox);
        tracing::debug!(ticket, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            outbox(StreamSignal::ReconnectDue { ticket });
        });
        self.reconnect = Some((ticket, timer));
    }

    fn cancel_reconnect(&mut self) {
        if let Some((ticket, timer)) = self.reconnect.take() {
            tracing::debug!(ticket, "pending reconnect cancelled");
            timer.abort();
        }
    }

    fn teardown(&mut self) {
        self.cancel_reconnect();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

impl Drop for StreamConnectionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for StreamConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnectionManager")
            .field("state", &self.state())
            .field("generation", &self.generation)
            .field("retry_delay", &self.retry_delay)
            .field("reconnect_pending", &self.reconnect_pending())
            .finish()
    }
}
