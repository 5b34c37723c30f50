// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Subscription coordinator.
//!
//! The main lifecycle driver that ties together:
//! - Metadata resolution via [`crate::metadata::MetadataStore`]
//! - Channel subscribe/unsubscribe and the shared message feed via
//!   [`crate::pubsub::PubSub`]
//! - Snapshot fetching via [`crate::store::DocumentStore`]
//!
//! # Architecture
//!
//! Each [`Subscription`] owns one worker task that walks the lifecycle:
//! 1. Resolves the subscription id to document metadata
//! 2. Attaches the message listener, then subscribes to the channel
//! 3. Fetches the snapshot while change messages stream in concurrently
//! 4. Emits `payload` then ops, in message-arrival order
//!
//! The worker is the SINGLE WRITER for all lifecycle state: every
//! transition, buffer mutation, and snapshot decision happens on that
//! task. External completions (lookup, acks, fetch, each message) are
//! its suspension points, raced through `tokio::select!` with the
//! destroy signal checked first, so a teardown observed at any
//! suspension point prevents later completions from taking effect.
//!
//! # Fetch/Buffer Race
//!
//! Messages may arrive while the snapshot fetch is still in flight.
//! Until the payload is emitted, accepted ops land in an
//! [`OpBuffer`]; the moment the fetch resolves the
//! worker emits the payload, replays the buffer FIFO, and switches to
//! live delivery. Callers therefore always observe the snapshot first
//! and every op afterward, in arrival order, whatever the fetch latency.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subscription_engine::{
//!     InMemoryDocumentStore, InMemoryMetadataStore, InMemoryPubSub,
//!     Subscription, SubscriptionConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let metadata = Arc::new(InMemoryMetadataStore::new());
//!     let pubsub = Arc::new(InMemoryPubSub::default());
//!     let documents = Arc::new(InMemoryDocumentStore::new());
//!
//!     let mut sub = Subscription::open(
//!         "sub-1",
//!         metadata,
//!         pubsub,
//!         documents,
//!         SubscriptionConfig::default(),
//!     );
//!
//!     while let Some(event) = sub.next_event().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```

mod buffer;
mod types;

pub use buffer::OpBuffer;
pub use types::{ReadyState, SubscriptionEvent};

use crate::config::SubscriptionConfig;
use crate::error::{BackendResult, SubscriptionError};
use crate::metadata::{Metadata, MetadataStore};
use crate::metrics;
use crate::pubsub::{ChangeOp, PubSub, RawMessage};
use crate::store::{Document, DocumentStore};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn, Instrument};

/// A live-document subscription.
///
/// Created with [`open()`](Self::open); consumed by reading
/// [`next_event()`](Self::next_event) until it returns `None` (terminal
/// state reached) or indefinitely on the success path. Request teardown
/// with [`destroy()`](Self::destroy); dropping the handle requests the
/// same teardown implicitly.
pub struct Subscription {
    /// Subscription id; doubles as the pub/sub channel name.
    id: String,

    /// Ordered event stream: payload, then ops, or errors.
    events: mpsc::Receiver<SubscriptionEvent>,

    /// Lifecycle state (broadcast to watchers).
    state_rx: watch::Receiver<ReadyState>,

    /// Teardown signal sender.
    destroy_tx: watch::Sender<bool>,
}

impl Subscription {
    /// Open a subscription for `id` and begin metadata resolution.
    ///
    /// Returns immediately; progress and failures are observed through
    /// the event stream and [`state_receiver()`](Self::state_receiver).
    pub fn open(
        id: impl Into<String>,
        metadata_store: Arc<dyn MetadataStore>,
        pubsub: Arc<dyn PubSub>,
        documents: Arc<dyn DocumentStore>,
        config: SubscriptionConfig,
    ) -> Self {
        let id = id.into();
        let (state_tx, state_rx) = watch::channel(ReadyState::Created);
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (destroy_tx, destroy_rx) = watch::channel(false);

        metrics::record_opened();

        let worker = Worker {
            id: id.clone(),
            metadata_store,
            pubsub,
            documents,
            state_tx,
            events_tx,
            phase: DeliveryPhase::Buffering(OpBuffer::with_capacity(config.op_buffer_capacity)),
        };

        let span = tracing::info_span!("subscription", id = %id);
        let _ = tokio::spawn(worker.run(destroy_rx).instrument(span));

        Self {
            id,
            events: events_rx,
            state_rx,
            destroy_tx,
        }
    }

    /// The subscription id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReadyState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ReadyState> {
        self.state_rx.clone()
    }

    /// Whether the subscription has not yet reached a terminal state.
    pub fn is_active(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Receive the next event.
    ///
    /// `None` means the stream is finished: either teardown completed or
    /// a fatal error was emitted (the error itself arrives as the last
    /// event before `None`).
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.events.recv().await
    }

    /// Request teardown.
    ///
    /// Idempotent: calling it again after the first effective call, or
    /// after a terminal state, is a no-op. Teardown completion is
    /// observed as state `Unsubscribed` (or `Failed` if the unsubscribe
    /// call itself fails).
    pub fn destroy(&self) {
        let _ = self.destroy_tx.send(true);
    }
}

/// How accepted ops are currently delivered.
///
/// `Buffering` holds the pending-op buffer that exists only between
/// subscribe-ack and snapshot emission; the transition to `Live` happens
/// exactly once, when the buffer is replayed.
enum DeliveryPhase {
    Buffering(OpBuffer),
    Live,
}

/// Loop control for the worker's event handlers.
enum Flow {
    Continue,
    Stop,
}

/// The single-writer worker behind one subscription.
struct Worker {
    id: String,
    metadata_store: Arc<dyn MetadataStore>,
    pubsub: Arc<dyn PubSub>,
    documents: Arc<dyn DocumentStore>,
    state_tx: watch::Sender<ReadyState>,
    events_tx: mpsc::Sender<SubscriptionEvent>,
    phase: DeliveryPhase,
}

impl Worker {
    /// Drive the lifecycle to a terminal state.
    async fn run(mut self, mut destroy_rx: watch::Receiver<bool>) {
        // ── Discovering ──────────────────────────────────────────────
        self.set_state(ReadyState::Discovering);

        let lookup = tokio::select! {
            biased;
            _ = destroyed(&mut destroy_rx) => {
                // Nothing was subscribed yet, so there is nothing to
                // unwind; the lookup result is simply abandoned.
                debug!("destroy requested during discovery");
                self.set_state(ReadyState::Unsubscribed);
                metrics::record_destroyed();
                return;
            }
            result = self.metadata_store.get(&self.id) => result,
        };

        let raw = match lookup {
            Ok(raw) => raw,
            Err(e) => {
                return self
                    .fail(SubscriptionError::Resolution {
                        id: self.id.clone(),
                        message: e.to_string(),
                    })
                    .await;
            }
        };
        let metadata = match Metadata::from_bytes(&self.id, &raw) {
            Ok(metadata) => metadata,
            Err(e) => return self.fail(e).await,
        };
        debug!(
            collection = %metadata.collection,
            document_id = %metadata.document_id,
            "resolved metadata"
        );

        // ── Subscribing ──────────────────────────────────────────────
        self.set_state(ReadyState::Subscribing);

        // Listener must be attached before the subscribe is issued so no
        // message delivered after the ack can be missed.
        let mut feed = self.pubsub.messages();

        let ack = tokio::select! {
            biased;
            _ = destroyed(&mut destroy_rx) => None,
            result = self.pubsub.subscribe(&self.id) => Some(result),
        };
        let Some(ack) = ack else {
            return self.teardown().await;
        };
        if let Err(e) = ack {
            return self
                .fail(SubscriptionError::Subscribe {
                    channel: self.id.clone(),
                    message: e.to_string(),
                })
                .await;
        }

        // ── Subscribed ───────────────────────────────────────────────
        self.set_state(ReadyState::Subscribed);

        let mut fetch = {
            let documents = Arc::clone(&self.documents);
            let collection = metadata.collection.clone();
            let document_id = metadata.document_id.clone();
            let selector = metadata.field_selector.clone();
            Box::pin(async move {
                documents
                    .find_by_id(&collection, &document_id, &selector)
                    .await
            })
        };
        let mut fetched = false;

        // Messages are drained ahead of the fetch completion so that
        // everything already delivered lands in the buffer in arrival
        // order before the payload is emitted.
        loop {
            tokio::select! {
                biased;
                _ = destroyed(&mut destroy_rx) => return self.teardown().await,
                message = feed.recv() => {
                    if let Flow::Stop = self.handle_delivery(message).await {
                        return;
                    }
                }
                result = &mut fetch, if !fetched => {
                    fetched = true;
                    if let Flow::Stop = self.handle_fetch(result, &metadata).await {
                        return;
                    }
                }
            }
        }
    }

    /// Handle the snapshot fetch completing.
    ///
    /// On success: emit the payload, replay the buffer FIFO, switch to
    /// live delivery. A missing document is a distinct, fatal error,
    /// never an empty payload.
    async fn handle_fetch(
        &mut self,
        result: BackendResult<Option<Document>>,
        metadata: &Metadata,
    ) -> Flow {
        let document = match result {
            Ok(Some(document)) => document,
            Ok(None) => {
                self.fail(SubscriptionError::NotFound {
                    collection: metadata.collection.clone(),
                    document_id: metadata.document_id.clone(),
                })
                .await;
                return Flow::Stop;
            }
            Err(e) => {
                self.fail(SubscriptionError::Fetch {
                    collection: metadata.collection.clone(),
                    document_id: metadata.document_id.clone(),
                    message: e.to_string(),
                })
                .await;
                return Flow::Stop;
            }
        };

        debug!(
            collection = %metadata.collection,
            document_id = %metadata.document_id,
            "retrieved document"
        );
        metrics::record_payload();
        if !self.emit(SubscriptionEvent::Payload(document)).await {
            self.teardown().await;
            return Flow::Stop;
        }

        let buffered = match std::mem::replace(&mut self.phase, DeliveryPhase::Live) {
            DeliveryPhase::Buffering(mut buffer) => buffer.drain(),
            DeliveryPhase::Live => Vec::new(),
        };
        if !buffered.is_empty() {
            debug!(count = buffered.len(), "replaying buffered ops");
        }
        for op in buffered {
            metrics::record_op("buffered");
            if !self.emit(SubscriptionEvent::Op(op)).await {
                self.teardown().await;
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Handle one feed delivery (or feed error).
    async fn handle_delivery(&mut self, message: Result<RawMessage, RecvError>) -> Flow {
        let message = match message {
            Ok(message) => message,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "message feed lagged, deliveries were dropped");
                metrics::record_feed_lagged(skipped);
                return Flow::Continue;
            }
            Err(RecvError::Closed) => {
                self.fail(SubscriptionError::FeedClosed {
                    channel: self.id.clone(),
                })
                .await;
                return Flow::Stop;
            }
        };

        // The feed is shared across every subscription on the transport
        // connection; only our own channel's traffic is relevant.
        if message.channel != self.id {
            trace!(channel = %message.channel, "ignoring message for other channel");
            metrics::record_message_filtered();
            return Flow::Continue;
        }

        let op: ChangeOp = match serde_json::from_slice(&message.body) {
            Ok(op) => op,
            Err(source) => {
                let error = SubscriptionError::MessageParse {
                    channel: self.id.clone(),
                    source,
                };
                warn!(error = %error, "dropping malformed message");
                metrics::record_error(error.kind());
                // Per-message failure: surfaced, but the channel stays up
                // and later messages keep flowing.
                if !self.emit(SubscriptionEvent::Error(error)).await {
                    self.teardown().await;
                    return Flow::Stop;
                }
                return Flow::Continue;
            }
        };

        match &mut self.phase {
            DeliveryPhase::Buffering(buffer) => {
                buffer.push(op);
                trace!(buffered = buffer.len(), "buffered op until snapshot");
            }
            DeliveryPhase::Live => {
                metrics::record_op("live");
                if !self.emit(SubscriptionEvent::Op(op)).await {
                    self.teardown().await;
                    return Flow::Stop;
                }
            }
        }
        Flow::Continue
    }

    /// Tear down a subscription that reached at least `Subscribing`.
    ///
    /// Buffered ops and the snapshot are discarded before the
    /// unsubscribe is issued; nothing is emitted afterward. Dropping the
    /// feed receiver (when the worker returns) detaches the listener.
    async fn teardown(&mut self) {
        self.set_state(ReadyState::Unsubscribing);

        if let DeliveryPhase::Buffering(buffer) = &mut self.phase {
            if !buffer.is_empty() {
                debug!(dropped = buffer.len(), "discarding buffered ops");
            }
            buffer.clear();
        }
        self.phase = DeliveryPhase::Live;

        match self.pubsub.unsubscribe(&self.id).await {
            Ok(()) => {
                debug!("unsubscribed");
                self.set_state(ReadyState::Unsubscribed);
                metrics::record_destroyed();
            }
            Err(e) => {
                self.fail(SubscriptionError::Unsubscribe {
                    channel: self.id.clone(),
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Emit a fatal error and move to `Failed`.
    ///
    /// The worker returns right after, so any still-pending completion
    /// is dropped with it and can never take effect.
    async fn fail(&mut self, error: SubscriptionError) {
        warn!(error = %error, "subscription failed");
        metrics::record_error(error.kind());
        if let DeliveryPhase::Buffering(buffer) = &mut self.phase {
            buffer.clear();
        }
        let _ = self.events_tx.send(SubscriptionEvent::Error(error)).await;
        self.set_state(ReadyState::Failed);
    }

    /// Send an event to the caller. `false` means the handle is gone.
    async fn emit(&self, event: SubscriptionEvent) -> bool {
        self.events_tx.send(event).await.is_ok()
    }

    fn set_state(&self, state: ReadyState) {
        trace!(state = %state, "state changed");
        metrics::set_ready_state(state.as_str());
        let _ = self.state_tx.send(state);
    }
}

/// Resolve when teardown is requested.
///
/// A dropped [`Subscription`] handle counts as a teardown request: with
/// no one left to observe events, keeping the channel subscribed would
/// only leak it.
async fn destroyed(rx: &mut watch::Receiver<bool>) {
    if *rx.borrow() {
        return;
    }
    loop {
        if rx.changed().await.is_err() {
            return;
        }
        if *rx.borrow() {
            return;
        }
    }
}
