// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pub/sub transport seam: channel subscribe/unsubscribe plus a shared
//! message feed.
//!
//! The transport multiplexes many channels over one connection, so the
//! feed is SHARED: every subscriber sees `(channel, body)` pairs for all
//! traffic on the connection and filters by its own channel. That
//! filtering responsibility lives with the consumer (the coordinator),
//! not here.
//!
//! The feed receiver must be obtained BEFORE `subscribe()` is issued, so
//! no message published after the subscribe ack can be structurally
//! missed.
//!
//! Connection management, reconnection, and delivery retries are the
//! transport's own concern and out of scope for this crate.

use crate::error::BoxFuture;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// One unit of change delivered over a channel, parsed from a message
/// body. Opaque to the engine beyond being orderable by arrival.
pub type ChangeOp = serde_json::Value;

/// A raw transport message: the channel it was published on plus the
/// unparsed body.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub channel: String,
    pub body: Vec<u8>,
}

impl RawMessage {
    pub fn new(channel: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: channel.into(),
            body: body.into(),
        }
    }
}

/// Trait defining what we need from the pub/sub transport.
///
/// This trait allows testing with mocks and decouples us from any concrete
/// message bus.
pub trait PubSub: Send + Sync + 'static {
    /// Subscribe to a channel. Resolves when the transport acknowledges.
    fn subscribe(&self, channel: &str) -> BoxFuture<'_, ()>;

    /// Unsubscribe from a channel. Resolves when the transport acknowledges.
    fn unsubscribe(&self, channel: &str) -> BoxFuture<'_, ()>;

    /// Attach a listener to the shared message feed.
    ///
    /// The receiver yields every message delivered on this transport
    /// connection, for any channel; consumers filter by channel.
    fn messages(&self) -> broadcast::Receiver<RawMessage>;
}

/// In-memory pub/sub bus for testing and standalone use.
///
/// A thin wrapper around [`tokio::sync::broadcast`]. [`publish`]
/// delivers to every attached listener regardless of channel, matching
/// the shared-connection semantics consumers must filter against.
///
/// [`publish`]: InMemoryPubSub::publish
pub struct InMemoryPubSub {
    tx: broadcast::Sender<RawMessage>,
    subscribed: Mutex<HashSet<String>>,
}

impl InMemoryPubSub {
    /// Create a bus with the given feed capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            subscribed: Mutex::new(HashSet::new()),
        }
    }

    /// Publish a message to all attached listeners.
    ///
    /// Returns the number of listeners that received it.
    pub fn publish(&self, channel: &str, body: impl Into<Vec<u8>>) -> usize {
        self.tx
            .send(RawMessage::new(channel, body))
            .unwrap_or(0)
    }

    /// Publish a JSON value as a message body.
    pub fn publish_json(&self, channel: &str, value: &serde_json::Value) -> usize {
        let body = serde_json::to_vec(value).expect("value serializes");
        self.publish(channel, body)
    }

    /// Channels currently subscribed on this bus.
    pub fn subscribed_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> =
            self.subscribed.lock().unwrap().iter().cloned().collect();
        channels.sort();
        channels
    }
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl PubSub for InMemoryPubSub {
    fn subscribe(&self, channel: &str) -> BoxFuture<'_, ()> {
        let channel = channel.to_string();
        Box::pin(async move {
            self.subscribed.lock().unwrap().insert(channel);
            Ok(())
        })
    }

    fn unsubscribe(&self, channel: &str) -> BoxFuture<'_, ()> {
        let channel = channel.to_string();
        Box::pin(async move {
            // Unsubscribing a channel that was never subscribed acks
            // cleanly, matching typical transport semantics.
            self.subscribed.lock().unwrap().remove(&channel);
            Ok(())
        })
    }

    fn messages(&self) -> broadcast::Receiver<RawMessage> {
        self.tx.subscribe()
    }
}
