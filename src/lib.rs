// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Subscription Engine
//!
//! A live-document subscription primitive for real-time data-sync layers.
//!
//! Given an opaque subscription id, the engine resolves which stored
//! document the id refers to, subscribes to a change-notification
//! channel for it, retrieves a consistent point-in-time snapshot, and
//! thereafter emits a totally-ordered stream of change ops relative to
//! that snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        subscription-engine                          │
//! │                                                                     │
//! │  ┌───────────────┐    ┌──────────────────────────────────────────┐  │
//! │  │ MetadataStore │───►│ Subscription worker (one task per sub)   │  │
//! │  │ (id → doc)    │    │  Discovering → Subscribing → Subscribed  │  │
//! │  └───────────────┘    └──────────────────┬───────────────────────┘  │
//! │                                          │                          │
//! │  ┌───────────────┐   messages            ▼          ┌────────────┐  │
//! │  │ PubSub        │──────────────► op buffer/replay ─│ event      │  │
//! │  │ (shared feed) │                       ▲          │ stream     │  │
//! │  └───────────────┘                       │          │ (payload,  │  │
//! │  ┌───────────────┐   snapshot fetch      │          │  ops...)   │  │
//! │  │ DocumentStore │───────────────────────┘          └────────────┘  │
//! │  └───────────────┘                                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering Guarantee
//!
//! The event stream is always: one `payload` (the snapshot), then zero
//! or more `op`s in message-arrival order, or a terminal error. Ops
//! that arrive while the snapshot fetch is still in flight are buffered
//! and replayed after the payload; an op is never emitted before it,
//! never twice, and never dropped while the subscription is live.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subscription_engine::{
//!     InMemoryDocumentStore, InMemoryMetadataStore, InMemoryPubSub,
//!     Subscription, SubscriptionConfig, SubscriptionEvent,
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
//!         match event {
//!             SubscriptionEvent::Payload(doc) => println!("snapshot: {doc}"),
//!             SubscriptionEvent::Op(op) => println!("change: {op}"),
//!             SubscriptionEvent::Error(e) => eprintln!("error: {e}"),
//!         }
//!     }
//!
//!     // sub.destroy() tears the channel down; so does dropping `sub`.
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod pubsub;
pub mod store;

// Re-exports for convenience
pub use config::SubscriptionConfig;
pub use coordinator::{OpBuffer, ReadyState, Subscription, SubscriptionEvent};
pub use error::{BackendError, BackendResult, BoxFuture, Result, SubscriptionError};
pub use metadata::{FieldSelector, InMemoryMetadataStore, Metadata, MetadataStore};
pub use pubsub::{ChangeOp, InMemoryPubSub, PubSub, RawMessage};
pub use store::{apply_selector, Document, DocumentStore, InMemoryDocumentStore};
