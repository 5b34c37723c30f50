//! Subscription lifecycle types.
//!
//! Defines the state machine for one subscription instance and the events
//! it emits.
//!
//! # State Transitions
//!
//! ```text
//!                 open()
//! Created ──────────────────→ Discovering
//!                                  │
//!                                  │ (metadata resolved)
//!                                  ↓
//!                             Subscribing
//!                                  │
//!                                  │ (subscribe acked)
//!                                  ↓
//!                             Subscribed ──── destroy() ───→ Unsubscribing
//!                                  │                              │
//!                                  │                              │ (unsubscribe acked)
//!                 (fatal error,    │                              ↓
//!                  any non-        ↓                         Unsubscribed
//!                  terminal state) Failed
//! ```
//!
//! # State Descriptions
//!
//! - **Created**: instance constructed, worker not yet running.
//! - **Discovering**: resolving the subscription id to document metadata.
//! - **Subscribing**: metadata resolved; channel subscribe in flight with
//!   the message listener already attached.
//! - **Subscribed**: subscribe acked; snapshot fetch in flight or done,
//!   change ops flowing (buffered until the snapshot is emitted).
//! - **Unsubscribing**: teardown requested; channel unsubscribe in flight,
//!   buffered ops and snapshot discarded.
//! - **Unsubscribed**: clean teardown complete. Terminal.
//! - **Failed**: a fatal error was emitted. Terminal.
//!
//! `destroy()` is honored from every non-terminal state; while still
//! `Discovering` it skips straight to `Unsubscribed` since no channel was
//! ever subscribed.

use crate::error::SubscriptionError;
use crate::pubsub::ChangeOp;
use crate::store::Document;

/// Lifecycle state of one subscription instance.
///
/// See module docs for the transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Instance constructed, worker not yet running.
    Created,

    /// Resolving the subscription id to `{document, selector, collection}`.
    Discovering,

    /// Channel subscribe issued, awaiting acknowledgment.
    Subscribing,

    /// Live: fetch in flight or snapshot delivered, ops flowing.
    Subscribed,

    /// Teardown in progress, channel unsubscribe awaiting acknowledgment.
    Unsubscribing,

    /// Clean teardown complete. Terminal.
    Unsubscribed,

    /// A fatal error was emitted. Terminal.
    Failed,
}

impl ReadyState {
    /// Whether no further transitions can occur from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadyState::Unsubscribed | ReadyState::Failed)
    }

    /// Stable label (used in logs and metrics).
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadyState::Created => "Created",
            ReadyState::Discovering => "Discovering",
            ReadyState::Subscribing => "Subscribing",
            ReadyState::Subscribed => "Subscribed",
            ReadyState::Unsubscribing => "Unsubscribing",
            ReadyState::Unsubscribed => "Unsubscribed",
            ReadyState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emission on a subscription's event stream.
///
/// The guaranteed order is: `Payload` exactly once, then `Op` zero or
/// more times in message-arrival order. `Error` carries either a fatal
/// error (terminal - the stream closes right after) or a non-fatal
/// per-message parse failure (the stream continues).
#[derive(Debug)]
pub enum SubscriptionEvent {
    /// The initial snapshot, the baseline all later ops are relative to.
    Payload(Document),

    /// One change op, in arrival order, never before `Payload`.
    Op(ChangeOp),

    /// An error; check [`SubscriptionError::is_fatal`] for terminality.
    Error(SubscriptionError),
}

impl SubscriptionEvent {
    /// Check if this is the snapshot payload.
    pub fn is_payload(&self) -> bool {
        matches!(self, SubscriptionEvent::Payload(_))
    }

    /// Check if this is a change op.
    pub fn is_op(&self) -> bool {
        matches!(self, SubscriptionEvent::Op(_))
    }

    /// Check if this is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, SubscriptionEvent::Error(_))
    }
}
