// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the subscription engine.
//!
//! Errors are categorized by the lifecycle step that produced them and
//! carry enough context to identify the subscription involved.
//!
//! # Error Categories
//!
//! | Error Type | Fatal | Description |
//! |------------|-------|-------------|
//! | `Resolution` | Yes | Metadata lookup call failed |
//! | `MetadataParse` | Yes | Metadata record body not parseable |
//! | `Subscribe` | Yes | Channel subscribe call failed |
//! | `Fetch` | Yes | Snapshot fetch call failed |
//! | `NotFound` | Yes | Document missing at fetch time |
//! | `MessageParse` | No | One delivered message body not parseable |
//! | `Unsubscribe` | Yes | Channel unsubscribe call failed |
//! | `FeedClosed` | Yes | Shared message feed closed while subscribed |
//!
//! # Fatality
//!
//! Use [`SubscriptionError::is_fatal()`] to distinguish terminal errors
//! from per-message ones. A fatal error is emitted at most once; after it
//! the subscription transitions to `Failed` and its event channel closes.
//! A `MessageParse` error only concerns the one malformed message; the
//! channel subscription stays up and later messages keep flowing.
//!
//! None of these are retried internally. Retry policy belongs to the
//! caller; this component owns ordering and state correctness.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Result type alias for subscription operations.
pub type Result<T> = std::result::Result<T, SubscriptionError>;

/// Result type for collaborator (metadata store, pub/sub, document store)
/// calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Type alias for boxed async futures returned by collaborator traits
/// (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send + 'a>>;

/// Simplified error for collaborator operations.
///
/// Collaborators report failures as plain messages; the coordinator wraps
/// them into the [`SubscriptionError`] variant for the step that failed.
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

/// Errors surfaced on a subscription's event stream.
///
/// Each variant names the lifecycle step that failed. Use
/// [`is_fatal()`](Self::is_fatal) to check whether the subscription is
/// terminated by the error.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    /// Metadata lookup call failed.
    ///
    /// The key/metadata store could not resolve the subscription id.
    /// Fatal - the subscription never reaches the channel.
    #[error("Metadata lookup error ({id}): {message}")]
    Resolution { id: String, message: String },

    /// Metadata record body failed to parse.
    ///
    /// The lookup succeeded but the record is not a valid metadata
    /// document. Fatal - the record is malformed at the source.
    #[error("Metadata record for \"{id}\" is not parseable: {source}")]
    MetadataParse {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Channel subscribe call failed.
    #[error("Subscribe error ({channel}): {message}")]
    Subscribe { channel: String, message: String },

    /// Snapshot fetch call failed.
    ///
    /// The document store reported a failure (as opposed to a clean
    /// "no such document", which is [`NotFound`](Self::NotFound)).
    #[error("Fetch error ({collection}.{document_id}): {message}")]
    Fetch {
        collection: String,
        document_id: String,
        message: String,
    },

    /// The document was not found at fetch time.
    ///
    /// Distinct and application-visible - never reported as an empty
    /// snapshot.
    #[error("Document \"{collection}.{document_id}\" not found")]
    NotFound {
        collection: String,
        document_id: String,
    },

    /// A delivered message body failed to parse.
    ///
    /// NOT fatal. The malformed message is dropped, the error is emitted
    /// for it, and the channel subscription keeps running.
    #[error("Message on \"{channel}\" is not parseable: {source}")]
    MessageParse {
        channel: String,
        #[source]
        source: serde_json::Error,
    },

    /// Channel unsubscribe call failed during teardown.
    #[error("Unsubscribe error ({channel}): {message}")]
    Unsubscribe { channel: String, message: String },

    /// The shared message feed closed while the subscription was live.
    ///
    /// The transport dropped its delivery side; no further messages can
    /// arrive. Fatal.
    #[error("Message feed closed ({channel})")]
    FeedClosed { channel: String },
}

impl SubscriptionError {
    /// Check whether this error terminates the subscription.
    ///
    /// Everything except a per-message parse failure is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MessageParse { .. })
    }

    /// Short stable label for the error category (used in metrics).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "resolution",
            Self::MetadataParse { .. } => "metadata_parse",
            Self::Subscribe { .. } => "subscribe",
            Self::Fetch { .. } => "fetch",
            Self::NotFound { .. } => "not_found",
            Self::MessageParse { .. } => "message_parse",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::FeedClosed { .. } => "feed_closed",
        }
    }
}
