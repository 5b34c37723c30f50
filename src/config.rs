//! Configuration for subscription instances.
//!
//! A [`SubscriptionConfig`] is passed to
//! [`Subscription::open()`](crate::coordinator::Subscription::open) and
//! can be constructed programmatically or deserialized from YAML/JSON.
//! All fields have sensible defaults, so `SubscriptionConfig::default()`
//! is the common case.
//!
//! # YAML Example
//!
//! ```yaml
//! event_capacity: 64
//! op_buffer_capacity: 16
//! ```

use serde::{Deserialize, Serialize};

/// Tunable parameters for a single subscription instance.
///
/// These only size internal channels and buffers; they never change the
/// ordering or lifecycle semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Capacity of the outbound event channel.
    ///
    /// When the caller stops consuming events, the worker blocks once this
    /// many events are queued, applying backpressure to the feed.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Initial capacity reserved for the pending-op buffer.
    ///
    /// The buffer grows past this if more ops arrive before the snapshot
    /// resolves; this only avoids early reallocation.
    #[serde(default = "default_op_buffer_capacity")]
    pub op_buffer_capacity: usize,
}

fn default_event_capacity() -> usize {
    64
}

fn default_op_buffer_capacity() -> usize {
    16
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            op_buffer_capacity: default_op_buffer_capacity(),
        }
    }
}

impl SubscriptionConfig {
    /// Create a minimal config for testing.
    pub fn for_testing() -> Self {
        Self {
            event_capacity: 8,
            op_buffer_capacity: 4,
        }
    }
}
