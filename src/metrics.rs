//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Subscription lifecycle (opens, teardowns, state)
//! - Event flow (payloads, ops, filtered messages)
//! - Errors by category
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `subscription_` and follow Prometheus
//! conventions: counters end in `_total`, gauges represent current state.
//!
//! Subscription ids are NOT used as labels; they are unbounded and
//! would blow up cardinality. Labels are limited to small closed sets
//! (state names, error kinds, delivery phase).

use metrics::{counter, gauge};

/// Record a subscription being opened.
pub fn record_opened() {
    counter!("subscription_opened_total").increment(1);
}

/// Record a clean teardown reaching `Unsubscribed`.
pub fn record_destroyed() {
    counter!("subscription_destroyed_total").increment(1);
}

/// Record the current lifecycle state.
pub fn set_ready_state(state: &str) {
    gauge!("subscription_state", "state" => state.to_string()).set(1.0);
}

/// Record a snapshot payload emission.
pub fn record_payload() {
    counter!("subscription_payloads_total").increment(1);
}

/// Record a change-op emission.
///
/// `phase` is `"buffered"` for ops replayed from the pending-op buffer
/// and `"live"` for ops emitted directly.
pub fn record_op(phase: &str) {
    counter!("subscription_ops_total", "phase" => phase.to_string()).increment(1);
}

/// Record an error by category (see `SubscriptionError::kind`).
pub fn record_error(kind: &'static str) {
    counter!("subscription_errors_total", "kind" => kind).increment(1);
}

/// Record a message discarded because it belonged to another channel.
pub fn record_message_filtered() {
    counter!("subscription_messages_filtered_total").increment(1);
}

/// Record deliveries lost to feed lag.
pub fn record_feed_lagged(skipped: u64) {
    counter!("subscription_feed_lagged_total").increment(skipped);
}
