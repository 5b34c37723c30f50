//! FIFO buffer for change ops that arrive before the snapshot.
//!
//! Message delivery and the snapshot fetch race with no ordering
//! guarantee. Ops that land while the snapshot is still pending are held
//! here and replayed, in arrival order, the moment the payload is
//! emitted. The buffer exists exactly once per subscription and is
//! drained exactly once.

use crate::pubsub::ChangeOp;
use std::collections::VecDeque;

/// Ordered holding area for pre-snapshot change ops.
#[derive(Debug)]
pub struct OpBuffer {
    ops: VecDeque<ChangeOp>,
}

impl OpBuffer {
    /// Create a buffer with room for `capacity` ops before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an op, preserving arrival order.
    pub fn push(&mut self, op: ChangeOp) {
        self.ops.push_back(op);
    }

    /// Take every buffered op, oldest first, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<ChangeOp> {
        self.ops.drain(..).collect()
    }

    /// Discard everything without replay (teardown path).
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
