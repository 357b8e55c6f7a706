use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Ordering of an incoming clock relative to the local one.
///
/// The comparison is total: every pair of clocks resolves to exactly one
/// variant, falling back to the wall-clock timestamp when the vectors alone
/// cannot decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrdering {
    /// The incoming clock is causally newer (or won the timestamp tiebreak).
    /// Events carrying such a clock must be delivered.
    Newer,
    /// The incoming clock is causally older (or lost the timestamp tiebreak).
    /// Events carrying such a clock are dropped.
    Older,
}

/// Per-node counter vector augmented with a wall-clock timestamp.
///
/// The vector has one slot per node in the shard, indexed by node ID. The slot
/// count is fixed for the lifetime of a node. Slot `i` on node `i` is bumped
/// on every local write, so it is monotonically non-decreasing.
///
/// The timestamp is Unix milliseconds. It is not assumed precise; it only has
/// to order two concurrent events the same way on every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridVecClock {
    pub vec: Vec<u64>,
    pub timestamp: u64,
}

impl HybridVecClock {
    /// Creates a zeroed clock with one slot per shard member.
    pub fn new(slots: usize) -> Self {
        Self {
            vec: vec![0; slots],
            timestamp: 0,
        }
    }

    /// Compares an incoming clock against this (local) one.
    ///
    /// Walks both vectors tracking whether some local slot exceeds the
    /// incoming one (`lt`) and whether some incoming slot exceeds the local
    /// one (`gt`). A one-sided result decides causally; otherwise the clocks
    /// are equal or concurrent and the wall clock breaks the tie. An exact
    /// timestamp tie resolves to `Newer` so the event is still delivered.
    pub fn compare(&self, incoming: &HybridVecClock) -> ClockOrdering {
        let mut lt = false;
        let mut gt = false;
        for (local, other) in self.vec.iter().zip(incoming.vec.iter()) {
            if other > local {
                gt = true;
            } else if local > other {
                lt = true;
            }
        }
        if lt && !gt {
            ClockOrdering::Older
        } else if gt && !lt {
            ClockOrdering::Newer
        } else if incoming.timestamp >= self.timestamp {
            ClockOrdering::Newer
        } else {
            ClockOrdering::Older
        }
    }

    /// Merges an incoming clock into this one, slot by slot (element-wise max).
    ///
    /// The caller must hold the clock's write lock.
    pub fn merge(&mut self, incoming: &HybridVecClock) {
        for (local, other) in self.vec.iter_mut().zip(incoming.vec.iter()) {
            *local = (*local).max(*other);
        }
    }

    /// Deep copy suitable for embedding into an outbound event.
    pub fn snapshot(&self) -> HybridVecClock {
        self.clone()
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
