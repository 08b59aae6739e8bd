//! Edge events.
//!
//! An [`EdgeEvent`] is produced once by an edge source and consumed exactly
//! once by the state machine dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a line transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
}

impl Edge {
    /// Column of this edge inside a line's transition pair.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Edge::Rising => 0,
            Edge::Falling => 1,
        }
    }

    /// The opposite transition.
    #[inline]
    pub const fn inverse(self) -> Self {
        match self {
            Edge::Rising => Edge::Falling,
            Edge::Falling => Edge::Rising,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => f.write_str("rising"),
            Edge::Falling => f.write_str("falling"),
        }
    }
}

/// Line offset on its GPIO chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub u32);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line{}", self.0)
    }
}

/// One transition observed on a monitored line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// Line that changed.
    pub line: LineId,
    /// Transition direction.
    pub edge: Edge,
    /// Kernel monotonic timestamp in nanoseconds.
    pub timestamp_ns: u64,
}

impl EdgeEvent {
    /// Build an event.
    pub const fn new(line: LineId, edge: Edge, timestamp_ns: u64) -> Self {
        Self {
            line,
            edge,
            timestamp_ns,
        }
    }
}
