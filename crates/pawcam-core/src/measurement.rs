//! Per-cycle timing measurement.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamps taken immediately before and after one forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleMeasurement {
    /// Monotonic clock reading before invoke, in microseconds.
    pub start_us: u64,
    /// Monotonic clock reading after invoke, in microseconds.
    pub end_us: u64,
}

impl CycleMeasurement {
    pub const fn new(start_us: u64, end_us: u64) -> Self {
        Self { start_us, end_us }
    }

    /// Forward-pass latency in microseconds. A clock that went backwards
    /// yields zero.
    #[inline]
    pub const fn latency_us(&self) -> u64 {
        self.end_us.saturating_sub(self.start_us)
    }

    /// Latency truncated to whole milliseconds.
    #[inline]
    pub const fn latency_ms(&self) -> u64 {
        self.latency_us() / 1000
    }

    /// Forward passes per second, `1_000_000 / latency_us`.
    ///
    /// `None` when the latency rounds to zero microseconds (unbounded).
    #[inline]
    pub const fn throughput(&self) -> Option<u64> {
        match self.latency_us() {
            0 => None,
            latency => Some(1_000_000 / latency),
        }
    }
}

impl fmt::Display for CycleMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.throughput() {
            Some(fps) => write!(f, "Latency: {} ms, FPS: {}", self.latency_ms(), fps),
            None => write!(f, "Latency: {} ms, FPS: unbounded", self.latency_ms()),
        }
    }
}
