//! Time sources for the scheduler.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Monotonic microsecond clock plus the blocking wait between cycles.
pub trait Clock {
    fn now_micros(&self) -> u64;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant`]; readings start at zero.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock: every reading advances time by a fixed step and
/// sleeping advances it by the requested duration without blocking.
#[derive(Debug, Default)]
pub struct SteppingClock {
    now: Cell<u64>,
    step_us: u64,
    slept_us: Cell<u64>,
}

impl SteppingClock {
    pub fn new(step_us: u64) -> Self {
        Self {
            now: Cell::new(0),
            step_us,
            slept_us: Cell::new(0),
        }
    }

    /// Current time without advancing.
    pub fn peek(&self) -> u64 {
        self.now.get()
    }

    /// Total time spent in [`Clock::sleep`].
    pub fn slept(&self) -> Duration {
        Duration::from_micros(self.slept_us.get())
    }
}

impl Clock for SteppingClock {
    fn now_micros(&self) -> u64 {
        let now = self.now.get() + self.step_us;
        self.now.set(now);
        now
    }

    fn sleep(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.now.set(self.now.get() + us);
        self.slept_us.set(self.slept_us.get() + us);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_micros(&self) -> u64 {
        (**self).now_micros()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
