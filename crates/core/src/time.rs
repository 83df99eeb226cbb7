//! Time units shared by the scheduler and its hosts.

use std::time::Instant;

/// Milliseconds on a monotonic clock. Fractional values carry sub-millisecond
/// precision.
pub type Millis = f64;

/// Monotonic clock reporting milliseconds elapsed since it was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds since the clock was created.
    pub fn now(&self) -> Millis {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}
