#![forbid(unsafe_code)]

//! Host-driven monotonic time.
//!
//! The popup never reads the system clock to sequence its animations. The
//! embedding host advances a [`DeterministicClock`] from its own frame loop
//! (or test), and scheduled work fires when the clock passes its due time.
//! No threads, no blocking, no `std::time::Instant`.

use core::time::Duration;

/// Source of monotonic time.
pub trait MonotonicClock {
    /// Time elapsed since the clock's origin.
    fn now_mono(&self) -> Duration;
}

/// Deterministic monotonic clock controlled by the host.
#[derive(Debug, Default, Clone)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Set current monotonic time.
    ///
    /// Attempts to move time backwards are ignored.
    pub fn set(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }
}

impl MonotonicClock for DeterministicClock {
    fn now_mono(&self) -> Duration {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(DeterministicClock::new().now_mono(), Duration::ZERO);
    }

    #[test]
    fn advance_accumulates() {
        let mut clock = DeterministicClock::new();
        clock.advance(Duration::from_millis(150));
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_mono(), Duration::from_millis(400));
    }

    #[test]
    fn set_never_rewinds() {
        let mut clock = DeterministicClock::new();
        clock.set(Duration::from_millis(500));
        clock.set(Duration::from_millis(100));
        assert_eq!(clock.now_mono(), Duration::from_millis(500));
    }

    #[test]
    fn advance_saturates() {
        let mut clock = DeterministicClock::new();
        clock.set(Duration::MAX);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_mono(), Duration::MAX);
    }
}
