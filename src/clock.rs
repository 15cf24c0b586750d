//! Monotonic simulation clock and busy-wait helpers.
//!
//! Elapsed time is modeled by spinning on the monotonic clock rather than
//! sleeping: a sleeping thread observes interrupts only at wakeup, which
//! would change the interleavings the rest of the simulator is specified
//! against.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::TimeMs;

/// Monotonic time reference for the simulation log.
#[derive(Debug)]
pub struct SimClock {
    start: Mutex<Instant>,
}

impl SimClock {
    pub fn new() -> Self {
        SimClock {
            start: Mutex::new(Instant::now()),
        }
    }

    /// Rebase the clock to now.
    pub fn reset(&self) {
        *self.start.lock().unwrap() = Instant::now();
    }

    /// Seconds since the last reset, with microsecond resolution.
    pub fn seconds(&self) -> f64 {
        self.start.lock().unwrap().elapsed().as_micros() as f64 / 1e6
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Spin until `ms` milliseconds have elapsed.
pub fn spin_for_ms(ms: TimeMs) {
    let t_end = Instant::now() + Duration::from_millis(ms);
    while Instant::now() < t_end {
        std::hint::spin_loop();
    }
}

/// Spin until `ms` milliseconds have elapsed or any interrupt bit is set.
///
/// Returns the unexpired remainder in milliseconds, 0 when the full span
/// completed.
pub fn spin_interruptible_ms(ms: TimeMs, interrupt: &AtomicU16) -> TimeMs {
    let t_end = Instant::now() + Duration::from_millis(ms);
    loop {
        let now = Instant::now();
        if now >= t_end {
            return 0;
        }
        if interrupt.load(Ordering::SeqCst) != 0 {
            return (t_end - now).as_millis() as TimeMs;
        }
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spin_for_elapses_at_least_requested() {
        let start = Instant::now();
        spin_for_ms(5);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_spin_interruptible_runs_to_completion_when_quiet() {
        let interrupt = AtomicU16::new(0);
        assert_eq!(spin_interruptible_ms(5, &interrupt), 0);
    }

    #[test]
    fn test_spin_interruptible_returns_remainder_when_flagged() {
        let interrupt = AtomicU16::new(0b01);
        let remaining = spin_interruptible_ms(50, &interrupt);
        assert!(remaining > 0);
        assert!(remaining <= 50);
    }

    #[test]
    fn test_clock_reset_rebases() {
        let clock = SimClock::new();
        spin_for_ms(2);
        clock.reset();
        assert!(clock.seconds() < 0.002);
    }
}
