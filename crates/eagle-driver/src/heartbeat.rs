//! Connection Monitor - tracks incoming controller lines to detect link aliveness
//!
//! **Purpose**: detect whether the controller is still talking (powered, USB cable connected).
//!
//! Timestamps are monotonic microseconds anchored to the first use in this process,
//! so they are unaffected by wall-clock changes and fit in an `AtomicU64`.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

/// Monotonic time as microseconds since process anchor
fn get_monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Connection health monitor
///
/// Tracks the time since the last complete line was received from the controller.
pub struct ConnectionMonitor {
    last_feedback: AtomicU64,
    created_at: Instant,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// Create a new connection monitor
    ///
    /// # Example
    /// ```
    /// # use eagle_driver::ConnectionMonitor;
    /// # use std::time::Duration;
    /// let monitor = ConnectionMonitor::new(Duration::from_secs(1));
    /// assert!(monitor.check_connection());
    /// ```
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_feedback: AtomicU64::new(get_monotonic_micros()),
            created_at: Instant::now(),
            timeout,
        }
    }

    /// Returns true if a line arrived within the timeout window
    pub fn check_connection(&self) -> bool {
        self.time_since_last_feedback() < self.timeout
    }

    /// Register that a line was received from the controller
    pub fn register_feedback(&self) {
        self.last_feedback
            .store(get_monotonic_micros(), Ordering::Relaxed);
    }

    pub fn time_since_last_feedback(&self) -> Duration {
        let last_us = self.last_feedback.load(Ordering::Relaxed);
        let now_us = get_monotonic_micros();
        Duration::from_micros(now_us.saturating_sub(last_us))
    }

    /// Time since the monitor (and therefore the connection) was created
    pub fn connection_age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_monotonic_time_always_increases() {
        let t1 = get_monotonic_micros();
        thread::sleep(Duration::from_millis(10));
        let t2 = get_monotonic_micros();
        assert!(t2 > t1);
    }

    #[test]
    fn test_connection_monitor_initially_alive() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        assert!(monitor.check_connection());
    }

    #[test]
    fn test_connection_monitor_timeout_after_delay() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(50));
        assert!(monitor.check_connection());

        thread::sleep(Duration::from_millis(100));
        assert!(!monitor.check_connection());
    }

    #[test]
    fn test_connection_monitor_feedback_resets_timer() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(100));
        thread::sleep(Duration::from_millis(50));
        monitor.register_feedback();
        thread::sleep(Duration::from_millis(50));
        assert!(monitor.check_connection());
    }

    #[test]
    fn test_connection_age_grows() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        thread::sleep(Duration::from_millis(10));
        monitor.register_feedback();
        assert!(monitor.connection_age() >= Duration::from_millis(10));
        assert!(monitor.time_since_last_feedback() < monitor.connection_age());
    }
}
