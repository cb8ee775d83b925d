//! Tracks the server-specified `retry_after_sec` expiry used to throttle
//! `update`/`check_for_update`. `install` and `send_ping` are never
//! throttled.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct Throttle {
    expires_at: Mutex<Option<Instant>>,
}

impl Throttle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or clear) the throttle from a check response's
    /// `retry_after_sec`. `0` clears any existing throttle.
    pub fn record(&self, retry_after_sec: u32) {
        let mut expires_at = self.expires_at.lock().expect("throttle lock poisoned");
        if retry_after_sec == 0 {
            *expires_at = None;
        } else {
            *expires_at = Some(Instant::now() + Duration::from_secs(u64::from(retry_after_sec)));
        }
    }

    /// Whether a call made right now should be rejected with `RETRY_LATER`.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        let expires_at = self.expires_at.lock().expect("throttle lock poisoned");
        matches!(*expires_at, Some(at) if Instant::now() < at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_retry_after_never_throttles() {
        let throttle = Throttle::new();
        throttle.record(0);
        assert!(!throttle.is_throttled());
    }

    #[test]
    fn positive_retry_after_throttles_immediately() {
        let throttle = Throttle::new();
        throttle.record(3600);
        assert!(throttle.is_throttled());
    }

    #[test]
    fn recording_zero_clears_a_previous_throttle() {
        let throttle = Throttle::new();
        throttle.record(3600);
        assert!(throttle.is_throttled());
        throttle.record(0);
        assert!(!throttle.is_throttled());
    }
}
