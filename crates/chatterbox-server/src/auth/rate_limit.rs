//! Sliding-window limiter for handshake attempts, keyed by remote IP.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Allows at most `max_attempts` per `window` for each address.
#[derive(Debug)]
pub struct RateLimiter {
    max_attempts: usize,
    window: Duration,
    /// Per-address attempt timestamps, oldest first.
    entries: HashMap<IpAddr, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window_secs: u64) -> Self {
        Self {
            max_attempts: max_attempts as usize,
            window: Duration::from_secs(window_secs),
            entries: HashMap::new(),
        }
    }

    /// Record an attempt from `ip` if it is within budget.
    ///
    /// Returns `false` when the address is over its limit; the attempt is
    /// not recorded in that case.
    pub fn check_and_record(&mut self, ip: IpAddr) -> bool {
        self.check_and_record_at(ip, Instant::now())
    }

    fn check_and_record_at(&mut self, ip: IpAddr, now: Instant) -> bool {
        let window = self.window;
        let attempts = self.entries.entry(ip).or_default();
        while attempts
            .front()
            .is_some_and(|t| now.duration_since(*t) >= window)
        {
            attempts.pop_front();
        }

        if attempts.len() >= self.max_attempts {
            return false;
        }
        attempts.push_back(now);
        true
    }

    /// Drop addresses with no attempts inside the window.
    pub fn gc(&mut self) {
        let now = Instant::now();
        let window = self.window;
        self.entries.retain(|_, attempts| {
            attempts.retain(|t| now.duration_since(*t) < window);
            !attempts.is_empty()
        });
    }

    /// Number of addresses currently tracked.
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOCAL: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));

    #[test]
    fn blocks_after_limit() {
        let mut limiter = RateLimiter::new(3, 60);
        assert!(limiter.check_and_record(LOCAL));
        assert!(limiter.check_and_record(LOCAL));
        assert!(limiter.check_and_record(LOCAL));
        assert!(!limiter.check_and_record(LOCAL));
        // Other addresses have their own budget.
        assert!(limiter.check_and_record(OTHER));
    }

    #[test]
    fn window_slides() {
        let mut limiter = RateLimiter::new(1, 10);
        let start = Instant::now();
        assert!(limiter.check_and_record_at(LOCAL, start));
        assert!(!limiter.check_and_record_at(LOCAL, start + Duration::from_secs(5)));
        assert!(limiter.check_and_record_at(LOCAL, start + Duration::from_secs(10)));
    }

    #[test]
    fn gc_forgets_idle_addresses() {
        let mut limiter = RateLimiter::new(5, 0);
        limiter.check_and_record(LOCAL);
        limiter.gc();
        assert_eq!(limiter.tracked(), 0);
    }
}
