#![forbid(unsafe_code)]
#![deny(
    dead_code,
    unused_imports,
    unused_mut,
    missing_docs,
    missing_debug_implementations
)]

//! Local sliding windows rate limiting algorithm implementation.

/// Plug the rate-limiter on `axum` routers.
#[cfg(feature = "axum")]
pub mod axum;

use dashmap::DashMap;
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Structure of a limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// The size of the window, the number of queries that can be performed in the given time.
    maximum_request: usize,
    /// Window duration.
    window: Duration,
    /// Entries. Each entry has its own rate-limit.
    buckets: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter. This can be used for each route.
    ///
    /// # Example
    /// ```rust
    /// use class_connect_limits::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::new(5, Duration::from_secs(60)); // 5 logins per minute.
    /// ```
    pub fn new(maximum_request: usize, window: Duration) -> Self {
        RateLimiter {
            maximum_request,
            window,
            buckets: DashMap::new(),
        }
    }

    /// Window duration of the limiter.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Checks if a new request exceeds the limit. If not, records it.
    pub fn check<T>(&self, key: T) -> bool
    where
        T: ToString,
    {
        self.check_at(key, Instant::now())
    }

    fn check_at<T>(&self, key: T, now: Instant) -> bool
    where
        T: ToString,
    {
        let mut hits = self.buckets.entry(key.to_string()).or_default();
        Self::evict(&mut hits, now, self.window);

        if hits.len() >= self.maximum_request {
            false
        } else {
            hits.push_back(now);
            true
        }
    }

    /// Number of requests `key` may still perform in the current window.
    pub fn remaining<T>(&self, key: T) -> usize
    where
        T: ToString,
    {
        let now = Instant::now();
        match self.buckets.get_mut(&key.to_string()) {
            Some(mut hits) => {
                Self::evict(&mut hits, now, self.window);
                self.maximum_request.saturating_sub(hits.len())
            },
            None => self.maximum_request,
        }
    }

    /// Drop every bucket without a request in the current window.
    pub fn retain_active(&self) {
        let now = Instant::now();
        self.buckets.retain(|_, hits| {
            Self::evict(hits, now, self.window);
            !hits.is_empty()
        });
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no entry is tracked.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Reset all values from bucket.
    pub fn reset(&self) {
        self.buckets.clear();
    }

    fn evict(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(time) = hits.front() {
            if now.duration_since(*time) >= window {
                hits.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::RateLimiter;
    use std::time::{Duration, Instant};

    const IP: &str = "0.0.0.0";
    const OTHER_IP: &str = "1.1.1.1";

    #[test]
    fn test_duration() {
        let limiter = RateLimiter::new(2, Duration::from_secs(5));
        let start = Instant::now();

        // second 0.
        assert!(limiter.check_at(IP, start));

        // second 1.
        let one = start + Duration::from_secs(1);
        assert!(limiter.check_at(IP, one));
        assert!(!limiter.check_at(IP, one)); // This request exceed limit.

        // second 5.
        // only the first entry left the window.
        let five = start + Duration::from_secs(5);
        assert!(limiter.check_at(IP, five));
        assert!(!limiter.check_at(IP, five)); // This request exceed limit.
    }

    #[test]
    fn test_multiple_entries() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));

        // only IP is limited.
        assert!(limiter.check(IP));
        assert!(limiter.check(OTHER_IP));
        assert!(limiter.check(IP));
        assert!(!limiter.check(IP)); // ip is limited.
        assert!(limiter.check(OTHER_IP));
    }

    #[test]
    fn test_remaining_and_reset() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert_eq!(limiter.remaining(IP), 3);

        limiter.check(IP);
        assert_eq!(limiter.remaining(IP), 2);
        assert_eq!(limiter.len(), 1);

        limiter.reset();
        assert!(limiter.is_empty());
        assert_eq!(limiter.remaining(IP), 3);
    }

    #[test]
    fn test_retain_active() {
        let limiter = RateLimiter::new(1, Duration::from_millis(1));
        let past = Instant::now() - Duration::from_secs(1);
        limiter.check_at(IP, past);
        assert_eq!(limiter.len(), 1);

        limiter.retain_active();
        assert!(limiter.is_empty());
    }
}
