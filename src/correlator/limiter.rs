use std::time::Duration;

/// Shared backoff state for one external feed.
///
/// A single limiter instance is threaded through every request to its feed,
/// so a 429 observed by one coordinate's request throttles all in-flight and
/// future requests. Kept free of clocks and sleeping: callers ask what to
/// wait and perform the wait themselves, which keeps the state machine
/// directly unit-testable.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    baseline: Duration,
    max_delay: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            delay: Duration::from_secs(1),
            baseline: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }

    /// The wait before retrying after a throttled or failed response.
    /// Doubles the next delay up to the ceiling.
    pub fn on_throttled(&mut self) -> Duration {
        let current = self.delay;
        self.delay = (self.delay * 2).min(self.max_delay);
        current
    }

    /// A successful response resumes the feed at baseline pace.
    pub fn on_success(&mut self) {
        self.delay = self.baseline;
    }

    /// Pacing applied before issuing a new request while the feed is
    /// degraded; `None` at baseline.
    pub fn pre_request_delay(&self) -> Option<Duration> {
        (self.delay > self.baseline).then_some(self.delay)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_one_second() {
        let mut limiter = RateLimiter::new();
        assert_eq!(limiter.on_throttled(), Duration::from_secs(1));
        assert_eq!(limiter.on_throttled(), Duration::from_secs(2));
        assert_eq!(limiter.on_throttled(), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_caps_at_ten_seconds() {
        let mut limiter = RateLimiter::new();
        for _ in 0..6 {
            limiter.on_throttled();
        }
        assert_eq!(limiter.on_throttled(), Duration::from_secs(10));
        assert_eq!(limiter.on_throttled(), Duration::from_secs(10));
    }

    #[test]
    fn test_success_resumes_at_baseline() {
        let mut limiter = RateLimiter::new();
        limiter.on_throttled();
        limiter.on_throttled();
        limiter.on_throttled();
        assert!(limiter.pre_request_delay().is_some());
        limiter.on_success();
        assert_eq!(limiter.pre_request_delay(), None);
        assert_eq!(limiter.on_throttled(), Duration::from_secs(1));
    }
}
