//! Request pacing for the Connect API

use std::time::{Duration, Instant};

/// Default minimum gap between remote calls (30 req/min)
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(2000);

/// Consecutive 429 responses after which a run should stop early
const PAUSE_THRESHOLD: u32 = 5;

/// Spaces out remote calls and backs off exponentially on HTTP 429
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum delay between requests
    min_delay: Duration,
    /// Extra delay added after rate limit responses
    backoff: Duration,
    /// Maximum backoff delay
    max_backoff: Duration,
    /// Backoff multiplier
    backoff_multiplier: f64,
    /// Last request time
    last_request: Option<Instant>,
    /// Consecutive rate limit hits
    consecutive_429s: u32,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY)
    }
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            backoff: Duration::ZERO,
            max_backoff: Duration::from_secs(300), // 5 minutes
            backoff_multiplier: 2.0,
            last_request: None,
            consecutive_429s: 0,
        }
    }

    /// Wait before making the next request
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            let required_delay = self.min_delay + self.backoff;

            if elapsed < required_delay {
                tokio::time::sleep(required_delay - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    /// Handle a successful request
    pub fn on_success(&mut self) {
        self.backoff = Duration::ZERO;
        self.consecutive_429s = 0;
    }

    /// Handle a rate limit (HTTP 429) response
    pub fn on_rate_limit(&mut self) {
        self.consecutive_429s += 1;
        let doubled = (self.backoff.as_secs_f64() * self.backoff_multiplier).max(1.0);
        self.backoff = Duration::from_secs_f64(doubled.min(self.max_backoff.as_secs_f64()));
    }

    /// Check if the run should stop due to repeated rate limits
    pub fn should_pause(&self) -> bool {
        self.consecutive_429s >= PAUSE_THRESHOLD
    }

    /// Get the current backoff duration
    pub fn current_backoff(&self) -> Duration {
        self.backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_defaults() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.min_delay, Duration::from_millis(2000));
        assert_eq!(limiter.current_backoff(), Duration::ZERO);
    }

    #[test]
    fn test_exponential_backoff() {
        let mut limiter = RateLimiter::new(Duration::ZERO);

        limiter.on_rate_limit();
        assert_eq!(limiter.current_backoff(), Duration::from_secs(1));

        limiter.on_rate_limit();
        assert_eq!(limiter.current_backoff(), Duration::from_secs(2));

        limiter.on_rate_limit();
        assert_eq!(limiter.current_backoff(), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_max() {
        let mut limiter = RateLimiter::default();
        for _ in 0..20 {
            limiter.on_rate_limit();
        }
        assert_eq!(limiter.current_backoff(), limiter.max_backoff);
    }

    #[test]
    fn test_reset_on_success() {
        let mut limiter = RateLimiter::default();
        limiter.on_rate_limit();
        limiter.on_rate_limit();
        assert!(limiter.current_backoff() > Duration::ZERO);

        limiter.on_success();
        assert_eq!(limiter.current_backoff(), Duration::ZERO);
        assert_eq!(limiter.consecutive_429s, 0);
    }

    #[test]
    fn test_should_pause() {
        let mut limiter = RateLimiter::default();
        for _ in 0..4 {
            limiter.on_rate_limit();
            assert!(!limiter.should_pause());
        }
        limiter.on_rate_limit();
        assert!(limiter.should_pause());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_spaces_requests() {
        let mut limiter = RateLimiter::new(Duration::from_secs(2));
        let start = tokio::time::Instant::now();

        limiter.wait().await;
        limiter.wait().await;

        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_zero_delay_does_not_sleep() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
