//! Logging setup and rate limiting for per-frame diagnostics.

use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` overrides `default_level`. Returns false if a subscriber was
/// already installed.
pub fn init_logging(default_level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}

/// Allows `burst` events per `interval`, counting the rest as suppressed.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    burst: u32,
    interval: Duration,
    window_start: Option<Instant>,
    used: u32,
    suppressed: u64,
}

impl RateLimiter {
    pub fn new(burst: u32, interval: Duration) -> Self {
        RateLimiter {
            burst,
            interval,
            window_start: None,
            used: 0,
            suppressed: 0,
        }
    }

    /// Returns true if an event at `now` may be logged.
    pub fn check_at(&mut self, now: Instant) -> bool {
        let expired = self
            .window_start
            .map_or(true, |start| now.duration_since(start) >= self.interval);
        if expired {
            self.window_start = Some(now);
            self.used = 0;
        }
        if self.used < self.burst {
            self.used += 1;
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    /// Events dropped since creation.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        RateLimiter::new(5, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_suppress_then_reset() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
        let t0 = Instant::now();
        assert!(limiter.check_at(t0));
        assert!(limiter.check_at(t0));
        assert!(!limiter.check_at(t0 + Duration::from_millis(500)));
        assert_eq!(limiter.suppressed(), 1);
        assert!(limiter.check_at(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_second_init_is_noop() {
        let _ = init_logging(Level::DEBUG);
        assert!(!init_logging(Level::INFO));
    }
}
