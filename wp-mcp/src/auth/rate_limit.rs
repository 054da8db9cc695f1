use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;

/// Length of a rate limit window in seconds
const WINDOW_SECS: i64 = 60;

/// Stale windows are swept once this many callers are tracked
const MAX_TRACKED_CALLERS: usize = 10_000;

/// Request counter for one caller in the current window
#[derive(Debug, Clone)]
struct RateLimiterEntry {
    requests: u32,
    window_start: DateTime<Utc>,
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitCheckResult {
    /// Request is allowed, with the requests left in this window
    Allowed { remaining: u32 },
    /// Per-minute limit exceeded
    Exceeded {
        limit: u32,
        reset_after: u64, // seconds
    },
}

/// Fixed-window per-minute limiter keyed by caller
pub struct RateLimiter {
    requests_per_minute: u32,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, RateLimiterEntry>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            requests_per_minute,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request from `caller` and report whether it may proceed
    pub fn check(&self, caller: &str) -> RateLimitCheckResult {
        let now = self.clock.now();
        let window = Duration::seconds(WINDOW_SECS);

        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => {
                log::warn!("Rate limiter state poisoned, allowing request from {}", caller);
                return RateLimitCheckResult::Allowed { remaining: 0 };
            }
        };

        if entries.len() >= MAX_TRACKED_CALLERS {
            entries.retain(|_, entry| now - entry.window_start < window);
        }

        let entry = entries.entry(caller.to_string()).or_insert_with(|| RateLimiterEntry {
            requests: 0,
            window_start: now,
        });

        // Reset the window if it has expired
        if now - entry.window_start >= window {
            entry.requests = 0;
            entry.window_start = now;
        }

        if entry.requests >= self.requests_per_minute {
            let elapsed = (now - entry.window_start).num_seconds();
            return RateLimitCheckResult::Exceeded {
                limit: self.requests_per_minute,
                reset_after: (WINDOW_SECS - elapsed).max(1) as u64,
            };
        }

        entry.requests += 1;
        RateLimitCheckResult::Allowed {
            remaining: self.requests_per_minute - entry.requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_limit_per_caller_and_window_reset() {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::new(2, clock.clone());

        assert_eq!(limiter.check("a"), RateLimitCheckResult::Allowed { remaining: 1 });
        assert_eq!(limiter.check("a"), RateLimitCheckResult::Allowed { remaining: 0 });
        clock.advance(Duration::seconds(15));
        assert_eq!(
            limiter.check("a"),
            RateLimitCheckResult::Exceeded { limit: 2, reset_after: 45 }
        );

        // Other callers have their own window
        assert_eq!(limiter.check("b"), RateLimitCheckResult::Allowed { remaining: 1 });

        clock.advance(Duration::seconds(45));
        assert_eq!(limiter.check("a"), RateLimitCheckResult::Allowed { remaining: 1 });
    }
}
