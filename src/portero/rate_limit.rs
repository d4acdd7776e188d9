//! Fixed-window rate limiting for the token verification endpoint.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const VERIFY_LIMIT: u32 = 20;
pub const WINDOW_SECONDS: u64 = 60;

/// Entry count above which an insert triggers a sweep of expired windows.
/// Keeps the map bounded under a churn of one-shot client keys.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

impl Decision {
    #[must_use]
    pub fn is_limited(self) -> bool {
        matches!(self, Self::Limited { .. })
    }
}

/// Per-key admission check. Check and count are one atomic operation so two
/// concurrent requests on the same key cannot both observe count 19 and pass.
pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> Decision;
}

/// Limiter that admits everything. Used in tests that are not about limits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str) -> Decision {
        Decision::Allowed
    }
}

#[derive(Debug)]
struct WindowCounter {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter keyed by client key. The window starts at the first
/// request and every request inside it increments the counter; the counter
/// resets when the window lapses.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, WindowCounter>>,
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(VERIFY_LIMIT, Duration::from_secs(WINDOW_SECONDS))
    }
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // A poisoned lock means another check panicked mid-update; the
            // counters are still structurally valid, so keep serving.
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, counter| counter.reset_at > now);
        }

        let counter = windows
            .entry(key.to_string())
            .or_insert_with(|| WindowCounter {
                count: 0,
                reset_at: now + self.window,
            });

        if counter.reset_at <= now {
            counter.count = 0;
            counter.reset_at = now + self.window;
        }

        if counter.count >= self.limit {
            let remaining = counter.reset_at.saturating_duration_since(now);
            return Decision::Limited {
                retry_after_seconds: remaining.as_secs().max(1),
            };
        }

        counter.count += 1;
        Decision::Allowed
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }
}

/// Derive the limiter key for a request: first entry of `x-forwarded-for`,
/// then `x-real-ip`, then a shared fallback bucket.
#[must_use]
pub fn client_key(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    "unknown".to_string()
}
