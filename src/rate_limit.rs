//! Fixed-window request counting per (tenant, client, action).
//!
//! Counters live in process memory and reset on restart; replicas do not
//! share them.

use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub tenant: String,
    pub client: String,
    pub action: &'static str,
}

impl RateKey {
    pub fn booking_request(tenant: &str, client: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            client: client.to_string(),
            action: "booking-request",
        }
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.tenant, self.client, self.action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub window: Duration,
    pub max: u32,
}

impl RateLimit {
    /// Five booking requests per client per hour.
    pub const BOOKING_REQUESTS: RateLimit = RateLimit {
        window: Duration::from_secs(60 * 60),
        max: 5,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &RateKey, limit: RateLimit) -> RateDecision;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

#[derive(Default)]
pub struct FixedWindowLimiter {
    windows: DashMap<RateKey, Window>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request at `now`. An expired window is replaced on first use.
    pub fn check_at(&self, key: &RateKey, limit: RateLimit, now: Instant) -> RateDecision {
        let mut entry = self.windows.entry(key.clone()).or_insert(Window {
            count: 0,
            reset_at: now + limit.window,
        });
        let window = entry.value_mut();
        if now >= window.reset_at {
            *window = Window {
                count: 0,
                reset_at: now + limit.window,
            };
        }

        if window.count >= limit.max {
            let remaining = window.reset_at.saturating_duration_since(now);
            return RateDecision::Limited {
                retry_after_secs: ceil_secs(remaining).max(1),
            };
        }
        window.count += 1;
        RateDecision::Allowed {
            remaining: limit.max - window.count,
        }
    }

    /// Drop windows that expired before `now`.
    pub fn purge_expired(&self, now: Instant) {
        self.windows.retain(|_, w| now < w.reset_at);
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, key: &RateKey, limit: RateLimit) -> RateDecision {
        self.check_at(key, limit, Instant::now())
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
