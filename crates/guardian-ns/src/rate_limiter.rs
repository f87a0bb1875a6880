//! Per-client admission control.
//!
//! Every client identity gets its own GCRA bucket from `governor`, created lazily on the first
//! request. All buckets share one [`RateLimitPolicy`]. The server keys buckets by the client's IP
//! address (without the port), so one client can't multiply its budget by rotating source ports.

use std::hash::Hash;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context as _;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::Quota;

type KeyedLimiter<K, C> = governor::RateLimiter<K, DashMapStateStore<K>, C, NoOpMiddleware<<C as Clock>::Instant>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitPolicy {
    sustained_rate_per_sec: f64,
    burst_capacity: u32,
    quota: Quota,
}

impl RateLimitPolicy {
    pub fn new(sustained_rate_per_sec: f64, burst_capacity: u32) -> anyhow::Result<Self> {
        if !sustained_rate_per_sec.is_finite() || sustained_rate_per_sec <= 0.0 {
            anyhow::bail!("rate must be a positive number, got {}", sustained_rate_per_sec);
        }
        let burst = NonZeroU32::new(burst_capacity).context("burst capacity must be at least 1")?;

        // One token is replenished every period, fractional rates included
        let period = Duration::try_from_secs_f64(1.0 / sustained_rate_per_sec)
            .with_context(|| format!("rate {} is too small", sustained_rate_per_sec))?;
        let quota = Quota::with_period(period)
            .with_context(|| format!("rate {} is too large", sustained_rate_per_sec))?
            .allow_burst(burst);

        Ok(RateLimitPolicy {
            sustained_rate_per_sec,
            burst_capacity,
            quota,
        })
    }

    pub fn sustained_rate_per_sec(&self) -> f64 {
        self.sustained_rate_per_sec
    }

    pub fn burst_capacity(&self) -> u32 {
        self.burst_capacity
    }
}

pub struct RateLimiter<K = IpAddr, C = DefaultClock>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    limiter: KeyedLimiter<K, C>,
}

impl<K: Hash + Eq + Clone> RateLimiter<K, DefaultClock> {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, DefaultClock::default())
    }
}

impl<K: Hash + Eq + Clone, C: Clock> RateLimiter<K, C> {
    pub fn with_clock(policy: RateLimitPolicy, clock: C) -> Self {
        RateLimiter {
            limiter: KeyedLimiter::dashmap_with_clock(policy.quota, clock),
        }
    }

    /// Charges one token from the client's bucket. A denied request doesn't charge anything.
    pub fn is_allowed(&self, client: &K) -> bool {
        self.limiter.check_key(client).is_ok()
    }

    /// Forgets clients whose bucket has refilled completely.
    /// Such a bucket is indistinguishable from a fresh one, so this never changes an outcome.
    pub fn evict_idle(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        before.saturating_sub(self.limiter.len())
    }

    pub fn client_count(&self) -> usize {
        self.limiter.len()
    }
}
