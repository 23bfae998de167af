//! Token-bucket rate gating (C2), one bucket per logical endpoint group.
//! Built on `governor`'s GCRA implementation, in the same spirit as
//! `ForgeTrade-mcp-trader`'s `orderbook::rate_limiter::RateLimiter`, but
//! keyed by group rather than a single global limiter, and exposing a
//! `waited_total` counter per group for observability.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};

/// The endpoint groups OKX rate-limits independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointGroup {
    Orders,
    Account,
    Public,
}

struct Bucket {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    waited_total: AtomicU64,
}

impl Bucket {
    fn new(permits: u32, per: Duration) -> Self {
        let quota = Quota::with_period(per)
            .expect("non-zero period")
            .allow_burst(NonZeroU32::new(permits).expect("non-zero burst"));
        Self {
            limiter: RateLimiter::direct(quota),
            waited_total: AtomicU64::new(0),
        }
    }

    async fn acquire(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        self.waited_total.fetch_add(1, Ordering::Relaxed);
        self.limiter.until_ready().await;
    }
}

/// Three independent buckets: orders (60/2s), account (10/2s), public
/// (20/2s).
pub struct RateGate {
    orders: Bucket,
    account: Bucket,
    public: Bucket,
}

impl Default for RateGate {
    fn default() -> Self {
        Self {
            orders: Bucket::new(60, Duration::from_secs(2)),
            account: Bucket::new(10, Duration::from_secs(2)),
            public: Bucket::new(20, Duration::from_secs(2)),
        }
    }
}

impl RateGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until a token is available for `group`. The first tokens
    /// drawn from an empty (unused) bucket complete in O(1) time since the
    /// underlying GCRA state starts fully replenished.
    pub async fn acquire(&self, group: EndpointGroup) {
        match group {
            EndpointGroup::Orders => self.orders.acquire().await,
            EndpointGroup::Account => self.account.acquire().await,
            EndpointGroup::Public => self.public.acquire().await,
        }
    }

    pub fn waited_total(&self, group: EndpointGroup) -> u64 {
        let bucket = match group {
            EndpointGroup::Orders => &self.orders,
            EndpointGroup::Account => &self.account,
            EndpointGroup::Public => &self.public,
        };
        bucket.waited_total.load(Ordering::Relaxed)
    }
}
