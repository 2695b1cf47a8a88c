//! Token bucket state and refill arithmetic
//!
//! The bucket math is kept separate from the [`ControlPlane`] so that a
//! store can execute the whole refill-then-debit step inside its own atomic
//! unit, the way a database-side procedure would.
//!
//! [`ControlPlane`]: super::control::ControlPlane

use std::time::SystemTime;

/// Static limit parameters for one endpoint.
///
/// These are configuration, not runtime state: each endpoint defines its own
/// `(max_tokens, refill_rate, cost)` triple, and the same triple must be
/// passed on every call for that endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Bucket capacity: the largest burst the endpoint ever admits
    pub max_tokens: f64,
    /// Tokens replenished per second
    pub refill_rate: f64,
    /// Tokens one call consumes
    pub cost: f64,
}

impl RateLimit {
    pub fn new(max_tokens: f64, refill_rate: f64, cost: f64) -> Self {
        RateLimit {
            max_tokens,
            refill_rate,
            cost,
        }
    }

    /// Invalid parameters are a caller bug, never a fail-open admission.
    pub fn is_valid(&self) -> bool {
        self.max_tokens.is_finite()
            && self.refill_rate.is_finite()
            && self.cost.is_finite()
            && self.max_tokens > 0.0
            && self.refill_rate > 0.0
            && self.cost >= 0.0
    }

    /// Advisory backoff for a denied request: `ceil(cost / max(refill_rate, 1))`.
    ///
    /// Computed from the limit parameters alone so a denied caller always
    /// receives a stable, non-zero wait.
    pub fn retry_after_secs(&self) -> u64 {
        (self.cost / self.refill_rate.max(1.0)).ceil() as u64
    }
}

/// Mutable bucket state for one (identifier, endpoint) pair.
///
/// Created lazily on first sight, mutated atomically on every call, never
/// explicitly destroyed (idle buckets are swept by the store's retention
/// pass).
#[derive(Debug, Clone, Copy)]
pub struct Bucket {
    /// Tokens currently available
    pub tokens: f64,
    /// Last time the bucket was refilled
    pub last_refill: SystemTime,
}

impl Bucket {
    /// A freshly created bucket starts full.
    pub fn full(limit: &RateLimit, now: SystemTime) -> Self {
        Bucket {
            tokens: limit.max_tokens,
            last_refill: now,
        }
    }

    /// Refill from elapsed time, then try to take `limit.cost` tokens.
    ///
    /// Returns whether the take succeeded. On denial the refilled (but not
    /// debited) state is kept, so the caller persists exactly what the
    /// algorithm computed either way. A clock that moved backwards counts
    /// as zero elapsed time.
    pub fn refill_and_take(&mut self, limit: &RateLimit, now: SystemTime) -> bool {
        let elapsed = now
            .duration_since(self.last_refill)
            .unwrap_or_default()
            .as_secs_f64();
        self.tokens = (self.tokens + elapsed * limit.refill_rate).min(limit.max_tokens);
        self.last_refill = now;

        if self.tokens >= limit.cost {
            self.tokens -= limit.cost;
            true
        } else {
            false
        }
    }
}

/// Authoritative outcome of a rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Advisory backoff in seconds, set only on denial
    pub retry_after_secs: Option<u64>,
    /// True when a store fault forced the fail-open path
    pub failed_open: bool,
}

impl RateDecision {
    pub(crate) fn allow() -> Self {
        RateDecision {
            allowed: true,
            retry_after_secs: None,
            failed_open: false,
        }
    }

    pub(crate) fn deny(retry_after_secs: u64) -> Self {
        RateDecision {
            allowed: false,
            retry_after_secs: Some(retry_after_secs),
            failed_open: false,
        }
    }

    /// Infrastructure unavailability must never become a user-visible
    /// denial; the limiter admits and flags the degradation.
    pub fn fail_open() -> Self {
        RateDecision {
            allowed: true,
            retry_after_secs: None,
            failed_open: true,
        }
    }
}
