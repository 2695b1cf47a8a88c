use std::time::{Duration, SystemTime};

use super::{LedgerOutcome, Store, TakeOutcome};
use crate::core::bucket::{Bucket, RateLimit};
use crate::core::events::EventRecord;

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

// Configuration constants
const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_BUCKET_RETENTION_SECS: u64 = 3600;
const DEFAULT_INITIAL_GRANT: i64 = 0;

/// One credit ledger row. Inserted exactly once per idempotency key, never
/// mutated, retained for audit and replay.
struct LedgerEntry {
    #[allow(dead_code)]
    subject_id: String,
    /// Signed balance delta this entry applied (zero for rejected attempts)
    #[allow(dead_code)]
    amount: i64,
    accepted: bool,
    balance_after: i64,
    #[allow(dead_code)]
    created_at: SystemTime,
}

/// One event ledger row, keyed by its dedup key.
struct EventRow {
    #[allow(dead_code)]
    user_id: String,
    #[allow(dead_code)]
    event_type: String,
    #[allow(dead_code)]
    points: i64,
    #[allow(dead_code)]
    credits: i64,
    #[allow(dead_code)]
    processed_at: SystemTime,
}

/// In-memory store executing each control-plane decision in a single
/// `&mut self` call.
///
/// Suitable for tests and single-node deployments; a multi-instance
/// deployment plugs a database-procedure-backed [`Store`] into the same
/// seam. Idle buckets are swept at a fixed interval; ledger and event rows
/// are retained.
///
/// # Example
///
/// ```
/// use usagegate::MemoryStore;
///
/// let store = MemoryStore::builder()
///     .capacity(100_000)
///     .initial_grant(30)
///     .build();
/// ```
pub struct MemoryStore {
    buckets: HashMap<(String, String), Bucket>,
    ledger: HashMap<String, LedgerEntry>,
    events: HashMap<String, EventRow>,
    balances: HashMap<String, i64>,
    /// Credits a subject starts with when first seen
    initial_grant: i64,
    /// Buckets idle longer than this are removed by the sweep
    bucket_retention: Duration,
    sweep_interval: Duration,
    next_sweep: SystemTime,
}

/// Builder for configuring a [`MemoryStore`].
pub struct MemoryStoreBuilder {
    capacity: usize,
    initial_grant: i64,
    bucket_retention: Duration,
    sweep_interval: Duration,
}

impl MemoryStore {
    /// Create a store with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder {
            capacity: DEFAULT_CAPACITY,
            initial_grant: DEFAULT_INITIAL_GRANT,
            bucket_retention: Duration::from_secs(DEFAULT_BUCKET_RETENTION_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }

    fn with_config(builder: MemoryStoreBuilder) -> Self {
        // Pre-allocate with overhead to avoid rehashing
        let cap = (builder.capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize;
        MemoryStore {
            buckets: HashMap::with_capacity(cap),
            ledger: HashMap::with_capacity(cap),
            events: HashMap::with_capacity(cap),
            balances: HashMap::with_capacity(cap),
            initial_grant: builder.initial_grant,
            bucket_retention: builder.bucket_retention,
            sweep_interval: builder.sweep_interval,
            next_sweep: SystemTime::now() + builder.sweep_interval,
        }
    }

    fn balance_of(&self, subject_id: &str) -> i64 {
        self.balances
            .get(subject_id)
            .copied()
            .unwrap_or(self.initial_grant)
    }

    fn maybe_sweep(&mut self, now: SystemTime) {
        if now >= self.next_sweep {
            let retention = self.bucket_retention;
            self.buckets.retain(|_, bucket| {
                match now.duration_since(bucket.last_refill) {
                    Ok(idle) => idle <= retention,
                    // last_refill in the future: keep, the clock will catch up
                    Err(_) => true,
                }
            });
            self.next_sweep = now + self.sweep_interval;
        }
    }

    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[cfg(test)]
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    #[cfg(test)]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn throttle(
        &mut self,
        identifier: &str,
        endpoint: &str,
        limit: &RateLimit,
        now: SystemTime,
    ) -> Result<TakeOutcome, String> {
        // Only sweep periodically, not on every operation
        self.maybe_sweep(now);

        let bucket = self
            .buckets
            .entry((identifier.to_string(), endpoint.to_string()))
            .or_insert_with(|| Bucket::full(limit, now));
        let allowed = bucket.refill_and_take(limit, now);

        Ok(TakeOutcome {
            allowed,
            tokens: bucket.tokens,
        })
    }

    fn debit(
        &mut self,
        idempotency_key: &str,
        subject_id: &str,
        amount: i64,
        now: SystemTime,
    ) -> Result<LedgerOutcome, String> {
        if let Some(entry) = self.ledger.get(idempotency_key) {
            return Ok(LedgerOutcome::Replayed {
                accepted: entry.accepted,
                balance_after: entry.balance_after,
            });
        }

        let balance = self.balance_of(subject_id);
        if balance < amount {
            self.ledger.insert(
                idempotency_key.to_string(),
                LedgerEntry {
                    subject_id: subject_id.to_string(),
                    amount: 0,
                    accepted: false,
                    balance_after: balance,
                    created_at: now,
                },
            );
            return Ok(LedgerOutcome::Insufficient { balance });
        }

        let new_balance = balance - amount;
        self.balances.insert(subject_id.to_string(), new_balance);
        self.ledger.insert(
            idempotency_key.to_string(),
            LedgerEntry {
                subject_id: subject_id.to_string(),
                amount: -amount,
                accepted: true,
                balance_after: new_balance,
                created_at: now,
            },
        );

        Ok(LedgerOutcome::Applied { new_balance })
    }

    fn credit(
        &mut self,
        idempotency_key: &str,
        subject_id: &str,
        amount: i64,
        now: SystemTime,
    ) -> Result<LedgerOutcome, String> {
        if let Some(entry) = self.ledger.get(idempotency_key) {
            return Ok(LedgerOutcome::Replayed {
                accepted: entry.accepted,
                balance_after: entry.balance_after,
            });
        }

        let new_balance = self.balance_of(subject_id).saturating_add(amount);
        self.balances.insert(subject_id.to_string(), new_balance);
        self.ledger.insert(
            idempotency_key.to_string(),
            LedgerEntry {
                subject_id: subject_id.to_string(),
                amount,
                accepted: true,
                balance_after: new_balance,
                created_at: now,
            },
        );

        Ok(LedgerOutcome::Applied { new_balance })
    }

    fn insert_event(
        &mut self,
        dedup_key: &str,
        record: &EventRecord,
        now: SystemTime,
    ) -> Result<bool, String> {
        if self.events.contains_key(dedup_key) {
            return Ok(false);
        }

        if record.credits > 0 {
            let new_balance = self.balance_of(&record.user_id).saturating_add(record.credits);
            self.balances.insert(record.user_id.clone(), new_balance);
        }
        self.events.insert(
            dedup_key.to_string(),
            EventRow {
                user_id: record.user_id.clone(),
                event_type: record.event_type.clone(),
                points: record.points,
                credits: record.credits,
                processed_at: now,
            },
        );

        Ok(true)
    }

    fn balance(&self, subject_id: &str) -> Result<i64, String> {
        Ok(self.balance_of(subject_id))
    }
}

impl MemoryStoreBuilder {
    /// Expected number of tracked keys; 30% extra space is allocated to
    /// reduce hash collisions.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Credits a subject starts with when first seen.
    pub fn initial_grant(mut self, credits: i64) -> Self {
        self.initial_grant = credits;
        self
    }

    /// How long a bucket may sit idle before the sweep removes it.
    pub fn bucket_retention(mut self, retention: Duration) -> Self {
        self.bucket_retention = retention;
        self
    }

    /// Interval between idle-bucket sweeps.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn build(self) -> MemoryStore {
        MemoryStore::with_config(self)
    }
}
