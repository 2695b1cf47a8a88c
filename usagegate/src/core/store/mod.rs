//! Atomic persistence seam for the control plane
//!
//! Every multi-step decision described by the control plane executes as one
//! atomic unit at the store: one trait method per operation type, each
//! completing its full read-modify-write before returning. Implementations
//! must never expose a read-then-write window between the steps of a single
//! call — the unique constraint behind [`Store::debit`], [`Store::credit`]
//! and [`Store::insert_event`] is the concurrency primitive; no application
//! locks or optimistic-retry loops sit on top of it.

use std::time::SystemTime;

use super::bucket::RateLimit;
use super::events::EventRecord;

mod memory;

pub use memory::{MemoryStore, MemoryStoreBuilder};

/// Result of the atomic refill-and-take bucket procedure.
#[derive(Debug, Clone, Copy)]
pub struct TakeOutcome {
    /// Whether `cost` tokens were taken
    pub allowed: bool,
    /// Tokens left after the call (post-refill, post-debit)
    pub tokens: f64,
}

/// Result of an atomic ledger insert keyed by an idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// This call won the insert and the balance moved.
    Applied { new_balance: i64 },
    /// This call won the insert but the balance was short. A rejected
    /// zero-amount entry now pins the outcome for replays.
    Insufficient { balance: i64 },
    /// An entry already held the key; the originally computed outcome is
    /// returned unchanged and nothing moves.
    Replayed { accepted: bool, balance_after: i64 },
}

/// Store trait for control-plane state (buckets, ledger, events, balances).
pub trait Store {
    /// Refill the bucket for (identifier, endpoint) and try to take
    /// `limit.cost` tokens, creating a full bucket on first sight. The
    /// refilled state is persisted whether or not the take succeeds.
    fn throttle(
        &mut self,
        identifier: &str,
        endpoint: &str,
        limit: &RateLimit,
        now: SystemTime,
    ) -> Result<TakeOutcome, String>;

    /// Insert a debit entry under `idempotency_key` and move the subject's
    /// balance, or replay the entry that already holds the key.
    fn debit(
        &mut self,
        idempotency_key: &str,
        subject_id: &str,
        amount: i64,
        now: SystemTime,
    ) -> Result<LedgerOutcome, String>;

    /// Insert a credit entry under `idempotency_key` and move the subject's
    /// balance, or replay. Credits cannot be rejected for balance.
    fn credit(
        &mut self,
        idempotency_key: &str,
        subject_id: &str,
        amount: i64,
        now: SystemTime,
    ) -> Result<LedgerOutcome, String>;

    /// Insert an event row under its dedup key. Returns `false` without
    /// touching anything when the key already exists; on insert, awarded
    /// credits land on the user's balance in the same atomic step.
    fn insert_event(
        &mut self,
        dedup_key: &str,
        record: &EventRecord,
        now: SystemTime,
    ) -> Result<bool, String>;

    /// Current derived balance for a subject (initial grant minus debits
    /// plus credits). Unknown subjects report the initial grant.
    fn balance(&self, subject_id: &str) -> Result<i64, String>;
}
