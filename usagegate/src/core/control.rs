//! The control plane: rate admission plus the credit and event ledgers
//!
//! All three operations run against one [`Store`] and keep no state of
//! their own, so any number of service instances can share the same
//! persistent store safely.

use std::time::SystemTime;

use super::ControlError;
use super::bucket::{RateDecision, RateLimit};
use super::events::{DedupKey, EventRecord};
use super::store::{LedgerOutcome, Store};

/// Why a consume/grant call did not (or did not newly) move the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeReason {
    /// The subject cannot afford the operation; user-actionable, not
    /// retryable until more credits are acquired.
    InsufficientBalance,
    /// The idempotency key was already settled. Not an error: the original
    /// outcome is returned unchanged.
    AlreadyProcessed,
}

/// Authoritative outcome of a credit ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeResult {
    /// Whether the operation took (or originally took) effect
    pub success: bool,
    /// Balance after the operation as the winning call computed it
    pub new_balance: Option<i64>,
    pub reason: Option<ConsumeReason>,
}

impl From<LedgerOutcome> for ConsumeResult {
    fn from(outcome: LedgerOutcome) -> Self {
        match outcome {
            LedgerOutcome::Applied { new_balance } => ConsumeResult {
                success: true,
                new_balance: Some(new_balance),
                reason: None,
            },
            LedgerOutcome::Insufficient { balance } => ConsumeResult {
                success: false,
                new_balance: Some(balance),
                reason: Some(ConsumeReason::InsufficientBalance),
            },
            LedgerOutcome::Replayed {
                accepted,
                balance_after,
            } => ConsumeResult {
                success: accepted,
                new_balance: Some(balance_after),
                reason: Some(ConsumeReason::AlreadyProcessed),
            },
        }
    }
}

/// Outcome of an event ledger insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    /// False when the dedup key was already present ("already awarded" is a
    /// steady-state outcome, not a fault)
    pub awarded: bool,
}

/// The usage-control plane.
///
/// Every billable or abuse-sensitive action passes through here before
/// mutating state. The rate check is advisory and fails open; the ledger
/// operations are authoritative and fail closed.
///
/// # Example
///
/// ```
/// use std::time::SystemTime;
/// use usagegate::{ControlPlane, MemoryStore, RateLimit};
///
/// let mut plane = ControlPlane::new(MemoryStore::builder().initial_grant(30).build());
///
/// // Admission: 10-token bucket refilling 1 token/s, 1 token per call
/// let limit = RateLimit::new(10.0, 1.0, 1.0);
/// let decision = plane
///     .check_rate("user:42", "generate-menu", &limit, SystemTime::now())
///     .unwrap();
/// assert!(decision.allowed);
///
/// // Metered debit, exactly once per idempotency key
/// let result = plane
///     .consume_credits("user:42", 5, "generate-menu:user:42:2025-W31", SystemTime::now())
///     .unwrap();
/// assert_eq!(result.new_balance, Some(25));
/// ```
pub struct ControlPlane<S: Store> {
    store: S,
}

impl<S: Store> ControlPlane<S> {
    pub fn new(store: S) -> Self {
        ControlPlane { store }
    }

    /// Token-bucket admission check for (identifier, endpoint).
    ///
    /// Fails OPEN: a store fault admits the request, flagged on the
    /// decision. The limiter's job is to shed abusive load, not to gate
    /// legitimate traffic on the availability of a non-critical subsystem.
    /// On denial the caller must reject its triggering request with the
    /// advisory `retry_after_secs` and must not retry internally.
    ///
    /// # Errors
    ///
    /// [`ControlError::InvalidLimit`] if the limit parameters are not
    /// positive finite numbers (with `cost >= 0`).
    pub fn check_rate(
        &mut self,
        identifier: &str,
        endpoint: &str,
        limit: &RateLimit,
        now: SystemTime,
    ) -> Result<RateDecision, ControlError> {
        if !limit.is_valid() {
            return Err(ControlError::InvalidLimit);
        }

        match self.store.throttle(identifier, endpoint, limit, now) {
            Ok(outcome) if outcome.allowed => Ok(RateDecision::allow()),
            Ok(_) => Ok(RateDecision::deny(limit.retry_after_secs())),
            Err(_) => Ok(RateDecision::fail_open()),
        }
    }

    /// Debit `amount` credits from `subject_id`, exactly once per
    /// `idempotency_key`.
    ///
    /// A replay returns the originally computed result (same success flag,
    /// same balance) tagged [`ConsumeReason::AlreadyProcessed`] without
    /// re-debiting, which makes the call safe to retry over an unreliable
    /// network and safe under duplicate concurrent submission. Callers must
    /// derive the key deterministically from the logical operation, never
    /// per attempt.
    ///
    /// Fails CLOSED: store unavailability propagates as an error, since a
    /// silent un-debited success would hand out a paid feature for free.
    ///
    /// # Errors
    ///
    /// [`ControlError::InvalidAmount`] for non-positive amounts;
    /// [`ControlError::StoreUnavailable`] on store faults.
    pub fn consume_credits(
        &mut self,
        subject_id: &str,
        amount: i64,
        idempotency_key: &str,
        now: SystemTime,
    ) -> Result<ConsumeResult, ControlError> {
        if amount <= 0 {
            return Err(ControlError::InvalidAmount(amount));
        }

        let outcome = self
            .store
            .debit(idempotency_key, subject_id, amount, now)
            .map_err(ControlError::StoreUnavailable)?;
        Ok(ConsumeResult::from(outcome))
    }

    /// Credit `amount` to `subject_id`, exactly once per `idempotency_key`.
    ///
    /// Same replay semantics as [`consume_credits`](Self::consume_credits);
    /// used for purchase webhooks and reward fulfillment. Fails CLOSED.
    pub fn grant_credits(
        &mut self,
        subject_id: &str,
        amount: i64,
        idempotency_key: &str,
        now: SystemTime,
    ) -> Result<ConsumeResult, ControlError> {
        if amount <= 0 {
            return Err(ControlError::InvalidAmount(amount));
        }

        let outcome = self
            .store
            .credit(idempotency_key, subject_id, amount, now)
            .map_err(ControlError::StoreUnavailable)?;
        Ok(ConsumeResult::from(outcome))
    }

    /// Record an event at most once per dedup key.
    ///
    /// A duplicate is silently `awarded = false`. Awarded credits land on
    /// the user's balance in the same atomic step as the row insert. Fails
    /// CLOSED like the credit ledger.
    pub fn record_event(
        &mut self,
        key: &DedupKey,
        record: &EventRecord,
        now: SystemTime,
    ) -> Result<EventOutcome, ControlError> {
        if record.points < 0 || record.credits < 0 {
            return Err(ControlError::InvalidAmount(record.points.min(record.credits)));
        }

        let awarded = self
            .store
            .insert_event(&key.encode(), record, now)
            .map_err(ControlError::StoreUnavailable)?;
        Ok(EventOutcome { awarded })
    }

    /// Current derived balance for a subject. Read-only; fails CLOSED.
    pub fn balance(&self, subject_id: &str) -> Result<i64, ControlError> {
        self.store
            .balance(subject_id)
            .map_err(ControlError::StoreUnavailable)
    }
}
