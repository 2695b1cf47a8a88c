//! # usagegate
//!
//! The usage-control plane for a metered SaaS: a token-bucket rate limiter
//! plus an atomic, idempotent credit/event ledger that every billable or
//! abuse-sensitive action passes through before mutating state.
//!
//! ## Overview
//!
//! Three components operate against one shared [`Store`] and hold no state
//! of their own:
//!
//! - **Rate limiter** — per-(identifier, endpoint) token-bucket admission.
//!   Advisory and fail-open: a store fault admits the request.
//! - **Credit ledger** — exactly-once debit (or grant) of a metered balance
//!   per idempotency key. Authoritative and fail-closed.
//! - **Event/reward ledger** — exactly-once award per external event id or
//!   per (user, event-type, calendar-day) window. Fail-closed.
//!
//! Concurrent requests, duplicated webhook deliveries and multi-tab
//! double-clicks can never double-charge, double-credit or bypass the rate
//! caps: every multi-step decision executes as one atomic unit at the
//! store, and the unique constraint on the idempotency/dedup key is the
//! only concurrency primitive — no application locks, no retry loops.
//!
//! ## Quick start
//!
//! ```
//! use std::time::SystemTime;
//! use usagegate::{ControlPlane, DedupKey, EventRecord, MemoryStore, RateLimit};
//!
//! let store = MemoryStore::builder().initial_grant(30).build();
//! let mut plane = ControlPlane::new(store);
//! let now = SystemTime::now();
//!
//! // Admission control: 5-token burst, 1 token/s refill, 1 token per call
//! let limit = RateLimit::new(5.0, 1.0, 1.0);
//! let decision = plane.check_rate("user:42", "photo-scan", &limit, now).unwrap();
//! assert!(decision.allowed);
//!
//! // Metered consumption, safe to retry with the same key
//! let result = plane
//!     .consume_credits("user:42", 10, "generate-menu:user:42:w31", now)
//!     .unwrap();
//! assert!(result.success);
//! assert_eq!(result.new_balance, Some(20));
//!
//! // Daily app-open reward, at most once per calendar day (UTC)
//! let key = DedupKey::daily("user:42", "app_open", now, 0);
//! let record = EventRecord {
//!     user_id: "user:42".into(),
//!     event_type: "app_open".into(),
//!     points: 10,
//!     credits: 1,
//! };
//! let outcome = plane.record_event(&key, &record, now).unwrap();
//! assert!(outcome.awarded);
//! ```
//!
//! ## Idempotency keys
//!
//! Callers must derive keys deterministically from the logical operation
//! ("generate-menu for user U in week W"), never from a random value per
//! HTTP attempt, or idempotency is defeated. Webhook handlers use the
//! provider's event id via [`DedupKey::External`].
//!
//! ## Failure policy
//!
//! The asymmetry is deliberate: admission is best-effort (fail open, so
//! infrastructure trouble never turns into a user-visible outage), while
//! the ledgers are strict (fail closed, so an un-debited action can never
//! slip through as a free paid feature).
//!
//! ## Features
//!
//! - `ahash` (default): use AHash for faster hashing in [`MemoryStore`]

pub mod core;

pub use core::{
    Bucket, ConsumeReason, ConsumeResult, ControlError, ControlPlane, DedupKey, EventOutcome,
    EventRecord, LedgerOutcome, MemoryStore, MemoryStoreBuilder, RateDecision, RateLimit, Store,
    TakeOutcome, day_index,
};
