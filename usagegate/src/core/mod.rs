//! Core components of the usagegate control plane
//!
//! - [`bucket`]: token-bucket state, limit parameters and refill arithmetic
//! - [`control`]: the [`ControlPlane`] tying the three operations together
//! - [`events`]: dedup keys and payloads for the event/reward ledger
//! - [`store`]: the atomic persistence seam and the in-memory store

pub mod bucket;
pub mod control;
pub mod events;
pub mod store;

pub use bucket::{Bucket, RateDecision, RateLimit};
pub use control::{ConsumeReason, ConsumeResult, ControlPlane, EventOutcome};
pub use events::{DedupKey, EventRecord, day_index};
pub use store::{LedgerOutcome, MemoryStore, MemoryStoreBuilder, Store, TakeOutcome};

use std::error::Error;
use std::fmt;

/// Errors surfaced by control-plane operations.
///
/// Rate denial, duplicate awards and replays are ordinary outcomes, not
/// errors; only caller bugs and infrastructure faults land here. Store
/// faults reach the caller solely from the ledger operations — the rate
/// limiter converts them into a fail-open admission instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// Limit parameters are not positive finite numbers
    InvalidLimit,
    /// A non-positive amount was passed to a ledger operation
    InvalidAmount(i64),
    /// The persistent store could not complete the operation
    StoreUnavailable(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::InvalidLimit => write!(f, "invalid rate limit parameters"),
            ControlError::InvalidAmount(n) => write!(f, "invalid amount: {n}"),
            ControlError::StoreUnavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl Error for ControlError {}
