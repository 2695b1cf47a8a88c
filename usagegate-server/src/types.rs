//! Common types used across the server
//!
//! Internal request types carried from the HTTP transport to the actor,
//! and the wire response types every decision is serialized into.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use usagegate::{ConsumeReason, ConsumeResult, EventOutcome, RateDecision, RateLimit};

/// Internal rate-check request, with limit parameters already resolved
/// against the per-endpoint limits table.
#[derive(Debug, Clone)]
pub struct ThrottleRequest {
    /// Who is being limited (e.g. "user:123", "ip:10.0.0.1")
    pub identifier: String,
    /// Which operation the limit guards (e.g. "generate-menu")
    pub endpoint: String,
    pub limit: RateLimit,
    /// Request timestamp for consistent decisions
    pub timestamp: SystemTime,
}

/// Rate-check response.
///
/// On denial the caller must reject its triggering request and surface
/// `retry_after` as advisory backoff; it must not retry internally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleResponse {
    pub allowed: bool,
    /// Seconds until a retry can succeed (0 if allowed)
    pub retry_after: u64,
}

impl From<RateDecision> for ThrottleResponse {
    fn from(decision: RateDecision) -> Self {
        ThrottleResponse {
            allowed: decision.allowed,
            retry_after: decision.retry_after_secs.unwrap_or(0),
        }
    }
}

/// Internal credit consume/grant request.
#[derive(Debug, Clone)]
pub struct CreditRequest {
    pub subject_id: String,
    pub amount: i64,
    /// Derived deterministically from the logical operation by the caller
    pub idempotency_key: String,
    pub timestamp: SystemTime,
}

/// Credit ledger response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<ConsumeResult> for CreditResponse {
    fn from(result: ConsumeResult) -> Self {
        CreditResponse {
            success: result.success,
            new_balance: result.new_balance,
            reason: result.reason.map(|reason| {
                match reason {
                    ConsumeReason::InsufficientBalance => "insufficient_balance",
                    ConsumeReason::AlreadyProcessed => "already_processed",
                }
                .to_string()
            }),
        }
    }
}

/// Internal event-record request.
#[derive(Debug, Clone)]
pub struct EventRequest {
    pub user_id: String,
    pub event_type: String,
    pub points: i64,
    pub credits: i64,
    /// Provider-generated id; absent for daily-window rewards
    pub event_id: Option<String>,
    pub timestamp: SystemTime,
}

/// Event ledger response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub awarded: bool,
}

impl From<EventOutcome> for EventResponse {
    fn from(outcome: EventOutcome) -> Self {
        EventResponse {
            awarded: outcome.awarded,
        }
    }
}

/// Balance query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub subject_id: String,
    pub balance: i64,
}
