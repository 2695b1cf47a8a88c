//! Dedup keys and payloads for the event/reward ledger

use std::time::{SystemTime, UNIX_EPOCH};

const SECS_PER_DAY: i64 = 86_400;

/// Uniqueness key for an event ledger row.
///
/// Two strategies coexist, selected by event source: an externally supplied
/// id (payment-provider webhooks, delivered at-least-once) or a derived
/// once-per-day window key for recurring rewards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// Provider-generated event id
    External(String),
    /// One award per (user, event type, calendar day in the reference zone)
    Daily {
        user_id: String,
        event_type: String,
        day: i64,
    },
}

impl DedupKey {
    pub fn external(id: impl Into<String>) -> Self {
        DedupKey::External(id.into())
    }

    /// Daily window key. The calendar day is computed in a fixed reference
    /// time zone (`utc_offset_secs` east of UTC), never the client's, so the
    /// boundary is server-authoritative.
    pub fn daily(
        user_id: impl Into<String>,
        event_type: impl Into<String>,
        now: SystemTime,
        utc_offset_secs: i32,
    ) -> Self {
        DedupKey::Daily {
            user_id: user_id.into(),
            event_type: event_type.into(),
            day: day_index(now, utc_offset_secs),
        }
    }

    /// Stable string form used as the storage-level unique key.
    pub fn encode(&self) -> String {
        match self {
            DedupKey::External(id) => format!("ext:{id}"),
            DedupKey::Daily {
                user_id,
                event_type,
                day,
            } => format!("day:{user_id}:{event_type}:{day}"),
        }
    }
}

/// Calendar day index (days since the Unix epoch) in a fixed-offset zone.
pub fn day_index(now: SystemTime, utc_offset_secs: i32) -> i64 {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    (secs + utc_offset_secs as i64).div_euclid(SECS_PER_DAY)
}

/// Payload recorded alongside an awarded event.
///
/// `credits` is applied to the user's balance in the same atomic step as the
/// row insert; `points` is retained on the row for gamification readers.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub user_id: String,
    pub event_type: String,
    pub points: i64,
    pub credits: i64,
}
