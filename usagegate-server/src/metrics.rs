//! Simple metrics collection for observability
//!
//! Lightweight atomic counters with a Prometheus text exporter. Designed
//! for minimal overhead and zero allocations in the hot path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use usagegate::{ConsumeReason, ConsumeResult, RateDecision};

/// Core metrics collected by the server
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// Total requests received
    pub total_requests: AtomicU64,

    /// Rate limiting decisions
    pub throttle_allowed: AtomicU64,
    pub throttle_denied: AtomicU64,
    pub throttle_failed_open: AtomicU64,

    /// Credit ledger outcomes
    pub credits_applied: AtomicU64,
    pub credits_insufficient: AtomicU64,
    pub credits_replayed: AtomicU64,

    /// Event ledger outcomes
    pub events_awarded: AtomicU64,
    pub events_duplicate: AtomicU64,

    /// Fail-closed errors surfaced to callers
    pub request_errors: AtomicU64,

    /// Request latency buckets (in microseconds)
    pub latency_under_1ms: AtomicU64,
    pub latency_under_10ms: AtomicU64,
    pub latency_under_100ms: AtomicU64,
    pub latency_under_1s: AtomicU64,
    pub latency_over_1s: AtomicU64,

    /// Histogram support
    pub latency_sum_micros: AtomicU64,
    pub latency_count: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            throttle_allowed: AtomicU64::new(0),
            throttle_denied: AtomicU64::new(0),
            throttle_failed_open: AtomicU64::new(0),
            credits_applied: AtomicU64::new(0),
            credits_insufficient: AtomicU64::new(0),
            credits_replayed: AtomicU64::new(0),
            events_awarded: AtomicU64::new(0),
            events_duplicate: AtomicU64::new(0),
            request_errors: AtomicU64::new(0),
            latency_under_1ms: AtomicU64::new(0),
            latency_under_10ms: AtomicU64::new(0),
            latency_under_100ms: AtomicU64::new(0),
            latency_under_1s: AtomicU64::new(0),
            latency_over_1s: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }

    /// Record a rate-check decision and its latency.
    pub fn record_throttle(&self, decision: &RateDecision, latency_us: u64) {
        self.record_latency(latency_us);

        if decision.failed_open {
            self.throttle_failed_open.fetch_add(1, Ordering::Relaxed);
        }
        if decision.allowed {
            self.throttle_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.throttle_denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a credit consume/grant outcome and its latency.
    pub fn record_credit(&self, result: &ConsumeResult, latency_us: u64) {
        self.record_latency(latency_us);

        match result.reason {
            Some(ConsumeReason::AlreadyProcessed) => {
                self.credits_replayed.fetch_add(1, Ordering::Relaxed)
            }
            Some(ConsumeReason::InsufficientBalance) => {
                self.credits_insufficient.fetch_add(1, Ordering::Relaxed)
            }
            None => self.credits_applied.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record an event ledger outcome and its latency.
    pub fn record_event(&self, awarded: bool, latency_us: u64) {
        self.record_latency(latency_us);

        if awarded {
            self.events_awarded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_duplicate.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a fail-closed error surfaced to the caller.
    pub fn record_error(&self, latency_us: u64) {
        self.record_latency(latency_us);
        self.request_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, latency_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match latency_us {
            0..=999 => self.latency_under_1ms.fetch_add(1, Ordering::Relaxed),
            1000..=9999 => self.latency_under_10ms.fetch_add(1, Ordering::Relaxed),
            10000..=99999 => self.latency_under_100ms.fetch_add(1, Ordering::Relaxed),
            100000..=999999 => self.latency_under_1s.fetch_add(1, Ordering::Relaxed),
            _ => self.latency_over_1s.fetch_add(1, Ordering::Relaxed),
        };

        self.latency_sum_micros
            .fetch_add(latency_us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        output.push_str("# HELP usagegate_uptime_seconds Time since server start in seconds\n");
        output.push_str("# TYPE usagegate_uptime_seconds gauge\n");
        output.push_str(&format!(
            "usagegate_uptime_seconds {}\n\n",
            self.uptime_seconds()
        ));

        output.push_str("# HELP usagegate_requests_total Total number of requests processed\n");
        output.push_str("# TYPE usagegate_requests_total counter\n");
        output.push_str(&format!(
            "usagegate_requests_total {}\n\n",
            self.total_requests.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP usagegate_throttle_decisions Rate-check decisions by outcome\n");
        output.push_str("# TYPE usagegate_throttle_decisions counter\n");
        output.push_str(&format!(
            "usagegate_throttle_decisions{{outcome=\"allowed\"}} {}\n",
            self.throttle_allowed.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "usagegate_throttle_decisions{{outcome=\"denied\"}} {}\n",
            self.throttle_denied.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "usagegate_throttle_decisions{{outcome=\"failed_open\"}} {}\n\n",
            self.throttle_failed_open.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP usagegate_credit_operations Credit ledger outcomes\n");
        output.push_str("# TYPE usagegate_credit_operations counter\n");
        output.push_str(&format!(
            "usagegate_credit_operations{{outcome=\"applied\"}} {}\n",
            self.credits_applied.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "usagegate_credit_operations{{outcome=\"insufficient\"}} {}\n",
            self.credits_insufficient.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "usagegate_credit_operations{{outcome=\"replayed\"}} {}\n\n",
            self.credits_replayed.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP usagegate_events Event ledger outcomes\n");
        output.push_str("# TYPE usagegate_events counter\n");
        output.push_str(&format!(
            "usagegate_events{{outcome=\"awarded\"}} {}\n",
            self.events_awarded.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "usagegate_events{{outcome=\"duplicate\"}} {}\n\n",
            self.events_duplicate.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP usagegate_request_errors Fail-closed errors returned to callers\n");
        output.push_str("# TYPE usagegate_request_errors counter\n");
        output.push_str(&format!(
            "usagegate_request_errors {}\n\n",
            self.request_errors.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP usagegate_request_duration_bucket Request latency distribution\n");
        output.push_str("# TYPE usagegate_request_duration_bucket histogram\n");
        let le_1ms = self.latency_under_1ms.load(Ordering::Relaxed);
        let le_10ms = le_1ms + self.latency_under_10ms.load(Ordering::Relaxed);
        let le_100ms = le_10ms + self.latency_under_100ms.load(Ordering::Relaxed);
        let le_1s = le_100ms + self.latency_under_1s.load(Ordering::Relaxed);
        output.push_str(&format!(
            "usagegate_request_duration_bucket{{le=\"0.001\"}} {le_1ms}\n"
        ));
        output.push_str(&format!(
            "usagegate_request_duration_bucket{{le=\"0.01\"}} {le_10ms}\n"
        ));
        output.push_str(&format!(
            "usagegate_request_duration_bucket{{le=\"0.1\"}} {le_100ms}\n"
        ));
        output.push_str(&format!(
            "usagegate_request_duration_bucket{{le=\"1\"}} {le_1s}\n"
        ));
        output.push_str(&format!(
            "usagegate_request_duration_bucket{{le=\"+Inf\"}} {}\n",
            self.latency_count.load(Ordering::Relaxed)
        ));

        let latency_sum_seconds =
            self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        output.push_str(&format!(
            "usagegate_request_duration_sum {latency_sum_seconds:.6}\n"
        ));
        output.push_str(&format!(
            "usagegate_request_duration_count {}\n",
            self.latency_count.load(Ordering::Relaxed)
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use usagegate::{ConsumeReason, ConsumeResult, RateDecision};

    fn applied() -> ConsumeResult {
        ConsumeResult {
            success: true,
            new_balance: Some(10),
            reason: None,
        }
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.throttle_allowed.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.request_errors.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_throttle_decisions_are_counted() {
        let metrics = Metrics::new();

        metrics.record_throttle(&RateDecision::fail_open(), 500);
        assert_eq!(metrics.throttle_allowed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.throttle_failed_open.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_1ms.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_credit_outcomes_are_counted() {
        let metrics = Metrics::new();

        metrics.record_credit(&applied(), 1500);
        let replayed = ConsumeResult {
            reason: Some(ConsumeReason::AlreadyProcessed),
            ..applied()
        };
        metrics.record_credit(&replayed, 1500);

        assert_eq!(metrics.credits_applied.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.credits_replayed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_10ms.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();

        metrics.record_throttle(&RateDecision::fail_open(), 500);
        metrics.record_event(true, 200);
        metrics.record_error(100);

        let output = metrics.export_prometheus();
        assert!(output.contains("usagegate_uptime_seconds"));
        assert!(output.contains("usagegate_requests_total 3"));
        assert!(output.contains("usagegate_throttle_decisions{outcome=\"failed_open\"} 1"));
        assert!(output.contains("usagegate_events{outcome=\"awarded\"} 1"));
        assert!(output.contains("usagegate_request_errors 1"));
    }
}
