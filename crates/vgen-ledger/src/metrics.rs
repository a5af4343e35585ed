//! Ledger metrics collection.
//!
//! Provides standardized metrics for monitoring credit operations:
//! - Reservation counters by outcome
//! - Settlement counters by outcome
//! - Optimistic-lock retry and refund counters

use metrics::counter;

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Credit reservations by outcome (reserved, insufficient, contention).
    pub const RESERVATIONS_TOTAL: &str = "vgen_credit_reservations_total";

    /// Reservation retries after a version conflict.
    pub const RESERVE_RETRIES_TOTAL: &str = "vgen_credit_reserve_retries_total";

    /// Settlements by outcome (settled, rolled_back).
    pub const SETTLEMENTS_TOTAL: &str = "vgen_settlements_total";

    /// Refunds issued.
    pub const REFUNDS_TOTAL: &str = "vgen_refunds_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_reservation(outcome: &str) {
    counter!(names::RESERVATIONS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_reserve_retry() {
    counter!(names::RESERVE_RETRIES_TOTAL).increment(1);
}

pub fn record_settlement(outcome: &str) {
    counter!(names::SETTLEMENTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_refund() {
    counter!(names::REFUNDS_TOTAL).increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::RESERVATIONS_TOTAL.contains("reservations"));
        assert!(names::SETTLEMENTS_TOTAL.contains("settlements"));
        assert!(names::REFUNDS_TOTAL.ends_with("_total"));
    }
}
