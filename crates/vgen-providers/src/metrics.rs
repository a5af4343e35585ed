//! Provider metrics collection.
//!
//! - Attempt counters by provider and outcome
//! - Attempt latency histograms
//! - Poll counts for asynchronous providers

use std::time::Duration;

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Provider attempts by provider and outcome.
    pub const ATTEMPTS_TOTAL: &str = "vgen_provider_attempts_total";

    /// Attempt latency in seconds by provider.
    pub const ATTEMPT_LATENCY_SECONDS: &str = "vgen_provider_attempt_latency_seconds";

    /// Number of polls before an asynchronous generation resolved.
    pub const POLLS: &str = "vgen_provider_polls";

    /// Time spent polling in seconds by provider.
    pub const POLL_WAIT_SECONDS: &str = "vgen_provider_poll_wait_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record one provider attempt. `outcome` is "success" or an error kind.
pub fn record_attempt(provider: &str, outcome: &str, elapsed: Duration) {
    counter!(
        names::ATTEMPTS_TOTAL,
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::ATTEMPT_LATENCY_SECONDS,
        "provider" => provider.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_poll_wait(provider: &str, polls: u32, waited: Duration) {
    histogram!(names::POLLS, "provider" => provider.to_string()).record(f64::from(polls));
    histogram!(names::POLL_WAIT_SECONDS, "provider" => provider.to_string())
        .record(waited.as_secs_f64());
}
