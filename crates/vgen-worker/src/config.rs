//! Worker configuration.

use std::time::Duration;

use vgen_models::credit_cost::{DEFAULT_BASE_CREDITS, DEFAULT_CREDITS_PER_SECOND};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs orchestrated at once
    pub max_concurrent_jobs: usize,
    /// Maximum scene units generating at once within a single job
    pub max_scene_parallel: usize,
    /// Wall-clock budget for one provider attempt (submit + polling)
    pub attempt_timeout: Duration,
    /// Fixed interval between completion polls
    pub poll_interval: Duration,
    /// Polls before an async provider attempt times out
    pub max_poll_attempts: u32,
    /// Hard ceiling on the dispatch phase; `None` leaves it unbounded
    pub job_timeout: Option<Duration>,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Base URL of the compositing service
    pub assembly_url: String,
    /// Telemetry collector endpoint; events go to tracing when unset
    pub telemetry_url: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            max_scene_parallel: 8,
            // 60 polls at 5s plus headroom for submit and fetch
            attempt_timeout: Duration::from_secs(330),
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 60,
            job_timeout: Some(Duration::from_secs(1800)),
            shutdown_timeout: Duration::from_secs(30),
            assembly_url: "http://localhost:8090".to_string(),
            telemetry_url: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let job_timeout_secs: u64 = std::env::var("VGEN_JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1800);

        Self {
            max_concurrent_jobs: std::env::var("VGEN_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            max_scene_parallel: std::env::var("VGEN_MAX_SCENE_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
            attempt_timeout: Duration::from_secs(
                std::env::var("VGEN_ATTEMPT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(330),
            ),
            poll_interval: Duration::from_secs(
                std::env::var("VGEN_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            max_poll_attempts: std::env::var("VGEN_MAX_POLL_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            job_timeout: (job_timeout_secs > 0).then(|| Duration::from_secs(job_timeout_secs)),
            shutdown_timeout: Duration::from_secs(
                std::env::var("VGEN_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            assembly_url: std::env::var("ASSEMBLY_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8090".to_string()),
            telemetry_url: std::env::var("TELEMETRY_URL").ok().filter(|s| !s.is_empty()),
        }
    }
}

/// Credit pricing applied when a request is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    pub base_credits: i64,
    pub credits_per_second: i64,
    /// Royalty rate used when a creator is set without an explicit rate
    pub default_royalty_bps: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_credits: DEFAULT_BASE_CREDITS,
            credits_per_second: DEFAULT_CREDITS_PER_SECOND,
            default_royalty_bps: 1000,
        }
    }
}

impl PricingConfig {
    pub fn from_env() -> Self {
        Self {
            base_credits: std::env::var("VGEN_BASE_CREDITS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BASE_CREDITS),
            credits_per_second: std::env::var("VGEN_CREDITS_PER_SECOND")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CREDITS_PER_SECOND),
            default_royalty_bps: std::env::var("VGEN_ROYALTY_BPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        }
    }
}
