//! Orchestration metrics.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Jobs accepted by the generation service.
    pub const JOBS_ACCEPTED_TOTAL: &str = "vgen_jobs_accepted_total";

    /// Requests rejected before a job existed, by reason.
    pub const JOBS_REJECTED_TOTAL: &str = "vgen_jobs_rejected_total";

    /// Jobs reaching a terminal status, by status.
    pub const JOBS_FINISHED_TOTAL: &str = "vgen_jobs_finished_total";

    /// Jobs currently being orchestrated.
    pub const JOBS_ACTIVE: &str = "vgen_jobs_active";

    /// End-to-end job duration in seconds.
    pub const JOB_DURATION_SECONDS: &str = "vgen_job_duration_seconds";

    /// Scene outcomes, by outcome.
    pub const SCENES_TOTAL: &str = "vgen_scenes_total";

    /// Scene latency across the whole cascade, in seconds.
    pub const SCENE_LATENCY_SECONDS: &str = "vgen_scene_latency_seconds";

    /// Assembly calls, by outcome.
    pub const ASSEMBLY_TOTAL: &str = "vgen_assembly_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_job_accepted() {
    counter!(names::JOBS_ACCEPTED_TOTAL).increment(1);
}

pub fn record_job_rejected(reason: &'static str) {
    counter!(names::JOBS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_job_finished(status: &'static str, elapsed: Duration) {
    counter!(names::JOBS_FINISHED_TOTAL, "status" => status).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "status" => status).record(elapsed.as_secs_f64());
}

pub fn set_active_jobs(count: usize) {
    gauge!(names::JOBS_ACTIVE).set(count as f64);
}

pub fn record_scene(success: bool, elapsed: Duration) {
    let outcome = if success { "success" } else { "failed" };
    counter!(names::SCENES_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::SCENE_LATENCY_SECONDS, "outcome" => outcome).record(elapsed.as_secs_f64());
}

pub fn record_assembly(success: bool) {
    let outcome = if success { "success" } else { "failed" };
    counter!(names::ASSEMBLY_TOTAL, "outcome" => outcome).increment(1);
}
