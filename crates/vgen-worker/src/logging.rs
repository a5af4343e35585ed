//! Structured job logging.
//!
//! Every record a job emits carries `job_id` and `phase`, so one job's trail
//! can be filtered out of interleaved concurrent output.

use tracing::{Level, Span};
use vgen_models::JobId;

macro_rules! job_event {
    ($level:expr, $logger:expr, $stage:literal, $message:expr) => {
        tracing::event!(
            $level,
            job_id = %$logger.job_id,
            phase = $logger.phase,
            "{} {}: {}",
            $logger.phase,
            $stage,
            $message
        )
    };
}

/// Logger bound to one job and one lifecycle phase.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    phase: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, phase: &'static str) -> Self {
        Self {
            job_id: job_id.clone(),
            phase,
        }
    }

    /// Same job, another phase (`"settlement"`, `"refund"`).
    pub fn for_operation(&self, phase: &'static str) -> Self {
        Self::new(&self.job_id, phase)
    }

    pub fn log_start(&self, message: &str) {
        job_event!(Level::INFO, self, "started", message);
    }

    pub fn log_progress(&self, message: &str) {
        job_event!(Level::INFO, self, "progress", message);
    }

    pub fn log_warning(&self, message: &str) {
        job_event!(Level::WARN, self, "warning", message);
    }

    pub fn log_error(&self, message: &str) {
        job_event!(Level::ERROR, self, "failed", message);
    }

    pub fn log_completion(&self, message: &str) {
        job_event!(Level::INFO, self, "finished", message);
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn operation(&self) -> &'static str {
        self.phase
    }

    /// Span the job's scene units and settlement run inside.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, phase = self.phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_switch_keeps_job() {
        let id = JobId::from_string("job-42");
        let logger = JobLogger::new(&id, "dispatch");
        let settlement = logger.for_operation("settlement");

        assert_eq!(logger.operation(), "dispatch");
        assert_eq!(settlement.operation(), "settlement");
        assert_eq!(settlement.job_id(), &id);
    }
}
