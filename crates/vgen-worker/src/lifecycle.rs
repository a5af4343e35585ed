//! Job lifecycle.
//!
//! Drives one job through `queued -> dispatching -> assembling -> completed`
//! or into `failed`. Settlement runs once, before the job is marked completed;
//! every path into `failed` refunds the pending debit before the transition.
//! A job is archived only once its credits are settled or refunded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::Instrument;
use vgen_ledger::{CreditSettlement, LedgerResult, RefundOutcome, SettlementRequest, SettlementStatus};
use vgen_models::{JobId, JobStatus, ScenePlan, SceneResult, VideoJob};
use vgen_providers::CancelSignal;

use crate::assembly::AssemblyService;
use crate::dispatcher::{DispatchObserver, DispatchTarget, SceneDispatcher, StopReason};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::registry::JobRegistry;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Progress share of the dispatch phase (10 -> 80).
const DISPATCH_PROGRESS_START: usize = 10;
const DISPATCH_PROGRESS_END: usize = 80;

/// Refund attempts on the failure path before the job is left unarchived.
const REFUND_ATTEMPTS: u32 = 3;
const REFUND_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Writes dispatcher progress into the registry.
struct RegistryProgress<'a> {
    registry: &'a JobRegistry,
    job_id: &'a JobId,
}

#[async_trait]
impl DispatchObserver for RegistryProgress<'_> {
    async fn provider_attempted(&self, _scene_index: u32, provider_id: &str) {
        let _ = self
            .registry
            .update(self.job_id, |job| job.current_provider = Some(provider_id.to_string()))
            .await;
    }

    async fn scene_resolved(&self, _result: &SceneResult, resolved: usize, total: usize) {
        let span = DISPATCH_PROGRESS_END - DISPATCH_PROGRESS_START;
        let progress = DISPATCH_PROGRESS_START + span * resolved / total.max(1);
        let _ = self
            .registry
            .update(self.job_id, |job| job.set_progress(progress as u8))
            .await;
    }
}

pub struct JobOrchestrator {
    registry: Arc<JobRegistry>,
    dispatcher: Arc<SceneDispatcher>,
    assembly: Arc<dyn AssemblyService>,
    settlement: Arc<CreditSettlement>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl JobOrchestrator {
    pub fn new(
        registry: Arc<JobRegistry>,
        dispatcher: Arc<SceneDispatcher>,
        assembly: Arc<dyn AssemblyService>,
        settlement: Arc<CreditSettlement>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            assembly,
            settlement,
            telemetry,
        }
    }

    /// Run a registered job to a terminal state and return that state.
    pub async fn run(
        &self,
        job_id: &JobId,
        plans: &[ScenePlan],
        cancel: CancelSignal,
    ) -> WorkerResult<JobStatus> {
        let logger = JobLogger::new(job_id, "generation");
        let span = logger.create_span();
        self.run_inner(job_id, plans, cancel, &logger)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        job_id: &JobId,
        plans: &[ScenePlan],
        cancel: CancelSignal,
        logger: &JobLogger,
    ) -> WorkerResult<JobStatus> {
        let started = Instant::now();
        let job = self
            .registry
            .get(job_id)
            .await
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))?;

        if *cancel.borrow() {
            return self.fail(&job, WorkerError::Cancelled, started, logger).await;
        }

        self.registry
            .update(job_id, |job| job.transition(JobStatus::Dispatching))
            .await??;
        logger.log_start(&format!(
            "{} scenes, {}s, price {} credits",
            plans.len(),
            job.requested_duration,
            job.total_price
        ));
        self.telemetry.emit(
            TelemetryEvent::info("job dispatching")
                .for_job(job_id, &job.user_id)
                .with_field("scene_count", plans.len() as u64),
        );

        let observer = RegistryProgress {
            registry: &self.registry,
            job_id,
        };
        let target = DispatchTarget {
            job_id,
            user_id: &job.user_id,
        };
        let report = self
            .dispatcher
            .generate_scenes(target, plans, cancel.clone(), &observer)
            .await;

        let succeeded = report.succeeded();
        let job = self
            .registry
            .update(job_id, |job| {
                job.record_scene_results(report.results).map(|_| job.clone())
            })
            .await??;

        // Partially-generated scenes of a cancelled job are discarded.
        if report.stopped == Some(StopReason::Cancelled) {
            return self.fail(&job, WorkerError::Cancelled, started, logger).await;
        }

        if succeeded == 0 {
            return self
                .fail(&job, WorkerError::NoScenesSucceeded, started, logger)
                .await;
        }

        self.registry
            .update(job_id, |job| job.transition(JobStatus::Assembling))
            .await??;
        logger.log_progress(&format!("assembling, {}", job.scene_summary()));

        let artifacts = job.successful_artifacts();
        let output = match self.assembly.assemble(job_id, job.style, &artifacts).await {
            Ok(output) => output,
            Err(e) => {
                let err = match e {
                    WorkerError::Assembly(_) => e,
                    other => WorkerError::assembly(other.to_string()),
                };
                return self.fail(&job, err, started, logger).await;
            }
        };

        // Claiming the job closes the cancel window before any credits move.
        if !self.registry.begin_settlement(job_id).await? {
            return self.fail(&job, WorkerError::Cancelled, started, logger).await;
        }

        let settlement_logger = logger.for_operation("settlement");
        match self.settlement.settle(&SettlementRequest::for_job(&job)).await {
            Ok(outcome) if outcome.success() => {
                if outcome.status == SettlementStatus::AlreadySettled {
                    settlement_logger.log_warning("job was already settled");
                }
                settlement_logger.log_completion(&format!(
                    "user balance {}, royalty {}, fee {}",
                    outcome.user_balance, outcome.royalty_amount, outcome.platform_fee
                ));
            }
            Ok(_) => {
                let err = WorkerError::SettlementRollback("job was refunded before settlement".into());
                return self.fail(&job, err, started, logger).await;
            }
            Err(e) => {
                settlement_logger.log_error(&e.to_string());
                return self.fail(&job, e.into(), started, logger).await;
            }
        }

        self.registry
            .update(job_id, |job| {
                job.complete(output.clone())?;
                job.archived = true;
                Ok::<_, vgen_models::ModelError>(())
            })
            .await??;

        logger.log_completion(&format!(
            "{} -> {}",
            job.scene_summary(),
            output.final_video_url
        ));
        self.telemetry.emit(
            TelemetryEvent::info("job completed")
                .for_job(job_id, &job.user_id)
                .with_field("scene_summary", job.scene_summary())
                .with_field("final_video_url", output.final_video_url.as_str())
                .with_field("elapsed_ms", started.elapsed().as_millis() as u64),
        );
        metrics::record_job_finished("completed", started.elapsed());
        Ok(JobStatus::Completed)
    }

    /// Refund any pending debit, then mark the job failed. The job is
    /// archived only when the refund went through.
    async fn fail(
        &self,
        job: &VideoJob,
        err: WorkerError,
        started: Instant,
        logger: &JobLogger,
    ) -> WorkerResult<JobStatus> {
        let message = err.user_message();
        logger.log_error(&err.to_string());

        let refund = self.refund_with_retry(job, &message, logger).await;

        self.registry
            .update(&job.id, |job| {
                job.fail(message.as_str())?;
                job.archived = refund.is_ok();
                Ok::<_, vgen_models::ModelError>(())
            })
            .await??;

        let mut event = TelemetryEvent::error("job failed")
            .for_job(&job.id, &job.user_id)
            .with_field("error", message.as_str());
        event = match &refund {
            Ok(RefundOutcome::Refunded { amount }) => event.with_field("refunded", *amount),
            Ok(_) => event.with_field("refunded", 0i64),
            Err(e) => event
                .with_field("refunded", 0i64)
                .with_field("refund_error", e.to_string()),
        };
        self.telemetry.emit(event);
        metrics::record_job_finished("failed", started.elapsed());
        Ok(JobStatus::Failed)
    }

    async fn refund_with_retry(
        &self,
        job: &VideoJob,
        reason: &str,
        logger: &JobLogger,
    ) -> LedgerResult<RefundOutcome> {
        let refund_logger = logger.for_operation("refund");
        let mut attempt = 1;
        loop {
            match self.settlement.refund(job.id.as_str(), &job.user_id, reason).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < REFUND_ATTEMPTS => {
                    refund_logger.log_warning(&format!(
                        "attempt {}/{} failed: {}",
                        attempt, REFUND_ATTEMPTS, e
                    ));
                    attempt += 1;
                    tokio::time::sleep(REFUND_RETRY_DELAY).await;
                }
                Err(e) => {
                    refund_logger.log_error(&format!(
                        "refund failed after {} attempts, job left unarchived: {}",
                        REFUND_ATTEMPTS, e
                    ));
                    return Err(e);
                }
            }
        }
    }
}
