//! Generation service.
//!
//! Accepts requests, reserves credits, registers jobs and runs each job's
//! lifecycle on its own task, bounded by `max_concurrent_jobs`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};
use vgen_ledger::CreditSettlement;
use vgen_models::{GenerationRequest, JobAccepted, JobCostCalculator, JobId, JobStatusView, VideoJob};
use vgen_providers::{AdapterRegistry, FallbackSelector, ProviderCatalog};

use crate::assembly::AssemblyService;
use crate::config::{PricingConfig, WorkerConfig};
use crate::dispatcher::SceneDispatcher;
use crate::error::{WorkerError, WorkerResult};
use crate::lifecycle::JobOrchestrator;
use crate::metrics;
use crate::planner::{plan_scenes, SceneSource};
use crate::registry::{JobRegistry, JobStats};
use crate::telemetry::TelemetrySink;

/// Collaborators the service is built from.
pub struct ServiceDeps {
    pub catalog: Arc<ProviderCatalog>,
    pub adapters: Arc<AdapterRegistry>,
    pub assembly: Arc<dyn AssemblyService>,
    pub settlement: Arc<CreditSettlement>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

pub struct GenerationService {
    config: WorkerConfig,
    pricing: PricingConfig,
    registry: Arc<JobRegistry>,
    orchestrator: Arc<JobOrchestrator>,
    settlement: Arc<CreditSettlement>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl GenerationService {
    pub fn new(config: WorkerConfig, pricing: PricingConfig, deps: ServiceDeps) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let dispatcher = Arc::new(SceneDispatcher::new(
            FallbackSelector::new(deps.catalog),
            deps.adapters,
            Arc::clone(&deps.telemetry),
            &config,
        ));
        let orchestrator = Arc::new(JobOrchestrator::new(
            Arc::clone(&registry),
            dispatcher,
            deps.assembly,
            Arc::clone(&deps.settlement),
            deps.telemetry,
        ));
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            pricing,
            registry,
            orchestrator,
            settlement: deps.settlement,
            job_semaphore,
            shutdown,
        }
    }

    pub fn settlement(&self) -> &Arc<CreditSettlement> {
        &self.settlement
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Validate, price and reserve credits for a request, then start the job.
    ///
    /// Returns as soon as the job is registered. Insufficient credits reject
    /// the request before any job or ledger entry exists.
    pub async fn submit(&self, request: GenerationRequest) -> WorkerResult<JobAccepted> {
        if self.is_shutting_down() {
            return Err(WorkerError::ShuttingDown);
        }

        if let Err(reason) = request.validate_request() {
            metrics::record_job_rejected("validation");
            return Err(WorkerError::validation(reason));
        }

        let (source, summary) = match (request.prompt_text(), request.script_text()) {
            (Some(prompt), _) => (SceneSource::Topic(prompt), prompt.to_string()),
            (None, Some(script)) => (
                SceneSource::Script(script),
                script.lines().next().unwrap_or(script).trim().to_string(),
            ),
            (None, None) => return Err(WorkerError::validation("A prompt or a custom script is required")),
        };

        let plans = plan_scenes(
            source,
            request.style,
            request.duration_seconds,
            request.resolved_scene_count(),
        );
        let cost = JobCostCalculator::new(request.duration_seconds, plans.len() as u32)
            .with_style(request.style)
            .with_base_credits(self.pricing.base_credits)
            .with_credits_per_second(self.pricing.credits_per_second)
            .calculate();

        let mut job = VideoJob::new(
            &request.user_id,
            summary,
            request.duration_seconds,
            plans.len() as u32,
            cost.total,
        )
        .with_style(request.style)
        .with_custom_script(request.script_text().map(str::to_string))
        .with_project_name(request.project_name.clone());
        if let Some(creator_id) = &request.creator_id {
            let royalty_bps = request.royalty_bps.unwrap_or(self.pricing.default_royalty_bps);
            job = job.with_creator(creator_id.trim(), royalty_bps);
        }

        if let Err(e) = self
            .settlement
            .reserve(&job.user_id, job.id.as_str(), cost.total, Some(cost.to_metadata()))
            .await
        {
            let err = WorkerError::from(e);
            if err.is_insufficient_credits() {
                metrics::record_job_rejected("insufficient_credits");
            }
            return Err(err);
        }

        let job_id = job.id.clone();
        info!(
            job_id = %job_id,
            user_id = %job.user_id,
            scenes = plans.len(),
            price = cost.total,
            "{}", cost.to_description()
        );

        let cancel = self.registry.insert(job).await;
        metrics::record_job_accepted();
        metrics::set_active_jobs(self.registry.active_count().await);

        let orchestrator = Arc::clone(&self.orchestrator);
        let registry = Arc::clone(&self.registry);
        let semaphore = Arc::clone(&self.job_semaphore);
        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!(job_id = %task_job_id, "Job semaphore closed");
                    return;
                }
            };
            if let Err(e) = orchestrator.run(&task_job_id, &plans, cancel).await {
                error!(job_id = %task_job_id, error = %e, "Job orchestration error");
            }
            metrics::set_active_jobs(registry.active_count().await);
        });

        Ok(JobAccepted::processing(job_id.to_string()))
    }

    pub async fn status(&self, job_id: &JobId) -> WorkerResult<JobStatusView> {
        self.registry
            .view(job_id)
            .await
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))
    }

    /// Cancel a job. `Ok(false)` if it had already finished.
    pub async fn cancel(&self, job_id: &JobId) -> WorkerResult<bool> {
        self.registry.cancel(job_id).await
    }

    pub async fn stats(&self) -> JobStats {
        self.registry.stats().await
    }

    /// Stop accepting jobs and wait for running ones, up to the shutdown timeout.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        info!("Generation service shutting down");

        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                active = self.registry.active_count().await,
                "Shutdown timeout reached with jobs still running"
            );
        }
    }

    async fn wait_for_jobs(&self) {
        while self.registry.active_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
