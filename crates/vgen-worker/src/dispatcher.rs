//! Scene dispatcher.
//!
//! Fans a job's scenes out to concurrent units. Each unit walks its provider
//! cascade one attempt at a time and records exactly one `SceneResult`. A
//! failed scene never aborts its siblings, and the dispatcher returns only
//! after every unit has resolved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn, Instrument};
use vgen_models::{JobId, Provider, ScenePlan, SceneResult};
use vgen_providers::{
    cancelled, metrics as provider_metrics, AdapterRegistry, CancelSignal, CompletionPoller,
    FallbackSelector, ProviderError, ProviderResult,
};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::logging::JobLogger;
use crate::metrics;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Why a dispatch was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    TimedOut,
}

impl StopReason {
    pub fn error(&self) -> WorkerError {
        match self {
            StopReason::Cancelled => WorkerError::Cancelled,
            StopReason::TimedOut => WorkerError::JobTimedOut,
        }
    }
}

/// Scene outcomes of one dispatch, in scene order.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub results: Vec<SceneResult>,
    pub stopped: Option<StopReason>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// Progress hooks called from scene units.
#[async_trait]
pub trait DispatchObserver: Send + Sync {
    /// A scene is about to try `provider_id`.
    async fn provider_attempted(&self, _scene_index: u32, _provider_id: &str) {}

    /// A scene resolved; `resolved` of `total` scenes are now done.
    async fn scene_resolved(&self, _result: &SceneResult, _resolved: usize, _total: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl DispatchObserver for NoopObserver {}

/// Identity of the job being dispatched.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTarget<'a> {
    pub job_id: &'a JobId,
    pub user_id: &'a str,
}

pub struct SceneDispatcher {
    selector: FallbackSelector,
    adapters: Arc<AdapterRegistry>,
    poller: CompletionPoller,
    telemetry: Arc<dyn TelemetrySink>,
    attempt_timeout: Duration,
    max_parallel: usize,
    job_timeout: Option<Duration>,
}

impl SceneDispatcher {
    pub fn new(
        selector: FallbackSelector,
        adapters: Arc<AdapterRegistry>,
        telemetry: Arc<dyn TelemetrySink>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            selector,
            adapters,
            poller: CompletionPoller::new(config.poll_interval, config.max_poll_attempts),
            telemetry,
            attempt_timeout: config.attempt_timeout,
            max_parallel: config.max_scene_parallel.max(1),
            job_timeout: config.job_timeout,
        }
    }

    pub fn selector(&self) -> &FallbackSelector {
        &self.selector
    }

    /// Generate every planned scene.
    ///
    /// `cancel` aborts remaining attempts at their next suspension point. When
    /// a job timeout is configured it does the same once the timeout elapses.
    pub async fn generate_scenes(
        &self,
        target: DispatchTarget<'_>,
        plans: &[ScenePlan],
        mut cancel: CancelSignal,
        observer: &dyn DispatchObserver,
    ) -> DispatchReport {
        let total = plans.len();
        let logger = JobLogger::new(target.job_id, "dispatch");
        logger.log_start(&format!("{} scenes, up to {} in parallel", total, self.max_parallel));

        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_reason = OnceLock::new();
        let semaphore = Semaphore::new(self.max_parallel);
        let resolved = AtomicUsize::new(0);

        // Results come back in plan order, one slot per scene.
        let units = join_all(plans.iter().map(|plan| {
            let mut stop = stop_rx.clone();
            let (semaphore, resolved, stop_reason) = (&semaphore, &resolved, &stop_reason);
            async move {
                let _permit = semaphore.acquire().await.ok();
                let result = self
                    .generate_scene(target, plan, &mut stop, stop_reason, observer)
                    .await;
                let done = resolved.fetch_add(1, Ordering::SeqCst) + 1;
                observer.scene_resolved(&result, done, total).await;
                result
            }
            .instrument(tracing::debug_span!("scene", scene_index = plan.index))
        }));
        tokio::pin!(units);

        let job_timeout = self.job_timeout;
        let watchdog = async {
            tokio::select! {
                _ = cancelled(&mut cancel) => StopReason::Cancelled,
                _ = deadline(job_timeout) => StopReason::TimedOut,
            }
        };
        tokio::pin!(watchdog);

        let mut stopped = None;
        let results = loop {
            tokio::select! {
                results = &mut units => break results,
                reason = &mut watchdog, if stopped.is_none() => {
                    logger.log_warning(&format!("stopping scene units: {}", reason.error()));
                    let _ = stop_reason.set(reason);
                    let _ = stop_tx.send(true);
                    stopped = Some(reason);
                }
            }
        };

        let report = DispatchReport { results, stopped };
        logger.log_completion(&format!("{}/{} scenes succeeded", report.succeeded(), total));
        report
    }

    async fn generate_scene(
        &self,
        target: DispatchTarget<'_>,
        plan: &ScenePlan,
        stop: &mut CancelSignal,
        stop_reason: &OnceLock<StopReason>,
        observer: &dyn DispatchObserver,
    ) -> SceneResult {
        let started = Instant::now();
        let cascade = self.selector.select_cascade(plan.duration_seconds, plan.index);
        let start_provider = cascade.first().map(|p| p.id.clone()).unwrap_or_default();

        debug!(
            scene_index = plan.index,
            cascade = ?cascade.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            "Scene cascade selected"
        );

        let mut last_provider = start_provider.clone();
        let mut last_error: Option<ProviderError> = None;
        let mut attempts = 0;

        for provider in &cascade {
            if *stop.borrow() {
                last_error = Some(ProviderError::Cancelled);
                break;
            }

            attempts += 1;
            last_provider = provider.id.clone();
            observer.provider_attempted(plan.index, &provider.id).await;

            let attempt_started = Instant::now();
            match self.attempt(provider, plan, stop).await {
                Ok(artifact_url) => {
                    provider_metrics::record_attempt(&provider.id, "success", attempt_started.elapsed());
                    let result = SceneResult::succeeded(
                        plan.index,
                        &plan.prompt,
                        &provider.id,
                        artifact_url,
                        plan.duration_seconds,
                        elapsed_ms(started),
                    )
                    .with_attempts(attempts);
                    info!(
                        job_id = %target.job_id,
                        scene_index = plan.index,
                        provider = %provider.id,
                        attempts,
                        "Scene generated"
                    );
                    return self.finish(target, &start_provider, result, started);
                }
                Err(e) if e.is_cancelled() => {
                    provider_metrics::record_attempt(&provider.id, e.kind(), attempt_started.elapsed());
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    provider_metrics::record_attempt(&provider.id, e.kind(), attempt_started.elapsed());
                    warn!(
                        job_id = %target.job_id,
                        scene_index = plan.index,
                        provider = %provider.id,
                        error = %e,
                        "Provider attempt failed, advancing cascade"
                    );
                    last_error = Some(e);
                }
            }
        }

        let error = match last_error {
            Some(ProviderError::Cancelled) => stop_reason
                .get()
                .map(|reason| reason.error())
                .unwrap_or(WorkerError::Cancelled)
                .to_string(),
            Some(e) => e.to_string(),
            None => "no provider available".to_string(),
        };
        warn!(
            job_id = %target.job_id,
            scene_index = plan.index,
            error = %WorkerError::scene_exhausted(plan.index, error.as_str()),
            "Scene failed"
        );

        let result = SceneResult::failed(
            plan.index,
            &plan.prompt,
            last_provider,
            error,
            plan.duration_seconds,
            elapsed_ms(started),
        )
        .with_attempts(attempts);
        self.finish(target, &start_provider, result, started)
    }

    /// One provider attempt bounded by the attempt timeout.
    async fn attempt(
        &self,
        provider: &Provider,
        plan: &ScenePlan,
        stop: &mut CancelSignal,
    ) -> ProviderResult<String> {
        let adapter = self.adapters.get(&provider.id)?;
        let generation =
            self.poller
                .generate(adapter.as_ref(), &plan.prompt, plan.duration_seconds, stop);

        match tokio::time::timeout(self.attempt_timeout, generation).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::AttemptTimeout {
                provider: provider.id.clone(),
                seconds: self.attempt_timeout.as_secs(),
            }),
        }
    }

    fn finish(
        &self,
        target: DispatchTarget<'_>,
        start_provider: &str,
        result: SceneResult,
        started: Instant,
    ) -> SceneResult {
        metrics::record_scene(result.success, started.elapsed());
        self.telemetry.emit(
            TelemetryEvent::scene_completed(start_provider, &result)
                .for_job(target.job_id, target.user_id),
        );
        result
    }
}

async fn deadline(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use vgen_providers::{JobHandle, PollStatus, ProviderAdapter, ProviderCatalog, Submission};

    use crate::telemetry::TracingTelemetry;

    /// Adapter whose behaviour is chosen per prompt fragment.
    struct FakeAdapter {
        provider: Provider,
        failing: Vec<&'static str>,
        hang: bool,
    }

    #[async_trait]
    impl ProviderAdapter for FakeAdapter {
        fn provider(&self) -> &Provider {
            &self.provider
        }

        async fn submit(&self, prompt: &str, _duration_seconds: u32) -> ProviderResult<Submission> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.failing.iter().any(|f| prompt.contains(f)) {
                return Err(ProviderError::rejected(&self.provider.id, 500, "down"));
            }
            Ok(Submission::Completed(format!("https://cdn/{}/{}", self.provider.id, prompt.len())))
        }

        async fn poll_status(&self, _handle: &JobHandle) -> ProviderResult<PollStatus> {
            Ok(PollStatus::Succeeded)
        }

        async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<String> {
            Ok(handle.id.clone())
        }
    }

    fn catalog() -> ProviderCatalog {
        ProviderCatalog::new(vec![
            Provider::new("alpha", 10, 1, false),
            Provider::new("beta", 10, 2, false),
            Provider::new("gamma", 10, 3, false),
        ])
        .unwrap()
    }

    fn dispatcher(failing: HashMap<&str, Vec<&'static str>>, config: &WorkerConfig) -> SceneDispatcher {
        let catalog = Arc::new(catalog());
        let mut adapters = AdapterRegistry::new();
        for provider in catalog.providers() {
            adapters.register(Arc::new(FakeAdapter {
                provider: provider.clone(),
                failing: failing.get(provider.id.as_str()).cloned().unwrap_or_default(),
                hang: false,
            }));
        }
        SceneDispatcher::new(
            FallbackSelector::new(catalog),
            Arc::new(adapters),
            Arc::new(TracingTelemetry),
            config,
        )
    }

    fn plans(n: u32) -> Vec<ScenePlan> {
        (0..n)
            .map(|index| ScenePlan {
                index,
                prompt: format!("scene {} of {}", index + 1, n),
                duration_seconds: 5,
            })
            .collect()
    }

    #[derive(Default)]
    struct RecordingObserver {
        attempted: Mutex<Vec<(u32, String)>>,
        resolved: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl DispatchObserver for RecordingObserver {
        async fn provider_attempted(&self, scene_index: u32, provider_id: &str) {
            self.attempted.lock().unwrap().push((scene_index, provider_id.to_string()));
        }

        async fn scene_resolved(&self, _result: &SceneResult, resolved: usize, _total: usize) {
            self.resolved.lock().unwrap().push(resolved);
        }
    }

    fn target(job_id: &JobId) -> DispatchTarget<'_> {
        DispatchTarget {
            job_id,
            user_id: "user-1",
        }
    }

    #[tokio::test]
    async fn test_results_in_scene_order_with_rotation() {
        let dispatcher = dispatcher(HashMap::new(), &WorkerConfig::default());
        let (_tx, rx) = watch::channel(false);
        let job_id = JobId::from_string("job-1");

        let report = dispatcher
            .generate_scenes(target(&job_id), &plans(3), rx, &NoopObserver)
            .await;

        assert!(report.stopped.is_none());
        assert_eq!(report.succeeded(), 3);
        let used: Vec<&str> = report.results.iter().map(|r| r.provider_used.as_str()).collect();
        assert_eq!(used, vec!["alpha", "beta", "gamma"]);
        assert!(report.results.iter().enumerate().all(|(i, r)| r.scene_index == i as u32));
    }

    #[tokio::test]
    async fn test_exhausted_scene_keeps_last_error() {
        let failing = HashMap::from([
            ("alpha", vec!["scene 1 of 2"]),
            ("beta", vec!["scene 1 of 2"]),
            ("gamma", vec!["scene 1 of 2"]),
        ]);
        let dispatcher = dispatcher(failing, &WorkerConfig::default());
        let (_tx, rx) = watch::channel(false);
        let observer = RecordingObserver::default();
        let job_id = JobId::from_string("job-2");

        let report = dispatcher
            .generate_scenes(target(&job_id), &plans(2), rx, &observer)
            .await;

        let failed = &report.results[0];
        assert!(!failed.success);
        assert_eq!(failed.attempts, 3);
        assert_eq!(failed.provider_used, "gamma");
        assert!(failed.error.as_deref().unwrap().starts_with("gamma rejected request"));
        // Sibling scene is unaffected.
        assert!(report.results[1].success);

        let attempted = observer.attempted.lock().unwrap();
        let scene0: Vec<&str> = attempted
            .iter()
            .filter(|(i, _)| *i == 0)
            .map(|(_, p)| p.as_str())
            .collect();
        assert_eq!(scene0, vec!["alpha", "beta", "gamma"]);
        let mut resolved = observer.resolved.lock().unwrap().clone();
        resolved.sort_unstable();
        assert_eq!(resolved, vec![1, 2]);
    }

    fn hanging_dispatcher(config: &WorkerConfig) -> SceneDispatcher {
        let catalog = Arc::new(catalog());
        let mut adapters = AdapterRegistry::new();
        for provider in catalog.providers() {
            adapters.register(Arc::new(FakeAdapter {
                provider: provider.clone(),
                failing: Vec::new(),
                hang: true,
            }));
        }
        SceneDispatcher::new(
            FallbackSelector::new(catalog),
            Arc::new(adapters),
            Arc::new(TracingTelemetry),
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_remaining_attempts() {
        let config = WorkerConfig {
            job_timeout: None,
            ..WorkerConfig::default()
        };
        let dispatcher = hanging_dispatcher(&config);
        let (tx, rx) = watch::channel(false);
        let observer = RecordingObserver::default();
        let job_id = JobId::from_string("job-3");
        let plans = plans(2);

        let cancel = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(true).unwrap();
        };
        let (report, _) = tokio::join!(
            dispatcher.generate_scenes(target(&job_id), &plans, rx, &observer),
            cancel
        );

        assert_eq!(report.stopped, Some(StopReason::Cancelled));
        assert_eq!(report.succeeded(), 0);
        for result in &report.results {
            assert_eq!(result.error.as_deref(), Some("job cancelled"));
            assert_eq!(result.attempts, 1);
        }
        // Only the first provider of each cascade was ever tried.
        assert_eq!(observer.attempted.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_timeout_marks_unfinished_scenes() {
        let config = WorkerConfig {
            job_timeout: Some(Duration::from_secs(60)),
            ..WorkerConfig::default()
        };
        let dispatcher = hanging_dispatcher(&config);
        let (_tx, rx) = watch::channel(false);
        let job_id = JobId::from_string("job-4");

        let report = dispatcher
            .generate_scenes(target(&job_id), &plans(2), rx, &NoopObserver)
            .await;

        assert_eq!(report.stopped, Some(StopReason::TimedOut));
        assert!(report
            .results
            .iter()
            .all(|r| r.error.as_deref() == Some("job timeout exceeded")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_advances_cascade() {
        let config = WorkerConfig {
            attempt_timeout: Duration::from_secs(10),
            job_timeout: None,
            ..WorkerConfig::default()
        };
        let dispatcher = hanging_dispatcher(&config);
        let (_tx, rx) = watch::channel(false);
        let job_id = JobId::from_string("job-5");

        let report = dispatcher
            .generate_scenes(target(&job_id), &plans(1), rx, &NoopObserver)
            .await;

        let result = &report.results[0];
        assert!(report.stopped.is_none());
        assert_eq!(result.attempts, 3);
        assert_eq!(result.error.as_deref(), Some("gamma attempt exceeded 10s"));
    }
}
