//! Fire-and-forget telemetry.
//!
//! Sinks never block or fail a job. The HTTP sink posts each event on its
//! own task with a short timeout and only logs locally when delivery fails.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use vgen_models::{JobId, SceneResult};

/// Delivery budget for a single HTTP telemetry post.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Consecutive delivery failures logged before the rest are suppressed.
const MAX_LOGGED_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryLevel {
    Info,
    Warn,
    Error,
}

/// One telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub level: TelemetryLevel,
    pub message: String,
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(level: TelemetryLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            metadata: Map::new(),
            user_id: None,
            job_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(TelemetryLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(TelemetryLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(TelemetryLevel::Error, message)
    }

    pub fn for_job(mut self, job_id: &JobId, user_id: &str) -> Self {
        self.job_id = Some(job_id.to_string());
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Scene completion record: start/end provider, elapsed time, outcome.
    pub fn scene_completed(start_provider: &str, result: &SceneResult) -> Self {
        let event = if result.success {
            Self::info("scene completed")
        } else {
            Self::warn("scene failed")
        };
        let event = event
            .with_field("scene_index", result.scene_index)
            .with_field("start_provider", start_provider)
            .with_field("end_provider", result.provider_used.as_str())
            .with_field("elapsed_ms", result.elapsed_ms)
            .with_field("success", result.success)
            .with_field("attempts", result.attempts);
        match &result.error {
            Some(err) => event.with_field("error", err.as_str()),
            None => event,
        }
    }
}

/// Destination for telemetry events.
///
/// `emit` returns immediately; delivery problems are the sink's to handle.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Writes events as tracing records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        let job_id = event.job_id.as_deref().unwrap_or("-");
        let metadata = Value::Object(event.metadata);
        match event.level {
            TelemetryLevel::Info => {
                info!(target: "vgen::telemetry", job_id, metadata = %metadata, "{}", event.message)
            }
            TelemetryLevel::Warn => {
                warn!(target: "vgen::telemetry", job_id, metadata = %metadata, "{}", event.message)
            }
            TelemetryLevel::Error => {
                error!(target: "vgen::telemetry", job_id, metadata = %metadata, "{}", event.message)
            }
        }
    }
}

/// Tracks consecutive failures to avoid flooding logs when a collector is down.
#[derive(Debug)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Reset the failure count.
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 && self.suppressed {
            debug!(
                "Telemetry delivery recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Returns `true` if this failure should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else {
            if !self.suppressed {
                self.suppressed = true;
                warn!(
                    "Suppressing telemetry failure logs after {} consecutive failures",
                    self.max_logged_failures
                );
            }
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Posts events as JSON to a collector endpoint.
#[derive(Clone)]
pub struct HttpTelemetry {
    url: String,
    http: Client,
    failures: Arc<Mutex<FailureTracker>>,
}

impl HttpTelemetry {
    pub fn new(url: impl Into<String>, http: Client) -> Self {
        Self {
            url: url.into(),
            http,
            failures: Arc::new(Mutex::new(FailureTracker::new(MAX_LOGGED_FAILURES))),
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failures
            .lock()
            .map(|tracker| tracker.failure_count())
            .unwrap_or_default()
    }

    fn on_failure(failures: &Mutex<FailureTracker>, reason: &str) {
        let log = failures
            .lock()
            .map(|mut tracker| tracker.record_failure())
            .unwrap_or(true);
        if log {
            warn!(reason, "Telemetry delivery failed");
        }
    }
}

impl TelemetrySink for HttpTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available, dropping telemetry event");
            return;
        };

        let request = self.http.post(&self.url).json(&event);
        let failures = Arc::clone(&self.failures);

        runtime.spawn(async move {
            match tokio::time::timeout(DELIVERY_TIMEOUT, request.send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    if let Ok(mut tracker) = failures.lock() {
                        tracker.record_success();
                    }
                }
                Ok(Ok(response)) => {
                    Self::on_failure(&failures, &format!("collector returned {}", response.status()));
                }
                Ok(Err(e)) => Self::on_failure(&failures, &e.to_string()),
                Err(_) => Self::on_failure(&failures, "timed out"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_failure_tracker() {
        let mut tracker = FailureTracker::new(3);

        assert!(tracker.record_failure());
        assert!(tracker.record_failure());
        assert!(tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());

        tracker.record_success();
        assert_eq!(tracker.failure_count(), 0);
        assert!(tracker.record_failure());
    }

    #[test]
    fn test_scene_completed_fields() {
        let result = SceneResult::failed(2, "p", "luma", "luma timed out", 5, 1200).with_attempts(3);
        let event = TelemetryEvent::scene_completed("kling", &result)
            .for_job(&JobId::from_string("job-1"), "user-1");

        assert_eq!(event.level, TelemetryLevel::Warn);
        assert_eq!(event.metadata["start_provider"], "kling");
        assert_eq!(event.metadata["end_provider"], "luma");
        assert_eq!(event.metadata["attempts"], 3);
        assert_eq!(event.metadata["success"], false);
        assert_eq!(event.job_id.as_deref(), Some("job-1"));
    }

    async fn wait_for_requests(server: &MockServer, count: usize) {
        for _ in 0..50 {
            if server.received_requests().await.map_or(0, |r| r.len()) >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_http_sink_posts_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .and(body_partial_json(serde_json::json!({
                "level": "info",
                "message": "job completed",
                "jobId": "job-7"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpTelemetry::new(format!("{}/events", server.uri()), Client::new());
        sink.emit(TelemetryEvent::info("job completed").for_job(&JobId::from_string("job-7"), "u"));

        wait_for_requests(&server, 1).await;
        server.verify().await;
    }

    #[tokio::test]
    async fn test_http_sink_swallows_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sink = HttpTelemetry::new(server.uri(), Client::new());
        sink.emit(TelemetryEvent::error("boom"));
        sink.emit(TelemetryEvent::error("boom again"));

        wait_for_requests(&server, 2).await;
        for _ in 0..50 {
            if sink.failure_count() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(sink.failure_count(), 2);
    }
}
