//! Video generation job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::scene::SceneResult;
use crate::style::VideoStyle;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
///
/// States only move forward: `queued -> dispatching -> assembling -> completed`,
/// with `failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, not yet dispatched
    #[default]
    Queued,
    /// Scenes are being generated
    Dispatching,
    /// Final assembly requested
    Assembling,
    /// Final artifact available and paid for
    Completed,
    /// Terminal failure
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Dispatching => "dispatching",
            JobStatus::Assembling => "assembling",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Human-readable stage label for polling clients.
    pub fn stage_label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Dispatching => "Generating scenes",
            JobStatus::Assembling => "Assembling video",
            JobStatus::Completed => "Complete",
            JobStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Dispatching)
                | (Queued, Failed)
                | (Dispatching, Assembling)
                | (Dispatching, Failed)
                | (Assembling, Completed)
                | (Assembling, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of the external compositing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AssemblyOutput {
    pub final_video_url: String,
    pub thumbnail_url: String,
    pub file_size_bytes: u64,
}

/// A video generation job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoJob {
    /// Unique job ID
    pub id: JobId,

    /// Requesting user
    pub user_id: String,

    /// Topic prompt (or a summary line when a custom script was supplied)
    pub prompt: String,

    /// Custom script, one scene per line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_script: Option<String>,

    #[serde(default)]
    pub style: VideoStyle,

    /// Total requested duration in seconds
    pub requested_duration: u32,

    /// Number of scenes the video is decomposed into
    pub scene_count: u32,

    /// Caller-supplied priority, recorded only; jobs run in submission order
    #[serde(default)]
    pub priority: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Creator credited with a royalty on settlement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,

    /// Royalty rate in basis points of the total price
    #[serde(default)]
    pub royalty_bps: u32,

    /// Quoted price in credits, fixed at accept time
    pub total_price: i64,

    #[serde(default)]
    pub status: JobStatus,

    /// Scene outcomes indexed by scene position, written once
    #[serde(default)]
    pub scene_results: Vec<SceneResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly: Option<AssemblyOutput>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Provider most recently attempted by any scene
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_provider: Option<String>,

    /// Set once settlement or refund has run
    #[serde(default)]
    pub archived: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl VideoJob {
    /// Create a new queued job.
    pub fn new(
        user_id: impl Into<String>,
        prompt: impl Into<String>,
        requested_duration: u32,
        scene_count: u32,
        total_price: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            prompt: prompt.into(),
            custom_script: None,
            style: VideoStyle::default(),
            requested_duration,
            scene_count,
            priority: 0,
            project_name: None,
            creator_id: None,
            royalty_bps: 0,
            total_price,
            status: JobStatus::Queued,
            scene_results: Vec::new(),
            assembly: None,
            error_message: None,
            progress: 0,
            current_provider: None,
            archived: false,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_style(mut self, style: VideoStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_custom_script(mut self, script: Option<String>) -> Self {
        self.custom_script = script;
        self
    }

    pub fn with_project_name(mut self, name: Option<String>) -> Self {
        self.project_name = name;
        self
    }

    /// Attach the originating creator and their royalty rate.
    pub fn with_creator(mut self, creator_id: impl Into<String>, royalty_bps: u32) -> Self {
        self.creator_id = Some(creator_id.into());
        self.royalty_bps = royalty_bps;
        self
    }

    /// Move to `next`, rejecting regressions and moves out of terminal states.
    pub fn transition(&mut self, next: JobStatus) -> ModelResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        match next {
            JobStatus::Dispatching => {
                self.started_at = Some(now);
                self.progress = self.progress.max(10);
            }
            JobStatus::Assembling => self.progress = self.progress.max(85),
            JobStatus::Completed => {
                self.progress = 100;
                self.completed_at = Some(now);
            }
            JobStatus::Failed => self.completed_at = Some(now),
            JobStatus::Queued => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Write the scene outcomes. Allowed exactly once per job.
    pub fn record_scene_results(&mut self, results: Vec<SceneResult>) -> ModelResult<()> {
        if !self.scene_results.is_empty() {
            return Err(ModelError::SceneResultsAlreadyRecorded(self.id.to_string()));
        }
        self.scene_results = results;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job completed with the assembled artifact.
    pub fn complete(&mut self, output: AssemblyOutput) -> ModelResult<()> {
        self.transition(JobStatus::Completed)?;
        self.assembly = Some(output);
        Ok(())
    }

    /// Mark the job failed with a human-readable message.
    pub fn fail(&mut self, error: impl Into<String>) -> ModelResult<()> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(error.into());
        Ok(())
    }

    /// Update progress; never decreases.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
        self.updated_at = Utc::now();
    }

    pub fn successful_scenes(&self) -> impl Iterator<Item = &SceneResult> {
        self.scene_results.iter().filter(|r| r.success)
    }

    pub fn succeeded_count(&self) -> usize {
        self.successful_scenes().count()
    }

    /// Artifact URLs of successful scenes, in scene order.
    pub fn successful_artifacts(&self) -> Vec<String> {
        self.successful_scenes()
            .filter_map(|r| r.artifact_url.clone())
            .collect()
    }

    /// Partial-failure summary, e.g. "8/10 scenes succeeded".
    pub fn scene_summary(&self) -> String {
        format!(
            "{}/{} scenes succeeded",
            self.succeeded_count(),
            self.scene_results.len()
        )
    }

    /// Idempotency key for settlement ledger entries.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.user_id, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> VideoJob {
        VideoJob::new("user123", "A cat surfing", 30, 6, 70)
    }

    #[test]
    fn test_job_creation() {
        let job = job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.scene_results.is_empty());
        assert!(job.idempotency_key().starts_with("user123:"));
    }

    #[test]
    fn test_forward_transitions() {
        let mut job = job();
        job.transition(JobStatus::Dispatching).unwrap();
        assert!(job.started_at.is_some());
        job.transition(JobStatus::Assembling).unwrap();
        job.complete(AssemblyOutput {
            final_video_url: "https://cdn/final.mp4".into(),
            thumbnail_url: "https://cdn/thumb.jpg".into(),
            file_size_bytes: 1024,
        })
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_no_regression() {
        let mut job = job();
        job.transition(JobStatus::Dispatching).unwrap();
        job.transition(JobStatus::Assembling).unwrap();

        let err = job.transition(JobStatus::Dispatching).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidTransition {
                from: JobStatus::Assembling,
                to: JobStatus::Dispatching
            }
        );
    }

    #[test]
    fn test_terminal_is_final() {
        let mut job = job();
        job.transition(JobStatus::Dispatching).unwrap();
        job.fail("no scenes generated successfully").unwrap();
        assert!(job.status.is_terminal());
        assert!(job.transition(JobStatus::Assembling).is_err());
        assert!(job.fail("again").is_err());
        assert_eq!(
            job.error_message.as_deref(),
            Some("no scenes generated successfully")
        );
    }

    #[test]
    fn test_dispatching_cannot_skip_to_completed() {
        let mut job = job();
        job.transition(JobStatus::Dispatching).unwrap();
        assert!(job.transition(JobStatus::Completed).is_err());
    }

    #[test]
    fn test_scene_results_written_once() {
        let mut job = job();
        let results = vec![
            SceneResult::succeeded(0, "p0", "kling", "https://a/0.mp4", 5, 100),
            SceneResult::failed(1, "p1", "runway", "boom", 5, 200),
        ];
        job.record_scene_results(results.clone()).unwrap();
        assert!(job.record_scene_results(results).is_err());
        assert_eq!(job.scene_summary(), "1/2 scenes succeeded");
        assert_eq!(job.successful_artifacts(), vec!["https://a/0.mp4".to_string()]);
    }

    #[test]
    fn test_progress_monotonic() {
        let mut job = job();
        job.set_progress(40);
        job.set_progress(20);
        assert_eq!(job.progress, 40);
        job.set_progress(250);
        assert_eq!(job.progress, 100);
    }
}
