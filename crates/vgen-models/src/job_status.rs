//! Polling view of a job.
//!
//! This is the snapshot returned to clients polling a job; it carries the
//! progress and stage fields without the per-scene prompts.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobStatus, VideoJob};

/// Snapshot of a job for status queries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: String,
    pub user_id: String,
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage label
    pub current_stage: String,
    /// Provider most recently attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_provider: Option<String>,
    pub scenes_total: u32,
    pub scenes_succeeded: u32,
    /// Partial-failure summary once scenes have resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub total_price: i64,
    /// Set once the job has been settled or refunded
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatusView {
    pub fn from_job(job: &VideoJob) -> Self {
        let scene_summary = (!job.scene_results.is_empty()).then(|| job.scene_summary());
        Self {
            job_id: job.id.to_string(),
            user_id: job.user_id.clone(),
            status: job.status,
            progress: job.progress,
            current_stage: job.status.stage_label().to_string(),
            current_provider: job.current_provider.clone(),
            scenes_total: job.scene_count,
            scenes_succeeded: job.succeeded_count() as u32,
            scene_summary,
            final_video_url: job.assembly.as_ref().map(|a| a.final_video_url.clone()),
            thumbnail_url: job.assembly.as_ref().map(|a| a.thumbnail_url.clone()),
            error_message: job.error_message.clone(),
            total_price: job.total_price,
            archived: job.archived,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::AssemblyOutput;
    use crate::scene::SceneResult;

    #[test]
    fn test_view_of_queued_job() {
        let job = VideoJob::new("user-1", "ocean at dawn", 10, 2, 30);
        let view = JobStatusView::from_job(&job);
        assert_eq!(view.status, JobStatus::Queued);
        assert_eq!(view.current_stage, "Queued");
        assert!(view.scene_summary.is_none());
        assert!(!view.is_terminal());
    }

    #[test]
    fn test_view_of_completed_job() {
        let mut job = VideoJob::new("user-1", "ocean at dawn", 10, 2, 30);
        job.transition(JobStatus::Dispatching).unwrap();
        job.record_scene_results(vec![
            SceneResult::succeeded(0, "a", "kling", "https://a/0.mp4", 5, 10),
            SceneResult::succeeded(1, "b", "luma", "https://a/1.mp4", 5, 10),
        ])
        .unwrap();
        job.transition(JobStatus::Assembling).unwrap();
        job.complete(AssemblyOutput {
            final_video_url: "https://cdn/final.mp4".into(),
            thumbnail_url: "https://cdn/thumb.jpg".into(),
            file_size_bytes: 10,
        })
        .unwrap();

        let view = JobStatusView::from_job(&job);
        assert_eq!(view.progress, 100);
        assert_eq!(view.scenes_succeeded, 2);
        assert_eq!(view.scene_summary.as_deref(), Some("2/2 scenes succeeded"));
        assert_eq!(view.final_video_url.as_deref(), Some("https://cdn/final.mp4"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["currentStage"], "Complete");
        assert_eq!(json["status"], "completed");
    }
}
