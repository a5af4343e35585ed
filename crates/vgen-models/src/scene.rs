//! Scene plans and per-scene generation results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One planned segment of the target video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScenePlan {
    /// Zero-based scene position
    pub index: u32,
    /// Prompt sent to the generation provider
    pub prompt: String,
    /// Required clip duration in seconds
    pub duration_seconds: u32,
}

/// Outcome of generating one scene.
///
/// Produced by the scene dispatcher and written once into the parent job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SceneResult {
    pub scene_index: u32,
    pub prompt: String,
    /// Provider that produced the artifact, or the last one attempted on failure
    pub provider_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    pub duration_seconds: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    /// Providers tried before the scene resolved
    #[serde(default)]
    pub attempts: u32,
}

impl SceneResult {
    pub fn succeeded(
        scene_index: u32,
        prompt: impl Into<String>,
        provider_used: impl Into<String>,
        artifact_url: impl Into<String>,
        duration_seconds: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            scene_index,
            prompt: prompt.into(),
            provider_used: provider_used.into(),
            artifact_url: Some(artifact_url.into()),
            duration_seconds,
            success: true,
            error: None,
            elapsed_ms,
            attempts: 1,
        }
    }

    pub fn failed(
        scene_index: u32,
        prompt: impl Into<String>,
        provider_used: impl Into<String>,
        error: impl Into<String>,
        duration_seconds: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            scene_index,
            prompt: prompt.into(),
            provider_used: provider_used.into(),
            artifact_url: None,
            duration_seconds,
            success: false,
            error: Some(error.into()),
            elapsed_ms,
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}
