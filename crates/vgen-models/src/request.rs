//! Inbound generation request and its acknowledgement.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::style::VideoStyle;

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Maximum custom script length in characters.
pub const MAX_SCRIPT_CHARS: usize = 5000;

/// Maximum number of scenes per job.
pub const MAX_SCENES: u32 = 20;

/// Target seconds per scene when the caller does not choose a scene count.
pub const DEFAULT_SECONDS_PER_SCENE: u32 = 5;

const FORBIDDEN_PROMPT_FRAGMENTS: &[&str] = &["<", ">", "script"];

/// Request to generate a short vertical video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,

    /// Topic prompt
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub prompt: Option<String>,

    /// Custom script; each line (or sentence) becomes a scene
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub custom_script: Option<String>,

    #[serde(default)]
    pub style: VideoStyle,

    /// Total target duration
    #[validate(range(min = 1, max = 300))]
    pub duration_seconds: u32,

    #[serde(default)]
    #[validate(range(min = 1, max = 20))]
    pub scene_count: Option<u32>,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub project_name: Option<String>,

    /// Creator receiving a royalty when the job settles
    #[serde(default)]
    pub creator_id: Option<String>,

    /// Royalty override in basis points
    #[serde(default)]
    #[validate(range(max = 10000))]
    pub royalty_bps: Option<u32>,
}

impl GenerationRequest {
    pub fn from_prompt(user_id: impl Into<String>, prompt: impl Into<String>, duration_seconds: u32) -> Self {
        Self {
            user_id: user_id.into(),
            prompt: Some(prompt.into()),
            custom_script: None,
            style: VideoStyle::default(),
            duration_seconds,
            scene_count: None,
            project_name: None,
            creator_id: None,
            royalty_bps: None,
        }
    }

    pub fn from_script(user_id: impl Into<String>, script: impl Into<String>, duration_seconds: u32) -> Self {
        Self {
            prompt: None,
            custom_script: Some(script.into()),
            ..Self::from_prompt(user_id, String::new(), duration_seconds)
        }
    }

    pub fn with_scene_count(mut self, scene_count: u32) -> Self {
        self.scene_count = Some(scene_count);
        self
    }

    pub fn with_style(mut self, style: VideoStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_creator(mut self, creator_id: impl Into<String>, royalty_bps: Option<u32>) -> Self {
        self.creator_id = Some(creator_id.into());
        self.royalty_bps = royalty_bps;
        self
    }

    /// Validate field ranges and cross-field rules.
    pub fn validate_request(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;

        match (self.prompt_text(), self.script_text()) {
            (Some(_), Some(_)) => {
                return Err("Provide either a prompt or a custom script, not both".to_string())
            }
            (None, None) => return Err("A prompt or a custom script is required".to_string()),
            (Some(prompt), None) => {
                let lower = prompt.to_lowercase();
                if FORBIDDEN_PROMPT_FRAGMENTS.iter().any(|f| lower.contains(f)) {
                    return Err("Prompt contains invalid characters".to_string());
                }
            }
            (None, Some(_)) => {}
        }

        if let Some(creator) = &self.creator_id {
            if creator.trim().is_empty() {
                return Err("Creator ID must not be blank".to_string());
            }
        }

        Ok(())
    }

    /// Non-blank trimmed prompt.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    /// Non-blank trimmed script.
    pub fn script_text(&self) -> Option<&str> {
        self.custom_script
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Scene count, defaulting to one scene per five seconds.
    pub fn resolved_scene_count(&self) -> u32 {
        self.scene_count.unwrap_or_else(|| {
            self.duration_seconds
                .div_ceil(DEFAULT_SECONDS_PER_SCENE)
                .clamp(1, MAX_SCENES)
        })
    }
}

/// Immediate acknowledgement of an accepted request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: String,
    pub status: String,
}

impl JobAccepted {
    pub fn processing(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: "processing".to_string(),
        }
    }
}
