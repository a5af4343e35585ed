//! Prediction API request/response types.

use serde::{Deserialize, Serialize};

/// Body of a prediction create request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Model identifier at the provider
    pub version: String,
    pub input: PredictionInput,
}

/// Generation inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionInput {
    pub prompt: String,
    /// Clip duration in seconds
    pub duration: u32,
    pub width: u32,
    pub height: u32,
}

/// Prediction lifecycle status reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Starting | Self::Processing)
    }
}

/// A prediction as returned by create and get calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<ProviderOutput>,
    /// Provider error; some providers send a string, others an object
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl Prediction {
    /// Error text, falling back to the status when the provider sent none.
    pub fn error_message(&self) -> String {
        match &self.error {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Null) | None => format!("prediction {:?}", self.status).to_lowercase(),
            Some(other) => other.to_string(),
        }
    }
}

/// Success payload; shapes differ between providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderOutput {
    Url(String),
    UrlList(Vec<String>),
    Structured {
        #[serde(default)]
        video: Option<String>,
        #[serde(default)]
        video_url: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl ProviderOutput {
    /// Canonical artifact URL, if the payload carries one.
    pub fn artifact_url(&self) -> Option<String> {
        let non_empty = |s: &String| !s.trim().is_empty();
        match self {
            Self::Url(url) => Some(url.clone()).filter(non_empty),
            Self::UrlList(urls) => urls.iter().find(|u| non_empty(*u)).cloned(),
            Self::Structured {
                video,
                video_url,
                url,
            } => [video, video_url, url]
                .into_iter()
                .flatten()
                .find(|u| non_empty(*u))
                .cloned(),
        }
    }
}
