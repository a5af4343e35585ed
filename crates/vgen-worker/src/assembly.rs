//! Assembly requester.
//!
//! One call to the external compositing service per job. Failures are not
//! retried; the lifecycle treats any error as terminal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vgen_models::{AssemblyOutput, JobId, VideoStyle};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Compositing service contract.
#[async_trait]
pub trait AssemblyService: Send + Sync {
    /// Concatenate `scene_urls` (in order) into the final video.
    async fn assemble(
        &self,
        job_id: &JobId,
        style: VideoStyle,
        scene_urls: &[String],
    ) -> WorkerResult<AssemblyOutput>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssembleRequest<'a> {
    job_id: &'a str,
    style: VideoStyle,
    scene_urls: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssembleResponse {
    final_video_url: String,
    #[serde(default)]
    thumbnail_url: String,
    #[serde(default)]
    file_size_bytes: u64,
}

/// HTTP client for the compositing service (`POST {base_url}/assemble`).
#[derive(Debug, Clone)]
pub struct HttpAssemblyClient {
    base_url: String,
    http: Client,
}

impl HttpAssemblyClient {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Client with its own connection pool and a request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::assembly(e.to_string()))?;
        Ok(Self::new(base_url, http))
    }
}

#[async_trait]
impl AssemblyService for HttpAssemblyClient {
    async fn assemble(
        &self,
        job_id: &JobId,
        style: VideoStyle,
        scene_urls: &[String],
    ) -> WorkerResult<AssemblyOutput> {
        let url = format!("{}/assemble", self.base_url);
        let body = AssembleRequest {
            job_id: job_id.as_str(),
            style,
            scene_urls,
        };

        let result = async {
            let response = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| WorkerError::assembly(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(WorkerError::assembly(format!("{}: {}", status, detail.trim())));
            }

            let parsed: AssembleResponse = response
                .json()
                .await
                .map_err(|e| WorkerError::assembly(format!("invalid response: {}", e)))?;
            if parsed.final_video_url.is_empty() {
                return Err(WorkerError::assembly("response has no final video URL"));
            }
            Ok(AssemblyOutput {
                final_video_url: parsed.final_video_url,
                thumbnail_url: parsed.thumbnail_url,
                file_size_bytes: parsed.file_size_bytes,
            })
        }
        .await;

        match &result {
            Ok(output) => info!(
                job_id = %job_id,
                scenes = scene_urls.len(),
                size_bytes = output.file_size_bytes,
                "Assembly completed"
            ),
            Err(e) => warn!(job_id = %job_id, error = %e, "Assembly failed"),
        }
        metrics::record_assembly(result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn urls() -> Vec<String> {
        vec!["https://cdn/a.mp4".to_string(), "https://cdn/b.mp4".to_string()]
    }

    #[tokio::test]
    async fn test_assemble_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assemble"))
            .and(body_partial_json(serde_json::json!({
                "jobId": "job-1",
                "style": "tiktok",
                "sceneUrls": ["https://cdn/a.mp4", "https://cdn/b.mp4"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "finalVideoUrl": "https://cdn/final.mp4",
                "thumbnailUrl": "https://cdn/thumb.jpg",
                "fileSizeBytes": 1048576
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAssemblyClient::new(format!("{}/", server.uri()), Client::new());
        let output = client
            .assemble(&JobId::from_string("job-1"), VideoStyle::Tiktok, &urls())
            .await
            .unwrap();

        assert_eq!(output.final_video_url, "https://cdn/final.mp4");
        assert_eq!(output.thumbnail_url, "https://cdn/thumb.jpg");
        assert_eq!(output.file_size_bytes, 1_048_576);
    }

    #[tokio::test]
    async fn test_service_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assemble"))
            .respond_with(ResponseTemplate::new(503).set_body_string("compositor offline"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAssemblyClient::new(server.uri(), Client::new());
        let err = client
            .assemble(&JobId::from_string("job-2"), VideoStyle::Tiktok, &urls())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Assembly(ref msg) if msg.contains("compositor offline")));
    }

    #[tokio::test]
    async fn test_missing_url_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "finalVideoUrl": ""
            })))
            .mount(&server)
            .await;

        let client = HttpAssemblyClient::new(server.uri(), Client::new());
        let result = client
            .assemble(&JobId::from_string("job-3"), VideoStyle::Viral, &urls())
            .await;
        assert!(result.is_err());
    }
}
