//! HTTP adapter for prediction-style generation APIs.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, warn};
use vgen_models::Provider;

use crate::adapter::{AdapterRegistry, JobHandle, PollStatus, ProviderAdapter, Submission};
use crate::catalog::ProviderCatalog;
use crate::config::{ProviderEndpoint, ProviderSettings};
use crate::error::{ProviderError, ProviderResult};
use crate::types::{Prediction, PredictionInput, PredictionRequest, PredictionStatus};

/// Output frame size requested from every provider (9:16).
const OUTPUT_WIDTH: u32 = 576;
const OUTPUT_HEIGHT: u32 = 1024;

/// Talks to one provider's prediction API.
pub struct HttpProviderAdapter {
    provider: Provider,
    endpoint: ProviderEndpoint,
    http: Client,
}

impl HttpProviderAdapter {
    pub fn new(provider: Provider, endpoint: ProviderEndpoint, http: Client) -> Self {
        Self {
            provider,
            endpoint,
            http,
        }
    }

    fn id(&self) -> &str {
        &self.provider.id
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.endpoint.token.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Token {}", self.endpoint.token))
        }
    }

    async fn get_prediction(&self, handle: &JobHandle) -> ProviderResult<Prediction> {
        let url = format!("{}/predictions/{}", self.endpoint.base_url, handle.id);
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|e| ProviderError::network(self.id(), e))?;
        self.decode(response).await
    }

    async fn decode(&self, response: Response) -> ProviderResult<Prediction> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider = self.id(), status = status.as_u16(), "Provider rejected request");
            return Err(ProviderError::rejected(self.id(), status.as_u16(), body));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::network(self.id(), e))?;
        serde_json::from_slice(&body)
            .map_err(|e| ProviderError::invalid_response(self.id(), e.to_string()))
    }

    fn artifact_of(&self, prediction: &Prediction) -> ProviderResult<String> {
        prediction
            .output
            .as_ref()
            .and_then(|output| output.artifact_url())
            .ok_or_else(|| {
                ProviderError::invalid_response(self.id(), "prediction has no output URL")
            })
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    fn provider(&self) -> &Provider {
        &self.provider
    }

    async fn submit(&self, prompt: &str, duration_seconds: u32) -> ProviderResult<Submission> {
        let url = format!("{}/predictions", self.endpoint.base_url);
        let body = PredictionRequest {
            version: self.endpoint.model.clone(),
            input: PredictionInput {
                prompt: prompt.to_string(),
                duration: duration_seconds,
                width: OUTPUT_WIDTH,
                height: OUTPUT_HEIGHT,
            },
        };

        debug!(provider = self.id(), duration_seconds, "Submitting generation");

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::network(self.id(), e))?;
        let prediction = self.decode(response).await?;

        let status = prediction.status;
        match status {
            PredictionStatus::Succeeded => Ok(Submission::Completed(self.artifact_of(&prediction)?)),
            PredictionStatus::Failed | PredictionStatus::Canceled => Err(
                ProviderError::generation_failed(self.id(), prediction.error_message()),
            ),
            _ if self.provider.is_async => {
                Ok(Submission::Pending(JobHandle::new(self.id(), prediction.id)))
            }
            status => Err(ProviderError::invalid_response(
                self.id(),
                format!("synchronous provider returned status {:?}", status),
            )),
        }
    }

    async fn poll_status(&self, handle: &JobHandle) -> ProviderResult<PollStatus> {
        let prediction = self.get_prediction(handle).await?;
        Ok(match prediction.status {
            PredictionStatus::Starting | PredictionStatus::Processing => PollStatus::Pending,
            PredictionStatus::Succeeded => PollStatus::Succeeded,
            PredictionStatus::Failed | PredictionStatus::Canceled => {
                PollStatus::Failed(prediction.error_message())
            }
        })
    }

    async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<String> {
        let prediction = self.get_prediction(handle).await?;
        self.artifact_of(&prediction)
    }
}

impl AdapterRegistry {
    /// One HTTP adapter per catalog provider, sharing a connection pool.
    pub fn from_settings(catalog: &ProviderCatalog, settings: &ProviderSettings) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ProviderError::network("http-client", e))?;

        let mut registry = Self::new();
        for provider in catalog.providers() {
            let endpoint = settings.endpoint(&provider.id);
            registry.register(Arc::new(HttpProviderAdapter::new(
                provider.clone(),
                endpoint,
                http.clone(),
            )));
        }
        Ok(registry)
    }
}
