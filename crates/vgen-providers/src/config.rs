//! Provider endpoint configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::catalog::ProviderCatalog;

/// Default prediction API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// Model identifiers used when no `PROVIDER_<ID>_MODEL` override is set.
const DEFAULT_MODELS: &[(&str, &str)] = &[
    ("kling", "kwaivgi/kling-v1.6-standard"),
    ("runway", "runwayml/gen3-alpha-turbo"),
    ("luma", "luma/ray-flash-2-540p"),
    ("pika", "pika-labs/pika-1.0"),
    ("minimax", "minimax/video-01"),
];

/// Connection details for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub token: String,
    pub model: String,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            model: model.into(),
        }
    }

    fn default_for(provider_id: &str, token: &str) -> Self {
        let model = DEFAULT_MODELS
            .iter()
            .find(|(id, _)| *id == provider_id)
            .map(|(_, model)| model.to_string())
            .unwrap_or_else(|| provider_id.to_string());
        Self::new(DEFAULT_BASE_URL, token, model)
    }
}

/// Settings for HTTP provider adapters.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Per-provider endpoints keyed by provider id
    pub endpoints: HashMap<String, ProviderEndpoint>,
    /// Timeout for a single HTTP call
    pub request_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoints: HashMap::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ProviderSettings {
    /// Create settings from environment variables.
    ///
    /// Each catalog provider reads `PROVIDER_<ID>_URL`, `PROVIDER_<ID>_TOKEN`
    /// and `PROVIDER_<ID>_MODEL`. The token falls back to `PROVIDER_API_TOKEN`.
    pub fn from_env(catalog: &ProviderCatalog) -> Self {
        let shared_token = std::env::var("PROVIDER_API_TOKEN").unwrap_or_default();

        let endpoints = catalog
            .providers()
            .iter()
            .map(|provider| {
                let key = provider.id.to_uppercase().replace('-', "_");
                let defaults = ProviderEndpoint::default_for(&provider.id, &shared_token);
                let var = |suffix: &str| std::env::var(format!("PROVIDER_{}_{}", key, suffix)).ok();
                let endpoint = ProviderEndpoint::new(
                    var("URL").unwrap_or(defaults.base_url),
                    var("TOKEN").unwrap_or(defaults.token),
                    var("MODEL").unwrap_or(defaults.model),
                );
                (provider.id.clone(), endpoint)
            })
            .collect();

        Self {
            endpoints,
            request_timeout: Duration::from_secs(
                std::env::var("PROVIDER_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    pub fn with_endpoint(mut self, provider_id: impl Into<String>, endpoint: ProviderEndpoint) -> Self {
        self.endpoints.insert(provider_id.into(), endpoint);
        self
    }

    /// Endpoint for `provider_id`, falling back to the defaults.
    pub fn endpoint(&self, provider_id: &str) -> ProviderEndpoint {
        self.endpoints
            .get(provider_id)
            .cloned()
            .unwrap_or_else(|| ProviderEndpoint::default_for(provider_id, ""))
    }
}
