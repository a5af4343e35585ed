//! Provider error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} rejected request ({status}): {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} generation failed: {message}")]
    GenerationFailed { provider: String, message: String },

    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("{provider} network error: {message}")]
    Network { provider: String, message: String },

    #[error("{provider} did not complete after {attempts} polls")]
    Timeout { provider: String, attempts: u32 },

    #[error("{provider} attempt exceeded {seconds}s")]
    AttemptTimeout { provider: String, seconds: u64 },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("No adapter registered for provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid provider catalog: {0}")]
    InvalidCatalog(String),

    #[error("Catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn rejected(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn network(provider: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Network {
            provider: provider.into(),
            message: err.to_string(),
        }
    }

    pub fn generation_failed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Polling budget or per-attempt wall clock exhausted.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::AttemptTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Provider the failure is attributed to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Rejected { provider, .. }
            | Self::GenerationFailed { provider, .. }
            | Self::InvalidResponse { provider, .. }
            | Self::Network { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::AttemptTimeout { provider, .. } => Some(provider),
            Self::UnknownProvider(provider) => Some(provider),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "rejected",
            Self::GenerationFailed { .. } => "failed",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Network { .. } => "network",
            Self::Timeout { .. } | Self::AttemptTimeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::UnknownProvider(_) => "unknown_provider",
            Self::InvalidCatalog(_) | Self::Io(_) | Self::Json(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let timeout = ProviderError::Timeout {
            provider: "kling".into(),
            attempts: 60,
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.provider(), Some("kling"));
        assert_eq!(timeout.to_string(), "kling did not complete after 60 polls");

        let rejected = ProviderError::rejected("runway", 422, "bad prompt");
        assert!(!rejected.is_timeout());
        assert_eq!(rejected.kind(), "rejected");
        assert!(ProviderError::Cancelled.is_cancelled());
    }
}
