//! Generation provider catalog entries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A third-party text-to-video provider and its capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Provider {
    /// Stable identifier (e.g. "kling")
    pub id: String,
    /// Longest clip the provider can produce
    pub max_duration_seconds: u32,
    /// Relative cost compared to the baseline provider
    #[serde(default = "default_cost_multiplier")]
    pub cost_multiplier: f64,
    /// Lower is preferred
    pub priority: u32,
    /// Whether completion must be polled
    #[serde(default)]
    pub is_async: bool,
}

fn default_cost_multiplier() -> f64 {
    1.0
}

impl Provider {
    pub fn new(id: impl Into<String>, max_duration_seconds: u32, priority: u32, is_async: bool) -> Self {
        Self {
            id: id.into(),
            max_duration_seconds,
            cost_multiplier: default_cost_multiplier(),
            priority,
            is_async,
        }
    }

    pub fn with_cost_multiplier(mut self, multiplier: f64) -> Self {
        self.cost_multiplier = multiplier;
        self
    }

    /// Whether a clip of `duration_seconds` fits within this provider's limit.
    pub fn supports_duration(&self, duration_seconds: u32) -> bool {
        self.max_duration_seconds >= duration_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_deserialize_defaults() {
        let provider: Provider =
            serde_json::from_str(r#"{"id":"kling","max_duration_seconds":10,"priority":1}"#).unwrap();
        assert_eq!(provider.cost_multiplier, 1.0);
        assert!(!provider.is_async);
        assert!(provider.supports_duration(10));
        assert!(!provider.supports_duration(11));
    }
}
