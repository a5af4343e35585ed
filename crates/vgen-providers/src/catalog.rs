//! Provider registry.
//!
//! The catalog is an explicit value handed to the fallback selector and the
//! adapter registry, so tests can substitute provider sets deterministically.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;
use vgen_models::Provider;

use crate::error::{ProviderError, ProviderResult};

/// Validated, read-only set of generation providers.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    providers: Vec<Provider>,
}

impl ProviderCatalog {
    /// Build a catalog, rejecting empty sets and duplicate ids.
    pub fn new(providers: Vec<Provider>) -> ProviderResult<Self> {
        if providers.is_empty() {
            return Err(ProviderError::InvalidCatalog(
                "catalog must contain at least one provider".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &providers {
            if provider.id.trim().is_empty() {
                return Err(ProviderError::InvalidCatalog(
                    "provider id must not be empty".to_string(),
                ));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(ProviderError::InvalidCatalog(format!(
                    "duplicate provider id: {}",
                    provider.id
                )));
            }
        }

        Ok(Self { providers })
    }

    /// The built-in provider set.
    pub fn default_catalog() -> Self {
        Self {
            providers: vec![
                Provider::new("kling", 10, 1, true),
                Provider::new("runway", 10, 2, true).with_cost_multiplier(1.5),
                Provider::new("luma", 5, 3, true).with_cost_multiplier(1.2),
                Provider::new("pika", 4, 4, false).with_cost_multiplier(0.8),
                Provider::new("minimax", 6, 5, true),
            ],
        }
    }

    /// Load a catalog from a JSON array of providers.
    pub fn from_json_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let providers: Vec<Provider> = serde_json::from_str(&raw)?;
        let catalog = Self::new(providers)?;
        info!(
            path = %path.display(),
            providers = catalog.len(),
            "Loaded provider catalog"
        );
        Ok(catalog)
    }

    /// Load from `PROVIDER_CATALOG_PATH` if set, otherwise the built-in set.
    pub fn from_env() -> ProviderResult<Self> {
        match std::env::var("PROVIDER_CATALOG_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::from_json_file(path),
            _ => Ok(Self::default_catalog()),
        }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers that can produce a clip of `duration_seconds`, by ascending priority.
    pub fn qualifying(&self, duration_seconds: u32) -> Vec<Provider> {
        let mut qualifying: Vec<Provider> = self
            .providers
            .iter()
            .filter(|p| p.supports_duration(duration_seconds))
            .cloned()
            .collect();
        qualifying.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        qualifying
    }

    /// Provider with the largest clip limit, preferring lower priority on ties.
    pub fn longest_capable(&self) -> Option<&Provider> {
        self.providers.iter().min_by(|a, b| {
            b.max_duration_seconds
                .cmp(&a.max_duration_seconds)
                .then_with(|| a.priority.cmp(&b.priority))
        })
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::default_catalog()
    }
}
