//! Fallback cascade selection.

use std::sync::Arc;

use vgen_models::Provider;

use crate::catalog::ProviderCatalog;

/// Picks the ordered provider sequence to attempt for a scene.
#[derive(Debug, Clone)]
pub struct FallbackSelector {
    catalog: Arc<ProviderCatalog>,
}

impl FallbackSelector {
    pub fn new(catalog: Arc<ProviderCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Ordered providers for a scene of `required_duration` seconds.
    ///
    /// Qualifying providers are sorted by ascending priority and the starting
    /// offset is rotated by `scene_index`, wrapping around in priority order.
    /// When nothing qualifies the single longest-capable provider is returned.
    pub fn select_cascade(&self, required_duration: u32, scene_index: u32) -> Vec<Provider> {
        let qualifying = self.catalog.qualifying(required_duration);

        if qualifying.is_empty() {
            return self.catalog.longest_capable().cloned().into_iter().collect();
        }

        let offset = scene_index as usize % qualifying.len();
        qualifying[offset..]
            .iter()
            .chain(qualifying[..offset].iter())
            .cloned()
            .collect()
    }
}
