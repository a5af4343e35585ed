//! Application state.

use std::sync::Arc;

use vgen_worker::GenerationService;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: Arc<GenerationService>,
}

impl AppState {
    pub fn new(config: ApiConfig, service: Arc<GenerationService>) -> Self {
        Self { config, service }
    }
}
