//! Uniform call surface over generation providers.
//!
//! Adapters never retry. Fallback across providers is the caller's policy.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use vgen_models::Provider;

use crate::error::{ProviderError, ProviderResult};

/// Opaque reference to an in-flight asynchronous generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub provider_id: String,
    pub id: String,
}

impl JobHandle {
    pub fn new(provider_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider_id, self.id)
    }
}

/// Outcome of a submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Synchronous provider returned the artifact directly
    Completed(String),
    /// Asynchronous provider accepted the work; completion must be polled
    Pending(JobHandle),
}

/// Status reported while polling an asynchronous generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Succeeded,
    Failed(String),
}

/// A provider's request/poll/result protocol.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Catalog entry this adapter talks to.
    fn provider(&self) -> &Provider;

    /// Start a generation.
    async fn submit(&self, prompt: &str, duration_seconds: u32) -> ProviderResult<Submission>;

    /// Check on an asynchronous generation.
    async fn poll_status(&self, handle: &JobHandle) -> ProviderResult<PollStatus>;

    /// Retrieve the artifact URL of a succeeded generation.
    async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<String>;
}

/// Adapters keyed by provider id.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its provider's id, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider().id.clone(), adapter);
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, provider_id: &str) -> ProviderResult<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(provider_id)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(provider_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.adapters.keys().collect();
        ids.sort();
        f.debug_struct("AdapterRegistry").field("providers", &ids).finish()
    }
}
