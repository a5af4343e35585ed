//! Generation provider access for the VGen backend.
//!
//! This crate provides:
//! - The provider catalog (registry) and fallback cascade selection
//! - The `ProviderAdapter` contract and an HTTP prediction-API adapter
//! - The completion poller for asynchronous providers

pub mod adapter;
pub mod cascade;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod poller;
pub mod types;

pub use adapter::{AdapterRegistry, JobHandle, PollStatus, ProviderAdapter, Submission};
pub use cascade::FallbackSelector;
pub use catalog::ProviderCatalog;
pub use config::{ProviderEndpoint, ProviderSettings};
pub use error::{ProviderError, ProviderResult};
pub use http::HttpProviderAdapter;
pub use poller::{cancelled, CancelSignal, CompletionPoller};
pub use types::ProviderOutput;
