//! Axum HTTP API for the VGen generation service.
//!
//! Accepts generation requests, serves job polling views and exposes the
//! credit balance and creator wallet reads.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
