//! Generation job orchestration.
//!
//! This crate provides:
//! - Scene planning and the concurrent scene dispatcher
//! - The assembly requester
//! - The job lifecycle state machine with settlement and refunds
//! - The job registry, generation service and telemetry sinks

pub mod assembly;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod planner;
pub mod registry;
pub mod service;
pub mod telemetry;

pub use assembly::{AssemblyService, HttpAssemblyClient};
pub use config::{PricingConfig, WorkerConfig};
pub use dispatcher::{DispatchObserver, DispatchReport, DispatchTarget, NoopObserver, SceneDispatcher, StopReason};
pub use error::{WorkerError, WorkerResult};
pub use lifecycle::JobOrchestrator;
pub use logging::JobLogger;
pub use planner::{plan_scenes, SceneSource};
pub use registry::{JobRegistry, JobStats};
pub use service::{GenerationService, ServiceDeps};
pub use telemetry::{HttpTelemetry, TelemetryEvent, TelemetryLevel, TelemetrySink, TracingTelemetry};
