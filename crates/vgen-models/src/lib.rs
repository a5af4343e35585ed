//! Shared data models for the VGen backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video generation jobs and their lifecycle states
//! - Per-scene generation results
//! - The generation provider catalog entries
//! - Credit ledger entries and creator wallets
//! - Inbound generation requests and polling views

pub mod credit_cost;
pub mod error;
pub mod job;
pub mod job_status;
pub mod ledger;
pub mod provider;
pub mod request;
pub mod scene;
pub mod style;
pub mod wallet;

// Re-export common types
pub use credit_cost::{CostBreakdown, JobCostCalculator};
pub use error::{ModelError, ModelResult};
pub use job::{AssemblyOutput, JobId, JobStatus, VideoJob};
pub use job_status::JobStatusView;
pub use ledger::{CreditLedgerEntry, LedgerEntryStatus, LedgerEntryType, PLATFORM_ACCOUNT_ID};
pub use provider::Provider;
pub use request::{GenerationRequest, JobAccepted};
pub use scene::{ScenePlan, SceneResult};
pub use style::VideoStyle;
pub use wallet::CreatorWallet;

/// Platform fee charged on creator royalties, in basis points (2.5%).
pub const PLATFORM_FEE_BPS: u32 = 250;

/// Denominator for basis-point rates.
pub const BPS_DENOMINATOR: i64 = 10_000;
