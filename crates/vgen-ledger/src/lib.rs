//! Credit ledger and settlement for the VGen backend.
//!
//! This crate provides:
//! - Ledger and wallet store contracts with versioned conditional writes
//! - In-memory stores
//! - The settlement saga (reserve, settle, refund) and credit purchases

pub mod error;
pub mod memory;
pub mod metrics;
pub mod settlement;
pub mod store;

pub use error::{LedgerError, LedgerResult};
pub use memory::{InMemoryLedgerStore, InMemoryWalletStore};
pub use settlement::{
    royalty_split, CreditSettlement, RefundOutcome, SettlementOutcome, SettlementRequest,
    SettlementStatus,
};
pub use store::{AccountSnapshot, LedgerStore, WalletStore};
