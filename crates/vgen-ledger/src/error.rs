//! Ledger error types.

use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during ledger and settlement operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Wallet store unavailable: {0}")]
    WalletUnavailable(String),

    #[error("Settlement for job {job_id} rolled back: {reason}")]
    RolledBack { job_id: String, reason: String },

    #[error("Settlement already in progress for job {0}")]
    InProgress(String),

    #[error("Concurrent updates: {0}")]
    Contention(String),

    #[error("Ledger store error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn wallet_unavailable(msg: impl Into<String>) -> Self {
        Self::WalletUnavailable(msg.into())
    }

    /// True if another writer changed the account since it was read.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, LedgerError::PreconditionFailed(_))
    }

    pub fn is_insufficient_credits(&self) -> bool {
        matches!(self, LedgerError::InsufficientCredits { .. })
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, LedgerError::RolledBack { .. })
    }
}
