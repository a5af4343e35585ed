//! Worker error types.

use thiserror::Error;
use vgen_ledger::LedgerError;
use vgen_models::ModelError;
use vgen_providers::ProviderError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Every provider in a scene's cascade failed; carries the last error.
    #[error("Scene {scene_index} exhausted all providers: {last_error}")]
    SceneExhausted { scene_index: u32, last_error: String },

    #[error("no scenes generated successfully")]
    NoScenesSucceeded,

    #[error("Assembly failed: {0}")]
    Assembly(String),

    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Settlement rolled back: {0}")]
    SettlementRollback(String),

    #[error("job cancelled")]
    Cancelled,

    #[error("job timeout exceeded")]
    JobTimedOut,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Worker is shutting down")]
    ShuttingDown,

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl From<LedgerError> for WorkerError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits {
                required,
                available,
            } => Self::InsufficientCredits {
                required,
                available,
            },
            LedgerError::RolledBack { reason, .. } => Self::SettlementRollback(reason),
            other => Self::Ledger(other),
        }
    }
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly(msg.into())
    }

    pub fn scene_exhausted(scene_index: u32, last_error: impl Into<String>) -> Self {
        Self::SceneExhausted {
            scene_index,
            last_error: last_error.into(),
        }
    }

    pub fn is_insufficient_credits(&self) -> bool {
        matches!(self, WorkerError::InsufficientCredits { .. })
    }

    /// Message stored on a failed job.
    pub fn user_message(&self) -> String {
        match self {
            WorkerError::NoScenesSucceeded | WorkerError::Cancelled | WorkerError::JobTimedOut => {
                self.to_string()
            }
            WorkerError::InsufficientCredits { .. } => "insufficient credits".to_string(),
            WorkerError::Assembly(msg) => format!("assembly failed: {}", msg),
            WorkerError::SettlementRollback(_) => {
                "payment settlement failed; credits were refunded".to_string()
            }
            WorkerError::Ledger(_) => "payment settlement failed".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_are_lifted() {
        let err: WorkerError = LedgerError::InsufficientCredits {
            required: 100,
            available: 40,
        }
        .into();
        assert!(err.is_insufficient_credits());
        assert_eq!(err.user_message(), "insufficient credits");

        let err: WorkerError = LedgerError::RolledBack {
            job_id: "j".into(),
            reason: "wallet down".into(),
        }
        .into();
        assert!(matches!(err, WorkerError::SettlementRollback(ref r) if r == "wallet down"));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            WorkerError::NoScenesSucceeded.user_message(),
            "no scenes generated successfully"
        );
        assert_eq!(WorkerError::Cancelled.user_message(), "job cancelled");
        assert_eq!(
            WorkerError::assembly("503 Service Unavailable").user_message(),
            "assembly failed: 503 Service Unavailable"
        );
    }
}
