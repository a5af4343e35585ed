//! Model-level error types.

use thiserror::Error;

use crate::job::JobStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Scene results already recorded for job {0}")]
    SceneResultsAlreadyRecorded(String),

    #[error("Unknown style: {0}")]
    UnknownStyle(String),
}
