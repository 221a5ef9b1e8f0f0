//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use tracker_core::model::{ProblemError, ProblemId};
use tracker_core::time::DateError;

/// Errors emitted by `ProblemService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProblemServiceError {
    /// Missing id or name, or a malformed link.
    #[error(transparent)]
    Validation(ProblemError),
    #[error(transparent)]
    InvalidDate(#[from] DateError),
    #[error("problem {0} already exists")]
    DuplicateIdentifier(ProblemId),
    #[error("problem {0} not found")]
    NotFound(ProblemId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ProblemError> for ProblemServiceError {
    fn from(err: ProblemError) -> Self {
        match err {
            ProblemError::InvalidDate(date) => Self::InvalidDate(date),
            other => Self::Validation(other),
        }
    }
}

