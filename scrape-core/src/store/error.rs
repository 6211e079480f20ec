use thiserror::Error;

use crate::errors::ServiceError;
use crate::models::{JobId, JobStatus, ScrapeTarget};
use crate::validation::RecordError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("job {job_id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// `error_message` must be present (and non-empty) exactly when the status is failed.
    #[error("job {job_id}: error message does not match status {status}")]
    ErrorMessageMismatch { job_id: JobId, status: JobStatus },

    #[error("job {job_id} does not produce {target} results")]
    TargetMismatch { job_id: JobId, target: ScrapeTarget },

    #[error("job {job_id}: {target} results were already committed")]
    PartAlreadyCommitted { job_id: JobId, target: ScrapeTarget },

    #[error(transparent)]
    InvalidRecord(#[from] RecordError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::JobNotFound(_))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        let base = match &err {
            StoreError::JobNotFound(_) => ServiceError::not_found(message),
            StoreError::InvalidRecord(record) => ServiceError::unprocessable(message)
                .with_data(serde_json::json!({ "index": record.index })),
            StoreError::InvalidTransition { .. }
            | StoreError::ErrorMessageMismatch { .. }
            | StoreError::TargetMismatch { .. }
            | StoreError::PartAlreadyCommitted { .. }
            | StoreError::Backend(_) => ServiceError::general_error(message),
        };
        base.with_source(err.into())
    }
}
