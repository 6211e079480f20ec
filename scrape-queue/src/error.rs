use scrape_core::{Job, JobId, ScrapeTarget, ServiceError, StoreError};
use serde_json::json;
use thiserror::Error;

use crate::types::DeliveryTag;

/// Result type for broker and worker operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for channel operations
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("broker is not connected")]
    NotConnected,

    #[error("channel `{0}` has not been declared")]
    ChannelNotDeclared(String),

    #[error("publish to `{channel}` failed: {reason}")]
    PublishFailed { channel: String, reason: String },

    #[error("unknown delivery tag {0}")]
    UnknownDelivery(DeliveryTag),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("no scraper registered for {0}")]
    ScraperNotRegistered(ScrapeTarget),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("broker backend error: {0}")]
    Backend(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            Self::NotConnected
        } else {
            Self::Backend(err.to_string())
        }
    }
}

/// Why a scrape produced no rows.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScrapeError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("scraper misconfigured: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl ScrapeError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Failure to schedule a job.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to create job: {0}")]
    Store(#[from] StoreError),

    /// The job exists and has been marked failed (when the store allowed it).
    #[error("failed to schedule job {}: {source}", job.id)]
    Publish {
        job: Job,
        channel: String,
        #[source]
        source: QueueError,
    },
}

impl DispatchError {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            DispatchError::Store(_) => None,
            DispatchError::Publish { job, .. } => Some(job.id),
        }
    }
}

impl From<DispatchError> for ServiceError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Store(store) => store.into(),
            DispatchError::Publish { job, channel, source } => {
                ServiceError::general_error(format!("failed to schedule job {}: {source}", job.id))
                    .with_data(json!({
                        "job_id": job.id,
                        "channel": channel,
                        "status": job.status,
                    }))
                    .with_source(source.into())
            }
        }
    }
}
