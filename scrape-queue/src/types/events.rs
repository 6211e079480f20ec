use chrono::{DateTime, Utc};
use scrape_core::{JobId, JobKind, ScrapeTarget};
use serde::{Deserialize, Serialize};

/// Lifecycle events broadcast by the dispatcher and workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEvent {
    /// Envelopes for every target reached their channels
    Dispatched {
        job_id: JobId,
        kind: JobKind,
        at: DateTime<Utc>,
    },

    /// A publish failed; the job was marked failed
    DispatchFailed {
        job_id: JobId,
        channel: String,
        error: String,
        at: DateTime<Utc>,
    },

    /// A worker started scraping one target
    Started {
        job_id: JobId,
        target: ScrapeTarget,
        at: DateTime<Utc>,
    },

    /// Results for one target were committed
    Completed {
        job_id: JobId,
        target: ScrapeTarget,
        records: usize,
        job_finished: bool,
        at: DateTime<Utc>,
    },

    /// The job was marked failed by a worker
    Failed {
        job_id: JobId,
        target: ScrapeTarget,
        error: String,
        at: DateTime<Utc>,
    },

    /// A delivery was acknowledged without running anything
    Dropped {
        job_id: Option<JobId>,
        channel: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl JobEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Dispatched { .. } => "dispatched",
            Self::DispatchFailed { .. } => "dispatch_failed",
            Self::Started { .. } => "started",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Dropped { .. } => "dropped",
        }
    }

    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Dispatched { job_id, .. }
            | Self::DispatchFailed { job_id, .. }
            | Self::Started { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => Some(*job_id),
            Self::Dropped { job_id, .. } => *job_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Dispatched { at, .. }
            | Self::DispatchFailed { at, .. }
            | Self::Started { at, .. }
            | Self::Completed { at, .. }
            | Self::Failed { at, .. }
            | Self::Dropped { at, .. } => *at,
        }
    }
}
