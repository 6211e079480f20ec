//! Job and result stores.
//!
//! Every operation that writes more than one thing is a single atomic unit:
//! either all of its effects are visible afterwards or none are.

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{
    HockeyRecord, Job, JobId, JobKind, JobStatus, OscarRecord, RecordBatch, ScrapeTarget,
};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

/// One page of a listing plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
        }
    }
}

/// Outcome of a worker asking to start a job for one target.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// pending -> running happened now
    Started(Job),
    /// Composite job already running for a sibling target; this part was idle.
    Resumed(Job),
    /// Nothing to do for this delivery.
    Skipped { job: Job, reason: SkipReason },
}

impl Claim {
    pub fn job(&self) -> &Job {
        match self {
            Claim::Started(job) | Claim::Resumed(job) | Claim::Skipped { job, .. } => job,
        }
    }

    pub fn should_run(&self) -> bool {
        !matches!(self, Claim::Skipped { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Terminal(JobStatus),
    /// Another delivery for the same target is being handled.
    PartRunning(ScrapeTarget),
    PartCommitted(ScrapeTarget),
    NotPartOfJob(ScrapeTarget),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Terminal(status) => write!(f, "job is already {status}"),
            SkipReason::PartRunning(target) => write!(f, "{target} part is already running"),
            SkipReason::PartCommitted(target) => write!(f, "{target} results already committed"),
            SkipReason::NotPartOfJob(target) => write!(f, "job does not include {target}"),
        }
    }
}

/// Everything stored for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobResults {
    pub hockey: Vec<HockeyRecord>,
    pub oscar: Vec<OscarRecord>,
}

impl JobResults {
    pub fn len(&self) -> usize {
        self.hockey.len() + self.oscar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of [`ScrapeStore::commit_results`].
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub job: Job,
    pub inserted: usize,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// New job in `pending`, timestamps set to now.
    async fn create(&self, kind: JobKind) -> StoreResult<Job>;

    async fn get(&self, id: JobId) -> StoreResult<Job>;

    /// Newest first.
    async fn list(&self, offset: usize, limit: usize) -> StoreResult<Page<Job>>;

    /// Move a job along one edge of the state machine.
    ///
    /// `error_message` must be `Some` (non-empty) exactly when `status` is failed.
    async fn transition(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<String>,
    ) -> StoreResult<Job>;

    /// Atomically start (or resume) a job on behalf of the worker consuming `target`.
    async fn claim(&self, id: JobId, target: ScrapeTarget) -> StoreResult<Claim>;

    /// Remove a job and its results. Returns the number of results removed.
    async fn delete(&self, id: JobId) -> StoreResult<usize>;

    async fn fail(&self, id: JobId, error_message: String) -> StoreResult<Job> {
        self.transition(id, JobStatus::Failed, Some(error_message)).await
    }
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert all rows or none. Returns the number inserted.
    async fn bulk_insert(&self, job_id: JobId, batch: RecordBatch) -> StoreResult<usize>;

    async fn list_by_job(&self, job_id: JobId) -> StoreResult<JobResults>;

    /// Most recently inserted first.
    async fn list_hockey(&self, offset: usize, limit: usize) -> StoreResult<Page<HockeyRecord>>;

    /// Most recently inserted first.
    async fn list_oscar(&self, offset: usize, limit: usize) -> StoreResult<Page<OscarRecord>>;
}

/// The transactional seam the worker relies on.
#[async_trait]
pub trait ScrapeStore: JobStore + ResultStore {
    /// In one transaction: insert `batch`, mark `target` committed, and complete
    /// the job once no parts are outstanding. The job must be running.
    async fn commit_results(
        &self,
        job_id: JobId,
        target: ScrapeTarget,
        batch: RecordBatch,
    ) -> StoreResult<Commit>;
}

/// `status` must be reachable from the job's current status, and an error
/// message must accompany exactly the failed status.
pub(crate) fn check_transition(
    job: &Job,
    status: JobStatus,
    error_message: Option<&str>,
) -> StoreResult<()> {
    if !job.status.can_transition_to(status) {
        return Err(StoreError::InvalidTransition {
            job_id: job.id,
            from: job.status,
            to: status,
        });
    }
    let has_message = error_message.is_some_and(|m| !m.trim().is_empty());
    if has_message != (status == JobStatus::Failed) {
        return Err(StoreError::ErrorMessageMismatch {
            job_id: job.id,
            status,
        });
    }
    Ok(())
}

/// Claim `target` on a job the caller holds exclusively. The job is only
/// modified when the claim is not skipped.
pub(crate) fn claim_part(job: &mut Job, target: ScrapeTarget) -> StoreResult<Claim> {
    let reason = if !job.kind.includes(target) {
        Some(SkipReason::NotPartOfJob(target))
    } else if job.is_terminal() {
        Some(SkipReason::Terminal(job.status))
    } else if job.part_committed(target) {
        Some(SkipReason::PartCommitted(target))
    } else if job.part_running(target) {
        Some(SkipReason::PartRunning(target))
    } else {
        None
    };
    if let Some(reason) = reason {
        return Ok(Claim::Skipped {
            job: job.clone(),
            reason,
        });
    }

    let started = job.status == JobStatus::Pending;
    if started {
        check_transition(job, JobStatus::Running, None)?;
        job.status = JobStatus::Running;
    }
    job.start_part(target);
    job.touch();

    Ok(if started {
        Claim::Started(job.clone())
    } else {
        Claim::Resumed(job.clone())
    })
}

/// Checks for [`ScrapeStore::commit_results`]. Returns whether this commit
/// completes the job.
pub(crate) fn check_commit(
    job: &Job,
    target: ScrapeTarget,
    batch: &RecordBatch,
) -> StoreResult<bool> {
    if batch.target() != target || !job.kind.includes(target) {
        return Err(StoreError::TargetMismatch {
            job_id: job.id,
            target: batch.target(),
        });
    }
    batch.validate()?;
    if job.part_committed(target) {
        return Err(StoreError::PartAlreadyCommitted {
            job_id: job.id,
            target,
        });
    }

    let completes = job.outstanding_parts() == [target];
    if completes {
        check_transition(job, JobStatus::Completed, None)?;
    } else if job.status != JobStatus::Running {
        return Err(StoreError::InvalidTransition {
            job_id: job.id,
            from: job.status,
            to: JobStatus::Completed,
        });
    }
    Ok(completes)
}

/// Marks `target` committed on a job that passed [`check_commit`].
pub(crate) fn apply_commit(job: &mut Job, target: ScrapeTarget, completes: bool) {
    job.commit_part(target);
    if completes {
        job.status = JobStatus::Completed;
    }
    job.touch();
}
