use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{
    apply_commit, check_commit, check_transition, claim_part, Claim, Commit, JobResults, JobStore,
    Page, ResultStore, ScrapeStore, StoreError, StoreResult,
};
use crate::models::{
    HockeyRecord, Job, JobId, JobKind, JobStatus, OscarRecord, RecordBatch, ScrapeTarget,
    StoredRecord,
};

/// Jobs and both result tables behind one lock, so a write that spans them
/// is a single critical section.
///
/// Mutating helpers check everything first and only then write; an `Err`
/// always leaves the tables untouched.
#[derive(Debug, Default)]
struct Tables {
    jobs: BTreeMap<JobId, Job>,
    hockey: Vec<HockeyRecord>,
    oscar: Vec<OscarRecord>,
    /// Committed parts of composite jobs that are still running. They become
    /// rows only together with the job's completion and vanish if it fails.
    staged: HashMap<JobId, Vec<RecordBatch>>,
    last_job_id: i64,
    last_hockey_id: i64,
    last_oscar_id: i64,
}

impl Tables {
    fn job(&self, id: JobId) -> StoreResult<&Job> {
        self.jobs.get(&id).ok_or(StoreError::JobNotFound(id))
    }

    fn job_mut(&mut self, id: JobId) -> StoreResult<&mut Job> {
        self.jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))
    }

    fn transition(
        &mut self,
        id: JobId,
        status: JobStatus,
        error_message: Option<String>,
    ) -> StoreResult<Job> {
        check_transition(self.job(id)?, status, error_message.as_deref())?;

        let job = self.job_mut(id)?;
        job.status = status;
        job.error_message = error_message;
        job.touch();
        let job = job.clone();

        if status == JobStatus::Failed {
            self.staged.remove(&id);
        }
        Ok(job)
    }

    /// Rows must already be validated.
    fn insert_batch(&mut self, job_id: JobId, batch: RecordBatch) -> usize {
        match batch {
            RecordBatch::Hockey(rows) => {
                let count = rows.len();
                for data in rows {
                    self.last_hockey_id += 1;
                    self.hockey.push(StoredRecord {
                        id: self.last_hockey_id,
                        job_id,
                        data,
                    });
                }
                count
            }
            RecordBatch::Oscar(rows) => {
                let count = rows.len();
                for data in rows {
                    self.last_oscar_id += 1;
                    self.oscar.push(StoredRecord {
                        id: self.last_oscar_id,
                        job_id,
                        data,
                    });
                }
                count
            }
        }
    }
}

/// In-memory store for tests, development and the single-process server.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_count(&self) -> usize {
        self.tables.read().jobs.len()
    }
}

fn page_newest_first<T: Clone>(rows: &[T], offset: usize, limit: usize) -> Page<T> {
    Page {
        total: rows.len(),
        items: rows.iter().rev().skip(offset).take(limit).cloned().collect(),
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create(&self, kind: JobKind) -> StoreResult<Job> {
        let mut tables = self.tables.write();
        tables.last_job_id += 1;
        let job = Job::new(JobId::new(tables.last_job_id), kind);
        tables.jobs.insert(job.id, job.clone());
        debug!("Created job {} ({})", job.id, kind);
        Ok(job)
    }

    async fn get(&self, id: JobId) -> StoreResult<Job> {
        self.tables.read().job(id).cloned()
    }

    async fn list(&self, offset: usize, limit: usize) -> StoreResult<Page<Job>> {
        let tables = self.tables.read();
        let mut jobs: Vec<&Job> = tables.jobs.values().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(Page {
            total: jobs.len(),
            items: jobs.into_iter().skip(offset).take(limit).cloned().collect(),
        })
    }

    async fn transition(
        &self,
        id: JobId,
        status: JobStatus,
        error_message: Option<String>,
    ) -> StoreResult<Job> {
        let job = self.tables.write().transition(id, status, error_message)?;
        debug!("Job {} is now {}", id, job.status);
        Ok(job)
    }

    async fn claim(&self, id: JobId, target: ScrapeTarget) -> StoreResult<Claim> {
        claim_part(self.tables.write().job_mut(id)?, target)
    }

    async fn delete(&self, id: JobId) -> StoreResult<usize> {
        let mut tables = self.tables.write();
        tables.jobs.remove(&id).ok_or(StoreError::JobNotFound(id))?;
        tables.staged.remove(&id);

        let before = tables.hockey.len() + tables.oscar.len();
        tables.hockey.retain(|r| r.job_id != id);
        tables.oscar.retain(|r| r.job_id != id);
        Ok(before - tables.hockey.len() - tables.oscar.len())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn bulk_insert(&self, job_id: JobId, batch: RecordBatch) -> StoreResult<usize> {
        batch.validate()?;
        let mut tables = self.tables.write();
        tables.job(job_id)?;
        Ok(tables.insert_batch(job_id, batch))
    }

    async fn list_by_job(&self, job_id: JobId) -> StoreResult<JobResults> {
        let tables = self.tables.read();
        Ok(JobResults {
            hockey: tables
                .hockey
                .iter()
                .filter(|r| r.job_id == job_id)
                .cloned()
                .collect(),
            oscar: tables
                .oscar
                .iter()
                .filter(|r| r.job_id == job_id)
                .cloned()
                .collect(),
        })
    }

    async fn list_hockey(&self, offset: usize, limit: usize) -> StoreResult<Page<HockeyRecord>> {
        Ok(page_newest_first(&self.tables.read().hockey, offset, limit))
    }

    async fn list_oscar(&self, offset: usize, limit: usize) -> StoreResult<Page<OscarRecord>> {
        Ok(page_newest_first(&self.tables.read().oscar, offset, limit))
    }
}

#[async_trait]
impl ScrapeStore for MemoryStore {
    async fn commit_results(
        &self,
        job_id: JobId,
        target: ScrapeTarget,
        batch: RecordBatch,
    ) -> StoreResult<Commit> {
        let mut tables = self.tables.write();
        let completes = check_commit(tables.job(job_id)?, target, &batch)?;

        let inserted = batch.len();
        if completes {
            for earlier in tables.staged.remove(&job_id).unwrap_or_default() {
                tables.insert_batch(job_id, earlier);
            }
            tables.insert_batch(job_id, batch);
        } else {
            tables.staged.entry(job_id).or_default().push(batch);
        }

        let job = tables.job_mut(job_id)?;
        apply_commit(job, target, completes);

        debug!(
            "Committed {} {} records for job {} (status {})",
            inserted, target, job_id, job.status
        );
        Ok(Commit {
            job: job.clone(),
            inserted,
        })
    }
}
