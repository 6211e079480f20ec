use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Positive, ascending job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job type `{0}`")]
pub struct UnknownKind(pub String);

/// A single scrape that a worker can run: one channel, one record variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeTarget {
    Hockey,
    Oscar,
}

impl ScrapeTarget {
    pub const ALL: [ScrapeTarget; 2] = [ScrapeTarget::Hockey, ScrapeTarget::Oscar];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeTarget::Hockey => "hockey",
            ScrapeTarget::Oscar => "oscar",
        }
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapeTarget {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hockey" => Ok(ScrapeTarget::Hockey),
            "oscar" => Ok(ScrapeTarget::Oscar),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// What a job asks for. `All` fans out to every [`ScrapeTarget`] under one job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Hockey,
    Oscar,
    All,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Hockey => "hockey",
            JobKind::Oscar => "oscar",
            JobKind::All => "all",
        }
    }

    /// Targets in publish order.
    pub fn targets(&self) -> &'static [ScrapeTarget] {
        match self {
            JobKind::Hockey => &[ScrapeTarget::Hockey],
            JobKind::Oscar => &[ScrapeTarget::Oscar],
            JobKind::All => &ScrapeTarget::ALL,
        }
    }

    pub fn includes(&self, target: ScrapeTarget) -> bool {
        self.targets().contains(&target)
    }

    pub fn is_composite(&self) -> bool {
        self.targets().len() > 1
    }
}

impl From<ScrapeTarget> for JobKind {
    fn from(target: ScrapeTarget) -> Self {
        match target {
            ScrapeTarget::Hockey => JobKind::Hockey,
            ScrapeTarget::Oscar => JobKind::Oscar,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(JobKind::All),
            other => other
                .parse::<ScrapeTarget>()
                .map(JobKind::from)
                .map_err(|_| UnknownKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Allowed edges: pending -> running -> {completed, failed}, and
    /// pending -> failed for jobs that never reached a queue.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    /// Targets whose results are already committed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed_parts: Vec<ScrapeTarget>,
    /// Targets a worker has claimed but not yet committed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub running_parts: Vec<ScrapeTarget>,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            error_message: None,
            completed_parts: Vec::new(),
            running_parts: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn part_committed(&self, target: ScrapeTarget) -> bool {
        self.completed_parts.contains(&target)
    }

    pub fn part_running(&self, target: ScrapeTarget) -> bool {
        self.running_parts.contains(&target)
    }

    /// Record that `target` has been claimed by a worker.
    pub fn start_part(&mut self, target: ScrapeTarget) {
        if !self.part_running(target) {
            self.running_parts.push(target);
        }
    }

    /// Move `target` from running to committed.
    pub fn commit_part(&mut self, target: ScrapeTarget) {
        self.running_parts.retain(|t| *t != target);
        if !self.part_committed(target) {
            self.completed_parts.push(target);
        }
    }

    /// Targets that still have to commit before the job can complete.
    pub fn outstanding_parts(&self) -> Vec<ScrapeTarget> {
        self.kind
            .targets()
            .iter()
            .copied()
            .filter(|t| !self.part_committed(*t))
            .collect()
    }

    /// Bump `updated_at`, never letting it go backwards or stand still.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}
