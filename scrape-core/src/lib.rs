//! scrape-core: the job lifecycle and result persistence core.
//!
//! A [`Job`] moves through `pending -> running -> {completed, failed}`
//! (with `pending -> failed` reserved for dispatch failures). The stores in
//! [`store`] own that state machine and keep scraped records consistent with
//! it: results are only ever written in the same transaction that completes
//! the job (or, for a composite job, the part that produced them).

pub mod config;
pub mod errors;
pub mod models;
pub mod store;
pub mod validation;

pub use config::{ConfigError, ConfigSnapshot, ConfigStore};
pub use errors::{ErrorKind, ServiceError};
pub use models::{
    FieldMap, HockeyRecord, HockeyStats, Job, JobId, JobKind, JobStatus, OscarAward,
    OscarRecord, RecordBatch, ScrapeTarget, StoredRecord, UnknownKind,
};
pub use store::{
    Claim, Commit, JobResults, JobStore, MemoryStore, Page, ResultStore, ScrapeStore,
    SkipReason, StoreError, StoreResult,
};
pub use validation::{RecordError, ValidationError};

#[cfg(feature = "postgres")]
pub use store::PgStore;
