mod job;
mod records;

pub use job::{Job, JobId, JobKind, JobStatus, ScrapeTarget, UnknownKind};
pub use records::{
    FieldMap, HockeyRecord, HockeyStats, OscarAward, OscarRecord, RecordBatch, StoredRecord,
};
