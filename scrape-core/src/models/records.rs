use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{JobId, ScrapeTarget};
use crate::validation::{check_len, check_non_negative, check_range, RecordError, ValidationError};

/// One raw row as returned by a scrape capability.
pub type FieldMap = serde_json::Map<String, Value>;

/// Season statistics for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HockeyStats {
    pub team_name: String,
    pub year: i32,
    #[serde(default)]
    pub wins: i32,
    #[serde(default)]
    pub losses: i32,
    #[serde(default)]
    pub ot_losses: i32,
    #[serde(default)]
    pub win_pct: Option<f64>,
    #[serde(default)]
    pub gf: Option<i32>,
    #[serde(default)]
    pub ga: Option<i32>,
    /// Goal differential, may be negative.
    #[serde(default)]
    pub diff: Option<i32>,
}

impl HockeyStats {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_len("team_name", &self.team_name, 1, 200)?;
        check_range("year", self.year.into(), 1900.0, 2100.0)?;
        check_non_negative("wins", self.wins)?;
        check_non_negative("losses", self.losses)?;
        check_non_negative("ot_losses", self.ot_losses)?;
        if let Some(pct) = self.win_pct {
            check_range("win_pct", pct, 0.0, 1.0)?;
        }
        if let Some(gf) = self.gf {
            check_non_negative("gf", gf)?;
        }
        if let Some(ga) = self.ga {
            check_non_negative("ga", ga)?;
        }
        Ok(())
    }
}

/// Award tally for one film in one ceremony year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscarAward {
    pub year: i32,
    pub title: String,
    pub nominations: i32,
    pub awards: i32,
    #[serde(default)]
    pub best_picture: bool,
}

impl OscarAward {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("year", self.year.into(), 1927.0, 2100.0)?;
        check_len("title", &self.title, 1, 500)?;
        check_non_negative("nominations", self.nominations)?;
        check_non_negative("awards", self.awards)?;
        if self.awards > self.nominations {
            return Err(ValidationError::AwardsExceedNominations {
                awards: self.awards,
                nominations: self.nominations,
            });
        }
        Ok(())
    }
}

/// A persisted record: store-assigned id, owning job, then the record fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord<T> {
    pub id: i64,
    pub job_id: JobId,
    #[serde(flatten)]
    pub data: T,
}

pub type HockeyRecord = StoredRecord<HockeyStats>;
pub type OscarRecord = StoredRecord<OscarAward>;

/// Rows produced by one scrape, typed by target.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBatch {
    Hockey(Vec<HockeyStats>),
    Oscar(Vec<OscarAward>),
}

impl RecordBatch {
    pub fn empty(target: ScrapeTarget) -> Self {
        match target {
            ScrapeTarget::Hockey => RecordBatch::Hockey(Vec::new()),
            ScrapeTarget::Oscar => RecordBatch::Oscar(Vec::new()),
        }
    }

    /// Convert raw rows into typed records. Stops at the first bad row.
    pub fn from_fields(target: ScrapeTarget, rows: Vec<FieldMap>) -> Result<Self, RecordError> {
        match target {
            ScrapeTarget::Hockey => {
                let records = parse_rows::<HockeyStats>(rows, HockeyStats::validate)?;
                Ok(RecordBatch::Hockey(records))
            }
            ScrapeTarget::Oscar => {
                let records = parse_rows::<OscarAward>(rows, OscarAward::validate)?;
                Ok(RecordBatch::Oscar(records))
            }
        }
    }

    pub fn target(&self) -> ScrapeTarget {
        match self {
            RecordBatch::Hockey(_) => ScrapeTarget::Hockey,
            RecordBatch::Oscar(_) => ScrapeTarget::Oscar,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Hockey(rows) => rows.len(),
            RecordBatch::Oscar(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate every row; the error carries the first failing index.
    pub fn validate(&self) -> Result<(), RecordError> {
        let results: Box<dyn Iterator<Item = Result<(), ValidationError>> + '_> = match self {
            RecordBatch::Hockey(rows) => Box::new(rows.iter().map(HockeyStats::validate)),
            RecordBatch::Oscar(rows) => Box::new(rows.iter().map(OscarAward::validate)),
        };
        for (index, result) in results.enumerate() {
            result.map_err(|source| RecordError::new(index, source))?;
        }
        Ok(())
    }
}

fn parse_rows<T: DeserializeOwned>(
    rows: Vec<FieldMap>,
    validate: fn(&T) -> Result<(), ValidationError>,
) -> Result<Vec<T>, RecordError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let record: T = serde_json::from_value(Value::Object(row))
                .map_err(|e| RecordError::new(index, ValidationError::Malformed(e.to_string())))?;
            validate(&record).map_err(|source| RecordError::new(index, source))?;
            Ok(record)
        })
        .collect()
}
