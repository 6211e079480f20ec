//! Field-level validation for scraped records.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("`{field}` must be between {min} and {max} characters long (got {len})")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
        len: usize,
    },

    #[error("`{field}` must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("`{field}` must not be negative (got {value})")]
    Negative { field: &'static str, value: i64 },

    #[error("awards ({awards}) cannot exceed nominations ({nominations})")]
    AwardsExceedNominations { awards: i32, nominations: i32 },

    #[error("malformed record: {0}")]
    Malformed(String),
}

/// A validation failure tied to its position inside a batch.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("record #{index} rejected: {source}")]
pub struct RecordError {
    pub index: usize,
    #[source]
    pub source: ValidationError,
}

impl RecordError {
    pub fn new(index: usize, source: ValidationError) -> Self {
        Self { index, source }
    }
}

pub(crate) fn check_len(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::Length { field, min, max, len });
    }
    Ok(())
}

pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    if !(min..=max).contains(&value) {
        return Err(ValidationError::OutOfRange { field, min, max, value });
    }
    Ok(())
}

pub(crate) fn check_non_negative(field: &'static str, value: i32) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field,
            value: value.into(),
        });
    }
    Ok(())
}
