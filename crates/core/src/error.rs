use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("'{description}' is missing schedule field {field}")]
    MissingScheduleField {
        field: &'static str,
        description: String,
    },
    #[error("Day of month out of range: {0}")]
    InvalidDayOfMonth(u32),
    #[error("Weekday out of range: {0}")]
    InvalidWeekday(u32),
    #[error("Month out of range: {0}")]
    InvalidMonth(u32),
    #[error("More than one snapshot effective on {0}")]
    DuplicateSnapshotDate(NaiveDate),
}
