//! Error types for timetable-engine operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::collision::Conflict;
use crate::model::{CalendarId, SeriesId};
use crate::repository::RepositoryError;
use crate::validate::FieldViolation;

#[derive(Error, Debug)]
pub enum TimetableError {
    #[error("Invalid rule parameters: {0}")]
    InvalidRuleParameters(String),

    #[error("Invalid window: start {start} is after end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid series: {}", join_violations(.0))]
    FieldViolations(Vec<FieldViolation>),

    #[error("Time collision with occurrence {conflicting}")]
    TimeCollision { conflicting: Conflict },

    #[error("Unknown rule name: '{0}'")]
    UnknownRule(String),

    #[error("Rule name registered twice: '{0}'")]
    DuplicateRule(String),

    #[error("Rule is not registered in the catalog")]
    UnregisteredRule,

    #[error("Series has not been persisted yet")]
    UnpersistedSeries,

    #[error("Series not found: {0}")]
    SeriesNotFound(SeriesId),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(CalendarId),

    #[error("Expansion error: {0}")]
    Expansion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, TimetableError>;
