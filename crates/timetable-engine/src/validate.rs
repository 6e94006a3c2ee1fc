//! Cross-field checks on series and occurrences.
//!
//! Validation collects every problem instead of stopping at the first one, so
//! a form can show them all at once. Messages are plain English; translating
//! them is up to the caller, keyed on [`ViolationKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};
use crate::model::{Occurrence, Series};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    StartAfterEnd,
    MissingRecurringPeriod,
    RecurringPeriodBeforeStart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub kind: ViolationKind,
    /// The value that broke the rule, when there is one.
    pub value: Option<DateTime<Utc>>,
    pub message: String,
}

impl FieldViolation {
    fn new(kind: ViolationKind, value: Option<DateTime<Utc>>, message: String) -> Self {
        Self {
            kind,
            value,
            message,
        }
    }
}

pub fn validate_series<S>(series: &Series<S>) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if series.start > series.end {
        violations.push(FieldViolation::new(
            ViolationKind::StartAfterEnd,
            Some(series.start),
            format!(
                "Start {} can't be later than end {}.",
                series.start, series.end
            ),
        ));
    }

    if series.rule.is_some() && series.recurring_period_end.is_none() {
        violations.push(FieldViolation::new(
            ViolationKind::MissingRecurringPeriod,
            None,
            "A recurring series needs an end of its recurring period.".to_string(),
        ));
    }

    if let Some(period_end) = series.recurring_period_end {
        if series.start > period_end {
            violations.push(FieldViolation::new(
                ViolationKind::RecurringPeriodBeforeStart,
                Some(period_end),
                format!(
                    "End of recurring period {period_end} can't be earlier than series start {}.",
                    series.start
                ),
            ));
        }
    }

    violations
}

pub fn validate_occurrence<E>(occurrence: &Occurrence<E>) -> Vec<FieldViolation> {
    if occurrence.start > occurrence.end {
        vec![FieldViolation::new(
            ViolationKind::StartAfterEnd,
            Some(occurrence.start),
            format!(
                "Start {} can't be later than end {}.",
                occurrence.start, occurrence.end
            ),
        )]
    } else {
        Vec::new()
    }
}

/// Turn a violation list into an error for callers that reject outright.
///
/// # Errors
/// Returns `TimetableError::FieldViolations` when `violations` is non-empty.
pub fn ensure_valid(violations: Vec<FieldViolation>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(TimetableError::FieldViolations(violations))
    }
}
