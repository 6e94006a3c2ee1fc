//! Series lifecycle: propose, extend/shrink, edit single occurrences.
//!
//! ```text
//! Proposed -> Validated -> Persisted -> {Extended, OccurrenceEdited} -> Validated -> ...
//!                 \-> Rejected(FieldViolation | Collision)
//! ```
//!
//! Validation fails closed: any field violation, or any collision inside a
//! sequential calendar, rejects the change before it is written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collision::CollisionDetector;
use crate::config::EngineConfig;
use crate::error::{Result, TimetableError};
use crate::model::{CalendarId, Occurrence, Series, SeriesId};
use crate::reconcile::{Reconciler, Window};
use crate::repository::{OccurrenceRepository, RepositoryError, SeriesRepository};
use crate::validate::{ensure_valid, validate_occurrence, validate_series};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    FieldViolation,
    Collision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesState {
    Proposed,
    Validated,
    Persisted,
    Extended,
    OccurrenceEdited,
    Rejected(Rejection),
}

impl TimetableError {
    /// The rejection this error stands for, if it is one.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            TimetableError::FieldViolations(_) => Some(Rejection::FieldViolation),
            TimetableError::TimeCollision { .. } => Some(Rejection::Collision),
            _ => None,
        }
    }
}

fn transition(series: Option<SeriesId>, state: SeriesState) {
    tracing::debug!(?series, ?state, "Series state changed");
}

/// Pass `result` through, logging the rejected state if it is a rejection.
fn gate<T>(series: Option<SeriesId>, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        if let Some(rejection) = err.rejection() {
            transition(series, SeriesState::Rejected(rejection));
        }
    }
    result
}

pub struct Timetable<'a> {
    config: &'a EngineConfig,
}

impl<'a> Timetable<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Validate, collision-check, store and materialize a new series.
    ///
    /// Returns the stored series and all of its occurrences.
    ///
    /// # Errors
    /// `FieldViolations` or `TimeCollision` reject the series before anything
    /// is stored; `CalendarNotFound` if the series names an unknown calendar.
    #[tracing::instrument(skip_all)]
    pub fn propose<R>(
        &self,
        repo: &mut R,
        series: Series<R::SeriesExtra>,
        defaults: &R::Extra,
    ) -> Result<(Series<R::SeriesExtra>, Vec<Occurrence<R::Extra>>)>
    where
        R: OccurrenceRepository + SeriesRepository,
        R::Extra: Default,
    {
        transition(None, SeriesState::Proposed);
        gate(None, self.validate(&*repo, &series))?;
        transition(None, SeriesState::Validated);

        let series = repo.insert_series(series)?;
        transition(series.id, SeriesState::Persisted);

        let occurrences =
            Reconciler::new(self.config).reconcile(repo, &series, Window::full(), true, defaults)?;
        tracing::info!(
            series = ?series.id,
            occurrences = occurrences.len(),
            "Series created"
        );
        Ok((series, occurrences))
    }

    /// Move the end of a series' recurring period.
    ///
    /// Occurrences missing between `from` (normally "now") and `new_end` are
    /// created; stored occurrences starting after `new_end` are deleted.
    /// Returns the series' occurrences in `[from, new_end]`.
    ///
    /// # Errors
    /// `SeriesNotFound` for an unknown id; `FieldViolations` or
    /// `TimeCollision` reject the change before anything is written.
    #[tracing::instrument(skip(self, repo, defaults))]
    pub fn update_recurring_period<R>(
        &self,
        repo: &mut R,
        series_id: SeriesId,
        new_end: DateTime<Utc>,
        from: DateTime<Utc>,
        defaults: &R::Extra,
    ) -> Result<Vec<Occurrence<R::Extra>>>
    where
        R: OccurrenceRepository + SeriesRepository,
        R::Extra: Default,
    {
        let mut series = repo
            .find_series(series_id)?
            .ok_or(TimetableError::SeriesNotFound(series_id))?;
        series.recurring_period_end = Some(new_end);
        transition(Some(series_id), SeriesState::Extended);

        gate(Some(series_id), self.validate(&*repo, &series))?;
        transition(Some(series_id), SeriesState::Validated);

        let series = repo.update_series(series)?;
        transition(Some(series_id), SeriesState::Persisted);

        let window_start = from.max(series.start);
        let occurrences = if window_start <= new_end {
            Reconciler::new(self.config).reconcile(
                repo,
                &series,
                Window::new(window_start, new_end),
                true,
                defaults,
            )?
        } else {
            Vec::new()
        };
        let deleted = repo.delete_where_start_after(series_id, new_end)?;

        tracing::info!(
            occurrences = occurrences.len(),
            deleted,
            "Recurring period updated"
        );
        Ok(occurrences)
    }

    /// Store an edit of one occurrence's actual slot or payload.
    ///
    /// The original slot is kept whatever `occurrence` carries.
    ///
    /// # Errors
    /// `FieldViolations` or `TimeCollision` reject the edit; repository
    /// `NotFound` if the occurrence is not stored.
    #[tracing::instrument(skip_all, fields(occurrence = ?occurrence.id))]
    pub fn edit_occurrence<R>(
        &self,
        repo: &mut R,
        occurrence: Occurrence<R::Extra>,
    ) -> Result<Occurrence<R::Extra>>
    where
        R: OccurrenceRepository + SeriesRepository,
    {
        let stored = match occurrence.id {
            Some(id) => repo.find_occurrence(id)?,
            None => None,
        };
        let Some(stored) = stored else {
            return Err(RepositoryError::NotFound(format!(
                "occurrence {:?}",
                occurrence.id
            ))
            .into());
        };
        let series_id = stored.series;
        transition(series_id, SeriesState::OccurrenceEdited);

        let mut edited = occurrence;
        edited.series = stored.series;
        edited.original_start = stored.original_start;
        edited.original_end = stored.original_end;

        let checked = ensure_valid(validate_occurrence(&edited)).and_then(|()| {
            match self.sequential_calendar_of(&*repo, series_id)? {
                Some(calendar) => CollisionDetector::new(self.config)
                    .check_occurrence_collision(&*repo, calendar, &edited),
                None => Ok(()),
            }
        });
        gate(series_id, checked)?;
        transition(series_id, SeriesState::Validated);

        let updated = repo.update(edited)?;
        transition(series_id, SeriesState::Persisted);
        Ok(updated)
    }

    /// Field checks, then the collision check if the series lives in a
    /// sequential calendar.
    fn validate<R>(&self, repo: &R, series: &Series<R::SeriesExtra>) -> Result<()>
    where
        R: OccurrenceRepository + SeriesRepository,
        R::Extra: Default,
    {
        ensure_valid(validate_series(series))?;
        if let Some(calendar) = self.sequential_calendar(repo, series.calendar)? {
            CollisionDetector::new(self.config).check_series_collision(repo, calendar, series)?;
        }
        Ok(())
    }

    fn sequential_calendar<R: SeriesRepository>(
        &self,
        repo: &R,
        calendar: Option<CalendarId>,
    ) -> Result<Option<CalendarId>> {
        let Some(id) = calendar else {
            return Ok(None);
        };
        let calendar = repo
            .find_calendar(id)?
            .ok_or(TimetableError::CalendarNotFound(id))?;
        Ok(calendar.sequential.then_some(id))
    }

    fn sequential_calendar_of<R: SeriesRepository>(
        &self,
        repo: &R,
        series: Option<SeriesId>,
    ) -> Result<Option<CalendarId>> {
        let Some(series_id) = series else {
            return Ok(None);
        };
        let series = repo
            .find_series(series_id)?
            .ok_or(TimetableError::SeriesNotFound(series_id))?;
        self.sequential_calendar(repo, series.calendar)
    }
}
