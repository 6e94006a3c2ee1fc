//! Detect time collisions inside sequential calendars.
//!
//! An occurrence occupies the half-open interval `[start, end)`: adjacent
//! occurrences (one ends exactly when the next starts) do not collide.
//!
//! Overlap checks are expressed as an [`OverlapPredicate`] handed to the
//! repository, so the filtering happens where the data lives. Long series are
//! checked in batches to keep each predicate within the backend's parameter
//! limits.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{Result, TimetableError};
use crate::model::{CalendarId, Occurrence, OccurrenceId, Series, SeriesId};
use crate::reconcile::{Reconciler, Window};
use crate::repository::OccurrenceRepository;

/// The stored occurrence a candidate collided with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub occurrence: Option<OccurrenceId>,
    pub series: Option<SeriesId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Conflict {
    pub fn from_occurrence<E>(occurrence: &Occurrence<E>) -> Self {
        Self {
            occurrence: occurrence.id,
            series: occurrence.series,
            start: occurrence.start,
            end: occurrence.end,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.occurrence {
            write!(f, "{id} ")?;
        }
        write!(f, "[{}, {})", self.start, self.end)?;
        if let Some(series) = self.series {
            write!(f, " of series {series}")?;
        }
        Ok(())
    }
}

/// "Some occurrence other than `exclude` overlaps `[start, end)`."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapClause {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub exclude: Option<OccurrenceId>,
}

impl OverlapClause {
    pub fn for_occurrence<E>(occurrence: &Occurrence<E>) -> Self {
        Self {
            start: occurrence.start,
            end: occurrence.end,
            exclude: occurrence.id,
        }
    }

    pub fn matches<E>(&self, other: &Occurrence<E>) -> bool {
        if other.id.is_some() && other.id == self.exclude {
            return false;
        }
        starts_within(self.start, self.end, other.start)
            || spans_start(self.start, other.start, other.end)
    }
}

/// `other` starts inside `[start, end)`.
fn starts_within(start: DateTime<Utc>, end: DateTime<Utc>, other_start: DateTime<Utc>) -> bool {
    other_start >= start && other_start < end
}

/// `other` is already running when `start` comes around.
fn spans_start(start: DateTime<Utc>, other_start: DateTime<Utc>, other_end: DateTime<Utc>) -> bool {
    other_start <= start && other_end > start
}

/// A disjunction of [`OverlapClause`]s. The empty predicate matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapPredicate {
    clauses: Vec<OverlapClause>,
}

impl OverlapPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(clause: OverlapClause) -> Self {
        Self {
            clauses: vec![clause],
        }
    }

    pub fn push(&mut self, clause: OverlapClause) {
        self.clauses.push(clause);
    }

    pub fn clauses(&self) -> &[OverlapClause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches<E>(&self, other: &Occurrence<E>) -> bool {
        self.clauses.iter().any(|clause| clause.matches(other))
    }
}

/// Batched overlap checks against a repository.
pub struct CollisionDetector<'a> {
    config: &'a EngineConfig,
}

impl<'a> CollisionDetector<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Find the first stored occurrence in `calendar` that any occurrence of
    /// `series` would overlap.
    ///
    /// The candidate occurrences are the series' full window as previewed by
    /// the [`Reconciler`]: stored ones (which never collide with themselves)
    /// plus the ones still to be created.
    #[tracing::instrument(skip(self, repo, series), fields(series = ?series.id))]
    pub fn find_series_collision<R, S>(
        &self,
        repo: &R,
        calendar: CalendarId,
        series: &Series<S>,
    ) -> Result<Option<Occurrence<R::Extra>>>
    where
        R: OccurrenceRepository,
        R::Extra: Default,
    {
        let candidates = Reconciler::new(self.config).preview(
            repo,
            series,
            Window::full(),
            &R::Extra::default(),
        )?;

        let flush_every = self.config.overlap_flush_every();
        let mut predicate = OverlapPredicate::new();
        for (index, occurrence) in candidates.iter().enumerate() {
            predicate.push(OverlapClause::for_occurrence(occurrence));
            if predicate.len() == flush_every {
                tracing::trace!(
                    checked = index + 1,
                    total = candidates.len(),
                    "Flushing overlap batch"
                );
                if let Some(found) = self.flush(repo, calendar, &predicate)? {
                    return Ok(Some(found));
                }
                predicate = OverlapPredicate::new();
            }
        }

        let found = self.flush(repo, calendar, &predicate)?;
        tracing::debug!(
            candidates = candidates.len(),
            collided = found.is_some(),
            "Series collision check finished"
        );
        Ok(found)
    }

    /// Like [`find_series_collision`](Self::find_series_collision), but a
    /// collision is an error.
    ///
    /// # Errors
    /// Returns `TimetableError::TimeCollision` naming the earliest-starting
    /// colliding occurrence.
    pub fn check_series_collision<R, S>(
        &self,
        repo: &R,
        calendar: CalendarId,
        series: &Series<S>,
    ) -> Result<()>
    where
        R: OccurrenceRepository,
        R::Extra: Default,
    {
        match self.find_series_collision(repo, calendar, series)? {
            Some(found) => Err(collision(&found)),
            None => Ok(()),
        }
    }

    /// Find an occurrence in `calendar`, other than `occurrence` itself, that
    /// overlaps it.
    pub fn find_occurrence_collision<R, E>(
        &self,
        repo: &R,
        calendar: CalendarId,
        occurrence: &Occurrence<E>,
    ) -> Result<Option<Occurrence<R::Extra>>>
    where
        R: OccurrenceRepository,
    {
        let predicate = OverlapPredicate::single(OverlapClause::for_occurrence(occurrence));
        self.flush(repo, calendar, &predicate)
    }

    /// # Errors
    /// Returns `TimetableError::TimeCollision` if another occurrence in
    /// `calendar` overlaps `occurrence`.
    pub fn check_occurrence_collision<R, E>(
        &self,
        repo: &R,
        calendar: CalendarId,
        occurrence: &Occurrence<E>,
    ) -> Result<()>
    where
        R: OccurrenceRepository,
    {
        match self.find_occurrence_collision(repo, calendar, occurrence)? {
            Some(found) => Err(collision(&found)),
            None => Ok(()),
        }
    }

    fn flush<R: OccurrenceRepository>(
        &self,
        repo: &R,
        calendar: CalendarId,
        predicate: &OverlapPredicate,
    ) -> Result<Option<Occurrence<R::Extra>>> {
        if predicate.is_empty() || !repo.exists_overlap(calendar, predicate)? {
            return Ok(None);
        }
        Ok(repo.first_overlap(calendar, predicate)?)
    }
}

fn collision<E>(found: &Occurrence<E>) -> TimetableError {
    let conflicting = Conflict::from_occurrence(found);
    tracing::debug!(%conflicting, "Time collision detected");
    TimetableError::TimeCollision { conflicting }
}
