//! Persistence boundary.
//!
//! The engine never talks to storage directly: everything it reads or writes
//! goes through these traits. Each call is a point where an implementation may
//! block on I/O; the engine never retries, so any error here aborts the
//! current operation and is handed back to the caller unchanged.

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::collision::OverlapPredicate;
use crate::model::{Calendar, CalendarId, Occurrence, OccurrenceId, Series, SeriesId};

/// Failures reported by a storage backend.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

/// Storage of occurrences.
///
/// Callers keep `starts` slices within the configured batch size, so an
/// implementation can bind them straight into a single query.
///
/// The `starts` handed to the original-start lookups are already truncated to
/// `granularity`, while stored values may still carry finer precision. A
/// stored `original_start` matches a start `s` when it lies in
/// `[s, s + granularity)`.
pub trait OccurrenceRepository {
    /// Extension payload carried by every stored occurrence.
    type Extra: Clone;

    /// Number of occurrences of `series` whose `original_start` matches one of
    /// `starts`.
    fn count_by_original_start_in(
        &self,
        series: SeriesId,
        starts: &[DateTime<Utc>],
        granularity: TimeDelta,
    ) -> RepoResult<usize>;

    /// Occurrences of `series` whose actual `start` lies in `[start, end]`,
    /// ordered by start.
    ///
    /// Both bounds are inclusive, unlike a half-open `[start, end)` range.
    /// Rule generation includes `end` itself, so an occurrence starting exactly
    /// at the window end has to be listed too; a half-open range would drop it
    /// and make a repeated call report it as missing.
    fn find_by_start_range(
        &self,
        series: SeriesId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<Occurrence<Self::Extra>>>;

    /// Stored `original_start` values of `series` matching one of `starts`,
    /// as stored (not truncated).
    fn find_by_original_start_in(
        &self,
        series: SeriesId,
        starts: &[DateTime<Utc>],
        granularity: TimeDelta,
    ) -> RepoResult<Vec<DateTime<Utc>>>;

    /// Store a new occurrence and return it with its identity assigned.
    fn insert(&mut self, occurrence: Occurrence<Self::Extra>)
        -> RepoResult<Occurrence<Self::Extra>>;

    /// Overwrite the actual slot and payload of a stored occurrence.
    ///
    /// `original_start`/`original_end` are immutable and must be kept.
    fn update(&mut self, occurrence: Occurrence<Self::Extra>)
        -> RepoResult<Occurrence<Self::Extra>>;

    /// Delete occurrences of `series` starting strictly after `instant`.
    fn delete_where_start_after(
        &mut self,
        series: SeriesId,
        instant: DateTime<Utc>,
    ) -> RepoResult<usize>;

    /// Whether any occurrence in `calendar` matches `predicate`.
    fn exists_overlap(
        &self,
        calendar: CalendarId,
        predicate: &OverlapPredicate,
    ) -> RepoResult<bool>;

    /// The earliest-starting occurrence in `calendar` matching `predicate`.
    fn first_overlap(
        &self,
        calendar: CalendarId,
        predicate: &OverlapPredicate,
    ) -> RepoResult<Option<Occurrence<Self::Extra>>>;

    /// Load one occurrence by identity.
    fn find_occurrence(&self, id: OccurrenceId) -> RepoResult<Option<Occurrence<Self::Extra>>>;
}

/// Storage of series and the calendars that own them.
pub trait SeriesRepository {
    /// Extension payload carried by every stored series.
    type SeriesExtra: Clone;

    fn insert_series(
        &mut self,
        series: Series<Self::SeriesExtra>,
    ) -> RepoResult<Series<Self::SeriesExtra>>;

    fn update_series(
        &mut self,
        series: Series<Self::SeriesExtra>,
    ) -> RepoResult<Series<Self::SeriesExtra>>;

    fn find_series(&self, id: SeriesId) -> RepoResult<Option<Series<Self::SeriesExtra>>>;

    fn find_calendar(&self, id: CalendarId) -> RepoResult<Option<Calendar>>;
}
