//! In-process store implementing both repository traits.
//!
//! Backs the command-line tool and the test-suite. It records how large the
//! queries it receives are, so batching limits can be asserted on.

use std::cell::Cell;
use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::collision::OverlapPredicate;
use crate::model::{Calendar, CalendarId, Occurrence, OccurrenceId, Series, SeriesId};
use crate::repository::{OccurrenceRepository, RepoResult, RepositoryError, SeriesRepository};

/// Counters describing the traffic a [`MemoryStore`] has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub reads: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    /// Largest `starts` slice seen by an existence query.
    pub max_starts_per_query: usize,
    /// Largest number of clauses seen in an overlap query.
    pub max_clauses_per_query: usize,
}

#[derive(Debug, Clone)]
pub struct MemoryStore<S = (), E = ()> {
    calendars: BTreeMap<CalendarId, Calendar>,
    series: BTreeMap<SeriesId, Series<S>>,
    occurrences: BTreeMap<OccurrenceId, Occurrence<E>>,
    next_id: u64,
    stats: Cell<QueryStats>,
    inserts_before_failure: Option<usize>,
}

impl<S, E> Default for MemoryStore<S, E> {
    fn default() -> Self {
        Self {
            calendars: BTreeMap::new(),
            series: BTreeMap::new(),
            occurrences: BTreeMap::new(),
            next_id: 1,
            stats: Cell::new(QueryStats::default()),
            inserts_before_failure: None,
        }
    }
}

impl<S: Clone, E: Clone> MemoryStore<S, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously dumped records, keeping their ids.
    ///
    /// # Errors
    /// Returns `RepositoryError::Constraint` if a series or occurrence has no
    /// id, or an occurrence has no series or one missing from `series`.
    pub fn restore(
        calendars: Vec<Calendar>,
        series: Vec<Series<S>>,
        occurrences: Vec<Occurrence<E>>,
    ) -> RepoResult<Self> {
        let mut store = Self::new();
        for calendar in calendars {
            store.next_id = store.next_id.max(calendar.id.0 + 1);
            store.calendars.insert(calendar.id, calendar);
        }
        for s in series {
            let id = s
                .id
                .ok_or_else(|| RepositoryError::Constraint("stored series without id".into()))?;
            store.next_id = store.next_id.max(id.0 + 1);
            store.series.insert(id, s);
        }
        for o in occurrences {
            let id = o.id.ok_or_else(|| {
                RepositoryError::Constraint("stored occurrence without id".into())
            })?;
            let Some(series) = o.series else {
                return Err(RepositoryError::Constraint(format!(
                    "occurrence {id} has no series"
                )));
            };
            if !store.series.contains_key(&series) {
                return Err(RepositoryError::Constraint(format!(
                    "occurrence {id} belongs to unknown series {series}"
                )));
            }
            store.next_id = store.next_id.max(id.0 + 1);
            store.occurrences.insert(id, o);
        }
        Ok(store)
    }

    pub fn add_calendar(&mut self, sequential: bool) -> CalendarId {
        let id = CalendarId(self.allocate());
        self.calendars.insert(id, Calendar { id, sequential });
        id
    }

    pub fn calendars(&self) -> impl Iterator<Item = &Calendar> {
        self.calendars.values()
    }

    pub fn all_series(&self) -> impl Iterator<Item = &Series<S>> {
        self.series.values()
    }

    pub fn all_occurrences(&self) -> impl Iterator<Item = &Occurrence<E>> {
        self.occurrences.values()
    }

    /// Stored occurrences of `series`, ordered by start.
    pub fn occurrences_of(&self, series: SeriesId) -> Vec<Occurrence<E>> {
        let mut found: Vec<_> = self
            .occurrences
            .values()
            .filter(|o| o.series == Some(series))
            .cloned()
            .collect();
        found.sort_by_key(|o| o.start);
        found
    }

    pub fn stats(&self) -> QueryStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(QueryStats::default());
    }

    /// Make the insert after the next `count` successful ones fail.
    pub fn fail_after_inserts(&mut self, count: usize) {
        self.inserts_before_failure = Some(count);
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&self, update: impl FnOnce(&mut QueryStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }

    fn record_starts(&self, starts: &[DateTime<Utc>]) {
        self.record(|s| {
            s.reads += 1;
            s.max_starts_per_query = s.max_starts_per_query.max(starts.len());
        });
    }

    fn record_predicate(&self, predicate: &OverlapPredicate) {
        self.record(|s| {
            s.reads += 1;
            s.max_clauses_per_query = s.max_clauses_per_query.max(predicate.len());
        });
    }

    fn in_calendar(&self, calendar: CalendarId, occurrence: &Occurrence<E>) -> bool {
        occurrence
            .series
            .and_then(|id| self.series.get(&id))
            .is_some_and(|s| s.calendar == Some(calendar))
    }

    fn of_series(series: SeriesId) -> impl Fn(&&Occurrence<E>) -> bool {
        move |o: &&Occurrence<E>| o.series == Some(series)
    }
}

/// Whether `instant` falls in `[s, s + granularity)` for some `s` in `starts`.
fn in_any_slot(
    instant: DateTime<Utc>,
    starts: &[DateTime<Utc>],
    granularity: TimeDelta,
) -> bool {
    starts.iter().any(|s| {
        instant >= *s
            && s
                .checked_add_signed(granularity)
                .map_or(true, |slot_end| instant < slot_end)
    })
}

impl<S: Clone, E: Clone> OccurrenceRepository for MemoryStore<S, E> {
    type Extra = E;

    fn count_by_original_start_in(
        &self,
        series: SeriesId,
        starts: &[DateTime<Utc>],
        granularity: TimeDelta,
    ) -> RepoResult<usize> {
        self.record_starts(starts);
        Ok(self
            .occurrences
            .values()
            .filter(Self::of_series(series))
            .filter(|o| in_any_slot(o.original_start, starts, granularity))
            .count())
    }

    fn find_by_start_range(
        &self,
        series: SeriesId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<Occurrence<E>>> {
        self.record(|s| s.reads += 1);
        let mut found: Vec<_> = self
            .occurrences
            .values()
            .filter(Self::of_series(series))
            .filter(|o| o.start >= start && o.start <= end)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.start);
        Ok(found)
    }

    fn find_by_original_start_in(
        &self,
        series: SeriesId,
        starts: &[DateTime<Utc>],
        granularity: TimeDelta,
    ) -> RepoResult<Vec<DateTime<Utc>>> {
        self.record_starts(starts);
        Ok(self
            .occurrences
            .values()
            .filter(Self::of_series(series))
            .map(|o| o.original_start)
            .filter(|s| in_any_slot(*s, starts, granularity))
            .collect())
    }

    fn insert(&mut self, mut occurrence: Occurrence<E>) -> RepoResult<Occurrence<E>> {
        if let Some(remaining) = self.inserts_before_failure {
            if remaining == 0 {
                self.inserts_before_failure = None;
                return Err(RepositoryError::Backend("injected insert failure".into()));
            }
            self.inserts_before_failure = Some(remaining - 1);
        }
        let Some(series) = occurrence.series else {
            return Err(RepositoryError::Constraint(
                "occurrence must belong to a series".into(),
            ));
        };
        if !self.series.contains_key(&series) {
            return Err(RepositoryError::NotFound(format!("series {series}")));
        }
        if occurrence.id.is_some() {
            return Err(RepositoryError::Constraint(
                "occurrence is already stored".into(),
            ));
        }

        let id = OccurrenceId(self.allocate());
        occurrence.id = Some(id);
        self.occurrences.insert(id, occurrence.clone());
        self.record(|s| s.inserts += 1);
        Ok(occurrence)
    }

    fn update(&mut self, occurrence: Occurrence<E>) -> RepoResult<Occurrence<E>> {
        let id = occurrence
            .id
            .ok_or_else(|| RepositoryError::Constraint("occurrence is not stored".into()))?;
        let stored = self
            .occurrences
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("occurrence {id}")))?;
        stored.start = occurrence.start;
        stored.end = occurrence.end;
        stored.extra = occurrence.extra;
        let updated = stored.clone();
        self.record(|s| s.updates += 1);
        Ok(updated)
    }

    fn delete_where_start_after(
        &mut self,
        series: SeriesId,
        instant: DateTime<Utc>,
    ) -> RepoResult<usize> {
        let before = self.occurrences.len();
        self.occurrences
            .retain(|_, o| o.series != Some(series) || o.start <= instant);
        let deleted = before - self.occurrences.len();
        self.record(|s| s.deletes += deleted);
        Ok(deleted)
    }

    fn exists_overlap(
        &self,
        calendar: CalendarId,
        predicate: &OverlapPredicate,
    ) -> RepoResult<bool> {
        self.record_predicate(predicate);
        Ok(self
            .occurrences
            .values()
            .any(|o| self.in_calendar(calendar, o) && predicate.matches(o)))
    }

    fn first_overlap(
        &self,
        calendar: CalendarId,
        predicate: &OverlapPredicate,
    ) -> RepoResult<Option<Occurrence<E>>> {
        self.record_predicate(predicate);
        Ok(self
            .occurrences
            .values()
            .filter(|o| self.in_calendar(calendar, o) && predicate.matches(o))
            .min_by_key(|o| (o.start, o.id))
            .cloned())
    }

    fn find_occurrence(&self, id: OccurrenceId) -> RepoResult<Option<Occurrence<E>>> {
        self.record(|s| s.reads += 1);
        Ok(self.occurrences.get(&id).cloned())
    }
}

impl<S: Clone, E: Clone> SeriesRepository for MemoryStore<S, E> {
    type SeriesExtra = S;

    fn insert_series(&mut self, mut series: Series<S>) -> RepoResult<Series<S>> {
        if series.id.is_some() {
            return Err(RepositoryError::Constraint("series is already stored".into()));
        }
        if let Some(calendar) = series.calendar {
            if !self.calendars.contains_key(&calendar) {
                return Err(RepositoryError::NotFound(format!("calendar {calendar}")));
            }
        }
        let id = SeriesId(self.allocate());
        series.id = Some(id);
        self.series.insert(id, series.clone());
        self.record(|s| s.inserts += 1);
        Ok(series)
    }

    fn update_series(&mut self, series: Series<S>) -> RepoResult<Series<S>> {
        let id = series
            .id
            .ok_or_else(|| RepositoryError::Constraint("series is not stored".into()))?;
        let stored = self
            .series
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("series {id}")))?;
        *stored = series.clone();
        self.record(|s| s.updates += 1);
        Ok(series)
    }

    fn find_series(&self, id: SeriesId) -> RepoResult<Option<Series<S>>> {
        self.record(|s| s.reads += 1);
        Ok(self.series.get(&id).cloned())
    }

    fn find_calendar(&self, id: CalendarId) -> RepoResult<Option<Calendar>> {
        Ok(self.calendars.get(&id).copied())
    }
}
