//! Reconcile a series' rule against its stored occurrences.
//!
//! The rule says which slots *should* exist; the repository says which ones
//! *do*. Reconciliation only ever adds the missing ones: stored occurrences
//! (possibly moved, renamed or otherwise edited) are returned as they are and
//! are never overwritten, deleted or duplicated. Running it twice is a no-op
//! the second time.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::EngineConfig;
use crate::error::{Result, TimetableError};
use crate::model::{Occurrence, Series, SeriesId};
use crate::repository::OccurrenceRepository;
use crate::rule::truncate;

/// Time window to reconcile. Unset bounds default to the series' own window:
/// its `start` and its `recurring_period_end` (or `end` when one-time).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn starting(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn ending(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }
}

/// Outcome of comparing a rule with storage, before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan<E> {
    /// Stored occurrences whose actual start falls in the window.
    pub existing: Vec<Occurrence<E>>,
    /// Occurrences the rule implies but storage lacks, in rule order.
    pub missing: Vec<Occurrence<E>>,
    /// Number of rule-implied starts in the window.
    pub candidate_count: usize,
    /// Number of those starts already stored.
    pub existing_count: usize,
}

impl<E> ReconcilePlan<E> {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Existing and missing occurrences together, ordered by start.
    pub fn into_sorted(self) -> Vec<Occurrence<E>> {
        let mut all = self.existing;
        all.extend(self.missing);
        sort_by_start(&mut all);
        all
    }
}

fn sort_by_start<E>(occurrences: &mut [Occurrence<E>]) {
    occurrences.sort_by_key(|o| (o.start, o.original_start));
}

/// Resolved, truncated window plus the rule-implied starts inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub starts: Vec<DateTime<Utc>>,
}

pub struct Reconciler<'a> {
    config: &'a EngineConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Rule-implied starts of `series` within `window`.
    ///
    /// Expansion is anchored on the series start, not the window start, so a
    /// window opening mid-series still lands on the series' own slots.
    ///
    /// # Errors
    /// Returns `TimetableError::InvalidWindow` if the resolved window start is
    /// after its end.
    pub fn candidates<S>(&self, series: &Series<S>, window: Window) -> Result<Candidates> {
        let granularity = self.config.granularity();
        let window_start = truncate(window.start.unwrap_or(series.start), granularity)?;
        let window_end = truncate(window.end.unwrap_or_else(|| series.window_end()), granularity)?;
        if window_start > window_end {
            return Err(TimetableError::InvalidWindow {
                start: window_start,
                end: window_end,
            });
        }

        let anchor = truncate(series.start, granularity)?;
        let starts = match &series.rule {
            Some(rule) => rule
                .generate_bounded(anchor, window_end, self.config.max_instances)?
                .into_iter()
                .map(|s| truncate(s, granularity))
                .filter(|s| s.as_ref().map_or(true, |s| *s >= window_start))
                .collect::<Result<Vec<_>>>()?,
            None if anchor >= window_start && anchor <= window_end => vec![anchor],
            None => Vec::new(),
        };

        Ok(Candidates {
            window_start,
            window_end,
            starts,
        })
    }

    /// Compare the rule with storage without writing anything.
    #[tracing::instrument(skip(self, repo, series, defaults), fields(series = ?series.id))]
    pub fn plan<R, S>(
        &self,
        repo: &R,
        series: &Series<S>,
        window: Window,
        defaults: &R::Extra,
    ) -> Result<ReconcilePlan<R::Extra>>
    where
        R: OccurrenceRepository,
    {
        let candidates = self.candidates(series, window)?;
        let duration = series.duration();

        let Some(series_id) = series.id else {
            // Nothing can be stored for a series that is not stored itself.
            let missing = build(None, &candidates.starts, duration, defaults);
            return Ok(ReconcilePlan {
                existing: Vec::new(),
                missing,
                candidate_count: candidates.starts.len(),
                existing_count: 0,
            });
        };

        let batch = self.config.batch_size();
        let granularity = self.config.granularity();
        let existing_count = candidates
            .starts
            .chunks(batch)
            .map(|chunk| repo.count_by_original_start_in(series_id, chunk, granularity))
            .sum::<std::result::Result<usize, _>>()?;

        let existing =
            repo.find_by_start_range(series_id, candidates.window_start, candidates.window_end)?;

        let missing = if existing_count == candidates.starts.len() {
            Vec::new()
        } else {
            let stored = self.stored_original_starts(repo, series_id, &candidates.starts)?;
            let gaps: Vec<DateTime<Utc>> = candidates
                .starts
                .iter()
                .copied()
                .filter(|s| !stored.contains(s))
                .collect();
            build(Some(series_id), &gaps, duration, defaults)
        };

        tracing::debug!(
            candidates = candidates.starts.len(),
            existing_count,
            in_window = existing.len(),
            missing = missing.len(),
            "Planned reconciliation"
        );

        Ok(ReconcilePlan {
            existing,
            missing,
            candidate_count: candidates.starts.len(),
            existing_count,
        })
    }

    /// Occurrences of `series` in `window`, stored or not, ordered by start.
    /// Nothing is written.
    pub fn preview<R, S>(
        &self,
        repo: &R,
        series: &Series<S>,
        window: Window,
        defaults: &R::Extra,
    ) -> Result<Vec<Occurrence<R::Extra>>>
    where
        R: OccurrenceRepository,
    {
        Ok(self.plan(repo, series, window, defaults)?.into_sorted())
    }

    /// Occurrences of `series` in `window`, ordered by start; with `commit`,
    /// missing ones are stored first.
    ///
    /// Missing occurrences are inserted one by one. If an insert fails, the
    /// ones before it stay stored and the error is returned; calling again
    /// picks up where it stopped.
    ///
    /// # Errors
    /// Returns `TimetableError::UnpersistedSeries` when committing for a series
    /// without an id, `TimetableError::InvalidWindow` for an inverted window,
    /// and repository errors as they come.
    pub fn reconcile<R, S>(
        &self,
        repo: &mut R,
        series: &Series<S>,
        window: Window,
        commit: bool,
        defaults: &R::Extra,
    ) -> Result<Vec<Occurrence<R::Extra>>>
    where
        R: OccurrenceRepository,
    {
        if commit && series.id.is_none() {
            return Err(TimetableError::UnpersistedSeries);
        }

        let plan = self.plan(repo, series, window, defaults)?;
        if !commit || plan.is_complete() {
            return Ok(plan.into_sorted());
        }

        let mut result = plan.existing;
        result.reserve(plan.missing.len());
        let inserted = plan.missing.len();
        for occurrence in plan.missing {
            result.push(repo.insert(occurrence)?);
        }
        tracing::debug!(series = ?series.id, inserted, "Committed missing occurrences");

        sort_by_start(&mut result);
        Ok(result)
    }

    fn stored_original_starts<R: OccurrenceRepository>(
        &self,
        repo: &R,
        series: SeriesId,
        starts: &[DateTime<Utc>],
    ) -> Result<HashSet<DateTime<Utc>>> {
        let granularity = self.config.granularity();
        let mut stored = HashSet::with_capacity(starts.len());
        for chunk in starts.chunks(self.config.batch_size()) {
            for start in repo.find_by_original_start_in(series, chunk, granularity)? {
                stored.insert(truncate(start, granularity)?);
            }
        }
        Ok(stored)
    }
}

fn build<E: Clone>(
    series: Option<SeriesId>,
    starts: &[DateTime<Utc>],
    duration: TimeDelta,
    defaults: &E,
) -> Vec<Occurrence<E>> {
    starts
        .iter()
        .map(|s| Occurrence::new(series, *s, *s + duration, defaults.clone()))
        .collect()
}
