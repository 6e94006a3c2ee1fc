//! Series, occurrences and calendars.
//!
//! Both records are generic over an `extra` payload so that an application can
//! attach its own fields (a title, a room, a required counter, ...) without the
//! engine knowing about them. The payload type is fixed at compile time and
//! bound to a store through the repository traits' associated types.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::RecurrenceRule;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identity of a persisted series.
    SeriesId
);
id_type!(
    /// Identity of a persisted occurrence.
    OccurrenceId
);
id_type!(
    /// Identity of a calendar.
    CalendarId
);

/// An owner grouping of series.
///
/// A `sequential` calendar forbids any two of its occurrences, across all of
/// its series, from overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: CalendarId,
    pub sequential: bool,
}

/// A recurring definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series<S = ()> {
    /// `None` until the series is persisted.
    pub id: Option<SeriesId>,
    pub calendar: Option<CalendarId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Ignored for one-time series.
    pub recurring_period_end: Option<DateTime<Utc>>,
    /// `None` means the series happens once, at `start`.
    pub rule: Option<RecurrenceRule>,
    #[serde(default)]
    pub extra: S,
}

impl Series<()> {
    /// A one-time series spanning `[start, end)`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: None,
            calendar: None,
            start,
            end,
            recurring_period_end: None,
            rule: None,
            extra: (),
        }
    }
}

impl<S> Series<S> {
    pub fn with_rule(mut self, rule: RecurrenceRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn with_recurring_period_end(mut self, end: DateTime<Utc>) -> Self {
        self.recurring_period_end = Some(end);
        self
    }

    pub fn in_calendar(mut self, calendar: CalendarId) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// Replace the extension payload, changing the series' payload type.
    pub fn with_extra<T>(self, extra: T) -> Series<T> {
        Series {
            id: self.id,
            calendar: self.calendar,
            start: self.start,
            end: self.end,
            recurring_period_end: self.recurring_period_end,
            rule: self.rule,
            extra,
        }
    }

    /// Length of every occurrence generated from this series.
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Last instant an occurrence of this series may start at.
    pub fn window_end(&self) -> DateTime<Utc> {
        self.recurring_period_end.unwrap_or(self.end)
    }

    pub fn is_recurring(&self) -> bool {
        self.rule.is_some()
    }
}

/// One concrete, independently editable instance of a series.
///
/// `original_start`/`original_end` record the slot the rule implied and never
/// change; `start`/`end` are the actual slot and may be moved freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence<E = ()> {
    pub id: Option<OccurrenceId>,
    /// `None` only for occurrences previewed from a series that is not stored yet.
    pub series: Option<SeriesId>,
    pub original_start: DateTime<Utc>,
    pub original_end: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub extra: E,
}

impl<E> Occurrence<E> {
    /// An unsaved occurrence sitting in its original slot.
    pub fn new(
        series: Option<SeriesId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        extra: E,
    ) -> Self {
        Self {
            id: None,
            series,
            original_start: start,
            original_end: end,
            start,
            end,
            extra,
        }
    }

    /// Move the actual slot, leaving the original one untouched.
    pub fn moved_to(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// True when the occurrence no longer sits in its rule-implied slot.
    pub fn is_moved(&self) -> bool {
        self.start != self.original_start || self.end != self.original_end
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}
