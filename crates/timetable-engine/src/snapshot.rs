//! JSON snapshot of a [`MemoryStore`].
//!
//! Rules are written as catalog names, not as parameters, so a snapshot only
//! stays readable with a catalog that knows every name in it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::RuleCatalog;
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::model::{Calendar, CalendarId, Occurrence, Series, SeriesId};

/// A series as stored: its rule is a catalog name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSeries {
    pub id: SeriesId,
    #[serde(default)]
    pub calendar: Option<CalendarId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub recurring_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rule: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub calendars: Vec<Calendar>,
    #[serde(default)]
    pub series: Vec<StoredSeries>,
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Dump `store`, encoding each rule through `catalog`.
    ///
    /// # Errors
    /// Returns `TimetableError::UnregisteredRule` if a series carries a rule
    /// the catalog has no name for.
    pub fn capture(store: &MemoryStore, catalog: &RuleCatalog) -> Result<Self> {
        let series = store
            .all_series()
            .filter_map(|s| s.id.map(|id| (id, s)))
            .map(|(id, s)| {
                Ok(StoredSeries {
                    id,
                    calendar: s.calendar,
                    start: s.start,
                    end: s.end,
                    recurring_period_end: s.recurring_period_end,
                    rule: catalog.encode(s.rule.as_ref())?.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            calendars: store.calendars().copied().collect(),
            series,
            occurrences: store.all_occurrences().cloned().collect(),
        })
    }

    /// Rebuild a store, decoding each rule name through `catalog`.
    ///
    /// # Errors
    /// Returns `TimetableError::UnknownRule` for a name the catalog lacks, and
    /// repository constraint errors for records without ids.
    pub fn restore(self, catalog: &RuleCatalog) -> Result<MemoryStore> {
        let series = self
            .series
            .into_iter()
            .map(|stored| {
                Ok(Series {
                    id: Some(stored.id),
                    calendar: stored.calendar,
                    start: stored.start,
                    end: stored.end,
                    recurring_period_end: stored.recurring_period_end,
                    rule: catalog.decode(&stored.rule)?,
                    extra: (),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MemoryStore::restore(self.calendars, series, self.occurrences)?)
    }
}
