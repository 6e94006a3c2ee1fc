//! Recurrence rules -- converts a rule and a time window into concrete start instants.
//!
//! Wraps the `rrule` crate (v0.13). Parameters are checked when a
//! [`RecurrenceRule`] is constructed, so a rule value that exists is always
//! expandable; generation only fails when the configured instance cap is hit.

use chrono::{DateTime, Month, TimeDelta, Utc, Weekday};
use rrule::{NWeekday, RRule, RRuleSet, Tz, Unvalidated};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};

/// Upper bound on the number of instants a single expansion may produce.
pub const DEFAULT_MAX_INSTANCES: usize = 100_000;

/// Base frequency of a recurrence rule (RFC 5545 `FREQ`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl From<Frequency> for rrule::Frequency {
    fn from(freq: Frequency) -> Self {
        match freq {
            Frequency::Yearly => rrule::Frequency::Yearly,
            Frequency::Monthly => rrule::Frequency::Monthly,
            Frequency::Weekly => rrule::Frequency::Weekly,
            Frequency::Daily => rrule::Frequency::Daily,
            Frequency::Hourly => rrule::Frequency::Hourly,
            Frequency::Minutely => rrule::Frequency::Minutely,
            Frequency::Secondly => rrule::Frequency::Secondly,
        }
    }
}

fn default_interval() -> u16 {
    1
}

/// Raw, unvalidated parameters of a recurrence rule.
///
/// Turn them into a usable rule with [`RecurrenceRule::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleParams {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_weekday: Vec<Weekday>,
    /// Days of the month, `1..=31` or `-31..=-1` counting from the month's end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_month_day: Vec<i8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_month: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_hour: Vec<u8>,
}

impl RuleParams {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            by_weekday: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            by_hour: Vec::new(),
        }
    }

    pub fn interval(mut self, interval: u16) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_weekdays(mut self, days: &[Weekday]) -> Self {
        self.by_weekday = days.to_vec();
        self
    }

    pub fn on_month_days(mut self, days: &[i8]) -> Self {
        self.by_month_day = days.to_vec();
        self
    }

    pub fn in_months(mut self, months: &[u8]) -> Self {
        self.by_month = months.to_vec();
        self
    }

    pub fn at_hours(mut self, hours: &[u8]) -> Self {
        self.by_hour = hours.to_vec();
        self
    }

    fn check_ranges(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(invalid("interval must be at least 1"));
        }
        if let Some(day) = self
            .by_month_day
            .iter()
            .find(|d| **d == 0 || !(-31..=31).contains(*d))
        {
            return Err(invalid(format!("month day {day} is out of range")));
        }
        if let Some(month) = self.by_month.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(invalid(format!("month {month} is out of range")));
        }
        if let Some(hour) = self.by_hour.iter().find(|h| **h > 23) {
            return Err(invalid(format!("hour {hour} is out of range")));
        }
        Ok(())
    }

    fn to_rrule(&self) -> Result<RRule<Unvalidated>> {
        let mut rule = RRule::new(self.frequency.into()).interval(self.interval);
        if !self.by_weekday.is_empty() {
            let days = self.by_weekday.iter().map(|d| NWeekday::Every(*d)).collect();
            rule = rule.by_weekday(days);
        }
        if !self.by_month_day.is_empty() {
            rule = rule.by_month_day(self.by_month_day.clone());
        }
        if !self.by_month.is_empty() {
            let months = self
                .by_month
                .iter()
                .map(|m| {
                    Month::try_from(*m).map_err(|_| invalid(format!("month {m} is out of range")))
                })
                .collect::<Result<Vec<_>>>()?;
            rule = rule.by_month(&months);
        }
        if !self.by_hour.is_empty() {
            rule = rule.by_hour(self.by_hour.clone());
        }
        Ok(rule)
    }
}

fn invalid(message: impl Into<String>) -> TimetableError {
    TimetableError::InvalidRuleParameters(message.into())
}

/// A validated recurrence rule.
///
/// Equality is structural: two rules are equal when their parameters are.
/// Deserializing re-runs validation, so a stored rule with bad parameters is
/// rejected rather than producing a broken value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RuleParams", into = "RuleParams")]
pub struct RecurrenceRule {
    params: RuleParams,
}

impl RecurrenceRule {
    /// Validate `params` and build a rule from them.
    ///
    /// # Errors
    /// Returns `TimetableError::InvalidRuleParameters` if a parameter is out of
    /// range or the `rrule` crate rejects the combination.
    pub fn new(params: RuleParams) -> Result<Self> {
        params.check_ranges()?;
        let anchor = DateTime::<Utc>::UNIX_EPOCH.with_timezone(&Tz::UTC);
        params
            .to_rrule()?
            .validate(anchor)
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self { params })
    }

    /// A rule firing every `interval` units of `frequency`.
    pub fn every(frequency: Frequency, interval: u16) -> Result<Self> {
        Self::new(RuleParams::new(frequency).interval(interval))
    }

    fn preset(params: RuleParams) -> Self {
        Self { params }
    }

    pub fn hourly() -> Self {
        Self::preset(RuleParams::new(Frequency::Hourly))
    }

    pub fn daily() -> Self {
        Self::preset(RuleParams::new(Frequency::Daily))
    }

    pub fn weekly() -> Self {
        Self::preset(RuleParams::new(Frequency::Weekly))
    }

    pub fn every_two_weeks() -> Self {
        Self::preset(RuleParams::new(Frequency::Weekly).interval(2))
    }

    pub fn monthly() -> Self {
        Self::preset(RuleParams::new(Frequency::Monthly))
    }

    pub fn yearly() -> Self {
        Self::preset(RuleParams::new(Frequency::Yearly))
    }

    pub fn params(&self) -> &RuleParams {
        &self.params
    }

    pub fn frequency(&self) -> Frequency {
        self.params.frequency
    }

    pub fn interval(&self) -> u16 {
        self.params.interval
    }

    /// Expand the rule anchored at `window_start` up to `window_end`.
    ///
    /// Both bounds are inclusive. Returns an empty list when the window is
    /// inverted or no instant falls inside it.
    pub fn generate(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        self.generate_bounded(window_start, window_end, DEFAULT_MAX_INSTANCES)
    }

    /// Like [`generate`](Self::generate), but fails with
    /// `TimetableError::Expansion` once more than `max_instances` instants
    /// would be produced.
    pub fn generate_bounded(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        max_instances: usize,
    ) -> Result<Vec<DateTime<Utc>>> {
        if window_start > window_end {
            return Ok(Vec::new());
        }

        let dtstart = window_start.with_timezone(&Tz::UTC);
        let until = window_end.with_timezone(&Tz::UTC);
        let rrule_set: RRuleSet = self
            .params
            .to_rrule()?
            .until(until)
            .build(dtstart)
            .map_err(|e| TimetableError::Expansion(e.to_string()))?;

        let mut instants = Vec::new();
        for dt in &rrule_set {
            let instant = dt.with_timezone(&Utc);
            // UNTIL is inclusive in RFC 5545; guard anyway so the bound holds.
            if instant > window_end {
                break;
            }
            if instants.len() == max_instances {
                return Err(TimetableError::Expansion(format!(
                    "rule produced more than {max_instances} instances between {window_start} and {window_end}"
                )));
            }
            instants.push(instant);
        }

        Ok(instants)
    }
}

impl TryFrom<RuleParams> for RecurrenceRule {
    type Error = TimetableError;

    fn try_from(params: RuleParams) -> Result<Self> {
        Self::new(params)
    }
}

impl From<RecurrenceRule> for RuleParams {
    fn from(rule: RecurrenceRule) -> Self {
        rule.params
    }
}

/// Drop precision below `granularity` (e.g. sub-second noise).
///
/// Used on rule inputs and reconciliation keys alike, so that instants that
/// went through different representations still compare equal. Works on whole
/// seconds; a granularity under one second truncates to the second.
pub fn truncate(instant: DateTime<Utc>, granularity: TimeDelta) -> Result<DateTime<Utc>> {
    let step = granularity.num_seconds().max(1);
    let secs = instant.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(step), 0).ok_or_else(|| {
        TimetableError::Expansion(format!("cannot truncate {instant} to {step}s"))
    })
}
