//! Tests for series and occurrence field validation.

use chrono::{DateTime, Duration, TimeZone, Utc};
use timetable_engine::validate::ensure_valid;
use timetable_engine::{
    validate_occurrence, validate_series, Occurrence, RecurrenceRule, Series, SeriesId,
    TimetableError, ViolationKind,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn kinds<S>(series: &Series<S>) -> Vec<ViolationKind> {
    validate_series(series).into_iter().map(|v| v.kind).collect()
}

#[test]
fn valid_recurring_series_has_no_violations() {
    let series = Series::new(t0(), t0() + Duration::hours(1))
        .with_rule(RecurrenceRule::weekly())
        .with_recurring_period_end(t0() + Duration::weeks(10));
    assert!(validate_series(&series).is_empty());
}

#[test]
fn valid_one_time_series_needs_no_recurring_period() {
    let series = Series::new(t0(), t0() + Duration::hours(1));
    assert!(validate_series(&series).is_empty());
}

#[test]
fn zero_length_series_is_valid() {
    let series = Series::new(t0(), t0());
    assert!(validate_series(&series).is_empty());
}

#[test]
fn start_after_end_is_reported_with_the_offending_value() {
    let series = Series::new(t0() + Duration::hours(1), t0());
    let violations = validate_series(&series);

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::StartAfterEnd);
    assert_eq!(violations[0].value, Some(t0() + Duration::hours(1)));
}

#[test]
fn recurring_series_without_period_end_is_reported() {
    let series = Series::new(t0(), t0() + Duration::hours(1)).with_rule(RecurrenceRule::daily());
    assert_eq!(kinds(&series), vec![ViolationKind::MissingRecurringPeriod]);
}

#[test]
fn period_end_before_start_is_reported() {
    let series = Series::new(t0(), t0() + Duration::hours(1))
        .with_rule(RecurrenceRule::daily())
        .with_recurring_period_end(t0() - Duration::days(1));
    assert_eq!(kinds(&series), vec![ViolationKind::RecurringPeriodBeforeStart]);
}

#[test]
fn all_violations_are_collected_in_order() {
    let series = Series::new(t0() + Duration::days(3), t0())
        .with_rule(RecurrenceRule::daily())
        .with_recurring_period_end(t0());
    assert_eq!(
        kinds(&series),
        vec![
            ViolationKind::StartAfterEnd,
            ViolationKind::RecurringPeriodBeforeStart
        ]
    );

    let series = Series::new(t0() + Duration::days(3), t0()).with_rule(RecurrenceRule::daily());
    assert_eq!(
        kinds(&series),
        vec![
            ViolationKind::StartAfterEnd,
            ViolationKind::MissingRecurringPeriod
        ]
    );
}

#[test]
fn occurrence_with_start_after_end_is_reported() {
    let occurrence = Occurrence::new(Some(SeriesId(1)), t0(), t0() + Duration::hours(1), ())
        .moved_to(t0() + Duration::hours(2), t0() + Duration::hours(1));
    let violations = validate_occurrence(&occurrence);

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::StartAfterEnd);
    assert!(validate_occurrence(&occurrence.moved_to(t0(), t0())).is_empty());
}

#[test]
fn ensure_valid_turns_violations_into_an_error() {
    assert!(ensure_valid(Vec::new()).is_ok());

    let series = Series::new(t0() + Duration::hours(1), t0());
    let err = ensure_valid(validate_series(&series)).unwrap_err();
    assert!(matches!(err, TimetableError::FieldViolations(ref v) if v.len() == 1));
    assert!(err.to_string().contains("can't be later than end"));
}
