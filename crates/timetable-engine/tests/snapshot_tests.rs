//! Tests for dumping and restoring a memory store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use timetable_engine::snapshot::Snapshot;
use timetable_engine::{
    EngineConfig, Frequency, MemoryStore, OccurrenceRepository, RecurrenceRule, RepositoryError,
    RuleCatalog, Series, SeriesRepository, Timetable, TimetableError,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn populated() -> MemoryStore {
    let config = EngineConfig::default();
    let mut store: MemoryStore = MemoryStore::new();
    let calendar = store.add_calendar(true);
    let timetable = Timetable::new(&config);
    let (_, occurrences) = timetable
        .propose(
            &mut store,
            Series::new(t0(), t0() + Duration::hours(1))
                .with_rule(RecurrenceRule::weekly())
                .with_recurring_period_end(t0() + Duration::weeks(3))
                .in_calendar(calendar),
            &(),
        )
        .unwrap();
    timetable
        .propose(
            &mut store,
            Series::new(t0() + Duration::hours(2), t0() + Duration::hours(3)).in_calendar(calendar),
            &(),
        )
        .unwrap();
    let moved = occurrences[1]
        .clone()
        .moved_to(occurrences[1].start + Duration::hours(4), occurrences[1].end + Duration::hours(4));
    timetable.edit_occurrence(&mut store, moved).unwrap();
    store
}

#[test]
fn capture_writes_rules_as_catalog_names() {
    let snapshot = Snapshot::capture(&populated(), &RuleCatalog::standard()).unwrap();

    let rules: Vec<&str> = snapshot.series.iter().map(|s| s.rule.as_str()).collect();
    assert_eq!(rules, vec!["WEEKLY", ""]);
    assert_eq!(snapshot.calendars.len(), 1);
    assert_eq!(snapshot.occurrences.len(), 5);

    let json = snapshot.to_json().unwrap();
    assert!(json.contains("\"rule\": \"WEEKLY\""));
}

#[test]
fn restored_store_keeps_ids_and_edits() {
    let catalog = RuleCatalog::standard();
    let original = populated();
    let json = Snapshot::capture(&original, &catalog)
        .unwrap()
        .to_json()
        .unwrap();

    let restored = Snapshot::from_json(&json)
        .unwrap()
        .restore(&catalog)
        .unwrap();

    let before: Vec<_> = original.all_occurrences().cloned().collect();
    let after: Vec<_> = restored.all_occurrences().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(after.iter().filter(|o| o.is_moved()).count(), 1);

    let series: Vec<_> = restored.all_series().cloned().collect();
    assert_eq!(series[0].rule, Some(RecurrenceRule::weekly()));
    assert_eq!(series[1].rule, None);
}

#[test]
fn restored_store_allocates_fresh_ids() {
    let catalog = RuleCatalog::standard();
    let original = populated();
    let highest = original
        .all_occurrences()
        .filter_map(|o| o.id)
        .max()
        .unwrap();

    let mut restored = Snapshot::capture(&original, &catalog)
        .unwrap()
        .restore(&catalog)
        .unwrap();
    let series = restored
        .insert_series(Series::new(t0() + Duration::days(1), t0() + Duration::days(2)))
        .unwrap();
    let occurrence = restored
        .insert(timetable_engine::Occurrence::new(
            series.id,
            series.start,
            series.end,
            (),
        ))
        .unwrap();

    assert!(series.id.unwrap().0 > highest.0);
    assert!(occurrence.id.unwrap() > highest);
}

#[test]
fn rule_missing_from_catalog_cannot_be_captured() {
    let mut store: MemoryStore = MemoryStore::new();
    store
        .insert_series(
            Series::new(t0(), t0() + Duration::hours(1))
                .with_rule(RecurrenceRule::every(Frequency::Daily, 3).unwrap())
                .with_recurring_period_end(t0() + Duration::weeks(1)),
        )
        .unwrap();

    let err = Snapshot::capture(&store, &RuleCatalog::standard()).unwrap_err();
    assert!(matches!(err, TimetableError::UnregisteredRule));
}

#[test]
fn unknown_rule_name_fails_restore() {
    let json = r#"{
        "series": [
            {"id": 1, "start": "2026-03-02T09:00:00Z", "end": "2026-03-02T10:00:00Z",
             "recurring_period_end": "2026-04-02T09:00:00Z", "rule": "FORTNIGHTLY"}
        ]
    }"#;

    let err = Snapshot::from_json(json)
        .unwrap()
        .restore(&RuleCatalog::standard())
        .unwrap_err();
    assert!(matches!(err, TimetableError::UnknownRule(_)));
}

#[test]
fn occurrence_of_missing_series_fails_restore() {
    let json = r#"{
        "series": [
            {"id": 1, "start": "2026-03-02T09:00:00Z", "end": "2026-03-02T10:00:00Z"}
        ],
        "occurrences": [
            {"id": 2, "series": 7,
             "original_start": "2026-03-02T09:00:00Z", "original_end": "2026-03-02T10:00:00Z",
             "start": "2026-03-02T09:00:00Z", "end": "2026-03-02T10:00:00Z"}
        ]
    }"#;

    let err = Snapshot::from_json(json)
        .unwrap()
        .restore(&RuleCatalog::standard())
        .unwrap_err();
    assert!(matches!(
        err,
        TimetableError::Repository(RepositoryError::Constraint(_))
    ));
}

#[test]
fn malformed_json_is_a_snapshot_error() {
    let err = Snapshot::from_json("{ not json").unwrap_err();
    assert!(matches!(err, TimetableError::Snapshot(_)));
}
