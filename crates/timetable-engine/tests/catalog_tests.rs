//! Tests for the rule catalog and its stored-name codec.

use chrono::Weekday;
use timetable_engine::catalog::ONCE;
use timetable_engine::{Frequency, RecurrenceRule, RuleCatalog, RuleParams, TimetableError};

#[test]
fn standard_catalog_lists_once_first() {
    let catalog = RuleCatalog::standard();
    let names: Vec<&str> = catalog.choices().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "",
            "HOURLY",
            "DAILY",
            "WEEKLY",
            "EVERY_TWO_WEEKS",
            "MONTHLY",
            "YEARLY"
        ]
    );
    assert_eq!(catalog, RuleCatalog::default());
}

#[test]
fn empty_name_decodes_to_one_time() {
    let catalog = RuleCatalog::standard();
    assert_eq!(catalog.decode(ONCE).unwrap(), None);
    assert_eq!(catalog.encode(None).unwrap(), ONCE);
}

#[test]
fn names_decode_to_their_rules() {
    let catalog = RuleCatalog::standard();
    assert_eq!(
        catalog.decode("EVERY_TWO_WEEKS").unwrap(),
        Some(RecurrenceRule::every_two_weeks())
    );
    assert_eq!(catalog.decode("HOURLY").unwrap(), Some(RecurrenceRule::hourly()));
}

#[test]
fn unknown_name_is_an_error() {
    let err = RuleCatalog::standard().decode("FORTNIGHTLY").unwrap_err();
    assert!(matches!(err, TimetableError::UnknownRule(ref name) if name == "FORTNIGHTLY"));
}

#[test]
fn encoding_matches_rules_structurally() {
    let catalog = RuleCatalog::standard();
    let rebuilt = RecurrenceRule::every(Frequency::Weekly, 2).unwrap();
    assert_eq!(catalog.encode(Some(&rebuilt)).unwrap(), "EVERY_TWO_WEEKS");
}

#[test]
fn unregistered_rule_cannot_be_encoded() {
    let rule = RecurrenceRule::every(Frequency::Daily, 3).unwrap();
    let err = RuleCatalog::standard().encode(Some(&rule)).unwrap_err();
    assert!(matches!(err, TimetableError::UnregisteredRule));
}

#[test]
fn once_only_catalog_knows_nothing_else() {
    let catalog = RuleCatalog::once_only("Single");
    assert_eq!(catalog.choices().len(), 1);
    assert_eq!(catalog.choices()[0].label, "Single");
    assert!(catalog.decode("DAILY").is_err());
    assert!(catalog.encode(Some(&RecurrenceRule::daily())).is_err());
}

#[test]
fn custom_rules_can_be_registered() {
    let catalog = RuleCatalog::standard()
        .register_params(
            "WORKDAYS",
            "Monday to Friday",
            RuleParams::new(Frequency::Weekly).on_weekdays(&[
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]),
        )
        .unwrap();

    let rule = catalog.decode("WORKDAYS").unwrap().unwrap();
    assert_eq!(catalog.encode(Some(&rule)).unwrap(), "WORKDAYS");
}

#[test]
fn taken_names_are_rejected() {
    let err = RuleCatalog::standard()
        .register("DAILY", "Again", RecurrenceRule::daily())
        .unwrap_err();
    assert!(matches!(err, TimetableError::DuplicateRule(_)));

    let err = RuleCatalog::standard()
        .register(ONCE, "Blank", RecurrenceRule::weekly())
        .unwrap_err();
    assert!(matches!(err, TimetableError::DuplicateRule(_)));
}

#[test]
fn invalid_params_are_rejected_on_registration() {
    let err = RuleCatalog::standard()
        .register_params("BAD", "Bad", RuleParams::new(Frequency::Daily).interval(0))
        .unwrap_err();
    assert!(matches!(err, TimetableError::InvalidRuleParameters(_)));
}

#[test]
fn longest_name_sizes_the_column() {
    assert_eq!(RuleCatalog::standard().max_name_len(), "EVERY_TWO_WEEKS".len());
    assert_eq!(RuleCatalog::once_only("Once").max_name_len(), 0);
}
