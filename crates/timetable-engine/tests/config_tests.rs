//! Tests for loading and validating the engine configuration.

use std::fs;
use std::path::PathBuf;

use timetable_engine::{EngineConfig, TimetableError};

/// Write `contents` to a uniquely named TOML file in the temp directory.
fn toml_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "timetable-config-{}-{name}.toml",
        std::process::id()
    ));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.max_batch_size, 500);
    assert_eq!(config.granularity_secs, 1);
    assert_eq!(config.overlap_flush_every(), 100);
    assert!(config.validate().is_ok());
}

#[test]
fn load_without_file_uses_defaults() {
    let config = EngineConfig::load(None).unwrap();
    assert_eq!(config.max_batch_size, 500);
    assert_eq!(config.granularity_secs, 1);
}

#[test]
fn load_reads_toml_file() {
    let path = toml_file("reads", "max_batch_size = 50\ngranularity_secs = 60\n");
    let config = EngineConfig::load(Some(&path)).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(config.max_batch_size, 50);
    assert_eq!(config.granularity_secs, 60);
    assert_eq!(config.overlap_flush_every(), 10);
}

#[test]
fn partial_file_keeps_other_defaults() {
    let path = toml_file("partial", "max_batch_size = 7\n");
    let config = EngineConfig::load(Some(&path)).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(config.max_batch_size, 7);
    assert_eq!(config.granularity_secs, 1);
    assert_eq!(config.overlap_flush_every(), 1);
}

#[test]
fn missing_file_is_an_error() {
    let path = std::env::temp_dir().join("timetable-config-does-not-exist.toml");
    let err = EngineConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, TimetableError::Config(_)));
}

#[test]
fn invalid_values_in_file_are_rejected() {
    let path = toml_file("zero", "max_batch_size = 0\n");
    let err = EngineConfig::load(Some(&path)).unwrap_err();
    fs::remove_file(&path).unwrap();
    assert!(matches!(err, TimetableError::Config(ref msg) if msg.contains("max_batch_size")));
}

#[test]
fn environment_overrides_defaults() {
    // Only this test touches max_instances, so it can own the variable.
    std::env::set_var("TIMETABLE_MAX_INSTANCES", "1234");
    let loaded = EngineConfig::load(None);
    std::env::remove_var("TIMETABLE_MAX_INSTANCES");

    assert_eq!(loaded.unwrap().max_instances, 1234);
}

#[test]
fn validate_rejects_degenerate_values() {
    for config in [
        EngineConfig::default().with_max_batch_size(0),
        EngineConfig::default().with_granularity_secs(0),
        EngineConfig::default().with_granularity_secs(-5),
        EngineConfig::default().with_max_instances(0),
    ] {
        assert!(
            matches!(config.validate(), Err(TimetableError::Config(_))),
            "{config:?} should be rejected"
        );
    }
}

#[test]
fn flush_cadence_never_drops_to_zero() {
    assert_eq!(
        EngineConfig::default()
            .with_max_batch_size(4)
            .overlap_flush_every(),
        1
    );
    assert_eq!(
        EngineConfig::default()
            .with_max_batch_size(10_000)
            .overlap_flush_every(),
        2000
    );
}
