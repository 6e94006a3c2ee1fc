//! # timetable-engine
//!
//! Recurring series and their materialized occurrences.
//!
//! A series carries a recurrence rule; its occurrences are concrete,
//! individually editable instances stored by the application. The engine keeps
//! the two in step without ever overwriting an edited occurrence, and keeps
//! sequential calendars free of overlapping occurrences.
//!
//! ## Modules
//!
//! - [`rule`] — recurrence rules, expanded into start instants via `rrule`
//! - [`catalog`] — named rules and the rule ↔ stored-name codec
//! - [`model`] — series, occurrences, calendars
//! - [`repository`] — persistence traits the engine talks to
//! - [`memory`] — in-process store implementing the repository traits
//! - [`reconcile`] — create only the occurrences a rule implies but storage lacks
//! - [`validate`] — cross-field checks on series and occurrences
//! - [`collision`] — batched overlap detection inside sequential calendars
//! - [`lifecycle`] — propose, extend and edit series end to end
//! - [`snapshot`] — JSON dump/restore of a memory store
//! - [`config`] — engine tunables
//! - [`error`] — error types

pub mod catalog;
pub mod collision;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod model;
pub mod reconcile;
pub mod repository;
pub mod rule;
pub mod snapshot;
pub mod validate;

pub use catalog::RuleCatalog;
pub use collision::{CollisionDetector, Conflict};
pub use config::EngineConfig;
pub use error::TimetableError;
pub use lifecycle::Timetable;
pub use memory::MemoryStore;
pub use model::{Calendar, CalendarId, Occurrence, OccurrenceId, Series, SeriesId};
pub use reconcile::{Reconciler, Window};
pub use repository::{OccurrenceRepository, RepositoryError, SeriesRepository};
pub use rule::{Frequency, RecurrenceRule, RuleParams};
pub use validate::{validate_occurrence, validate_series, FieldViolation, ViolationKind};
