//! Named recurrence rules and the codec between a rule and its stored name.
//!
//! Storage only ever sees the name; the engine only ever sees the
//! [`RecurrenceRule`]. The empty name is reserved for one-time series.
//!
//! A catalog is built once by the application at startup and passed around by
//! reference.

use crate::error::{Result, TimetableError};
use crate::rule::{RecurrenceRule, RuleParams};

/// Stored name of the one-time choice.
pub const ONCE: &str = "";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleChoice {
    pub name: String,
    /// Display text. Not interpreted by the engine.
    pub label: String,
    /// `None` for the one-time choice.
    pub rule: Option<RecurrenceRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCatalog {
    choices: Vec<RuleChoice>,
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleCatalog {
    /// A catalog with only the one-time choice.
    pub fn once_only(label: impl Into<String>) -> Self {
        Self {
            choices: vec![RuleChoice {
                name: ONCE.to_string(),
                label: label.into(),
                rule: None,
            }],
        }
    }

    /// Once, hourly, daily, weekly, every two weeks, monthly and yearly.
    pub fn standard() -> Self {
        let presets = [
            ("HOURLY", "Hourly", RecurrenceRule::hourly()),
            ("DAILY", "Daily", RecurrenceRule::daily()),
            ("WEEKLY", "Weekly", RecurrenceRule::weekly()),
            (
                "EVERY_TWO_WEEKS",
                "Every two weeks",
                RecurrenceRule::every_two_weeks(),
            ),
            ("MONTHLY", "Monthly", RecurrenceRule::monthly()),
            ("YEARLY", "Yearly", RecurrenceRule::yearly()),
        ];
        let mut catalog = Self::once_only("Once");
        for (name, label, rule) in presets {
            catalog.choices.push(RuleChoice {
                name: name.to_string(),
                label: label.to_string(),
                rule: Some(rule),
            });
        }
        catalog
    }

    /// Add a named rule.
    ///
    /// # Errors
    /// Returns `TimetableError::DuplicateRule` if `name` is taken (including
    /// the reserved empty name).
    pub fn register(
        mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        rule: RecurrenceRule,
    ) -> Result<Self> {
        let name = name.into();
        if self.choices.iter().any(|c| c.name == name) {
            return Err(TimetableError::DuplicateRule(name));
        }
        self.choices.push(RuleChoice {
            name,
            label: label.into(),
            rule: Some(rule),
        });
        Ok(self)
    }

    /// Validate `params` and add them under `name`.
    ///
    /// # Errors
    /// Returns `TimetableError::InvalidRuleParameters` for bad parameters and
    /// `TimetableError::DuplicateRule` for a taken name.
    pub fn register_params(
        self,
        name: impl Into<String>,
        label: impl Into<String>,
        params: RuleParams,
    ) -> Result<Self> {
        let rule = RecurrenceRule::new(params)?;
        self.register(name, label, rule)
    }

    /// Stored name → rule. The empty name decodes to `None` (one-time).
    ///
    /// # Errors
    /// Returns `TimetableError::UnknownRule` for a name not in the catalog.
    pub fn decode(&self, stored: &str) -> Result<Option<RecurrenceRule>> {
        self.choices
            .iter()
            .find(|c| c.name == stored)
            .map(|c| c.rule.clone())
            .ok_or_else(|| TimetableError::UnknownRule(stored.to_string()))
    }

    /// Rule → stored name, matching rules structurally. `None` encodes to the
    /// empty name.
    ///
    /// # Errors
    /// Returns `TimetableError::UnregisteredRule` if no choice carries `rule`.
    pub fn encode(&self, rule: Option<&RecurrenceRule>) -> Result<&str> {
        self.choices
            .iter()
            .find(|c| c.rule.as_ref() == rule)
            .map(|c| c.name.as_str())
            .ok_or(TimetableError::UnregisteredRule)
    }

    pub fn choices(&self) -> &[RuleChoice] {
        &self.choices
    }

    /// Longest stored name, for sizing a storage column.
    pub fn max_name_len(&self) -> usize {
        self.choices.iter().map(|c| c.name.len()).max().unwrap_or(0)
    }
}
