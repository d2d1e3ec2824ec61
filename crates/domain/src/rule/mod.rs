//! Rule — a named predicate over recent data, paired with an action and a
//! cooldown.
//!
//! On every action tick the engine evaluates each enabled rule's
//! [`Predicate`]. When it holds and the rule has not fired within its
//! cooldown, the [`ActionDescriptor`] is dispatched to the matching sink and
//! the firing is recorded.

mod action;
mod predicate;
mod state;

pub use action::{ActionDescriptor, LogLevel, WebhookMethod};
pub use predicate::{Comparison, Predicate};
pub use state::{Decision, RuleState, cooldown_until, decide, is_cooldown_elapsed};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AggregatorError, ConfigurationError};
use crate::id::RuleId;
use crate::time::{Timestamp, now};

/// Cooldown applied when a rule does not set one.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// A user-defined reaction to accumulated sensor data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub enabled: bool,
    pub predicate: Predicate,
    pub action: ActionDescriptor,
    /// Minimum time between two firings.
    #[serde(with = "crate::time::seconds")]
    pub cooldown: Duration,
    pub created_at: Timestamp,
}

impl Rule {
    /// Create a builder for constructing a [`Rule`].
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Configuration`] when the name is empty, the
    /// predicate is malformed or the action target is invalid.
    pub fn validate(&self) -> Result<(), AggregatorError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName.into());
        }
        self.predicate.validate()?;
        self.action.validate()?;
        Ok(())
    }

    /// Apply an operator edit, then re-validate. The rule is unchanged on
    /// error.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Rule::validate`].
    pub fn apply(&mut self, update: RuleUpdate) -> Result<(), AggregatorError> {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(predicate) = update.predicate {
            next.predicate = predicate;
        }
        if let Some(action) = update.action {
            next.action = action;
        }
        if let Some(cooldown) = update.cooldown {
            next.cooldown = cooldown;
        }
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Partial edit of a rule. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub predicate: Option<Predicate>,
    #[serde(default)]
    pub action: Option<ActionDescriptor>,
    #[serde(default, deserialize_with = "optional_seconds")]
    pub cooldown: Option<Duration>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

fn optional_seconds<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    Option::<f64>::deserialize(deserializer)?
        .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
        .transpose()
}

/// Step-by-step builder for [`Rule`].
#[derive(Debug, Default)]
pub struct RuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
    enabled: Option<bool>,
    predicate: Option<Predicate>,
    action: Option<ActionDescriptor>,
    cooldown: Option<Duration>,
    created_at: Option<Timestamp>,
}

impl RuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    #[must_use]
    pub fn action(mut self, action: ActionDescriptor) -> Self {
        self.action = Some(action);
        self
    }

    #[must_use]
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`Rule`].
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Configuration`] if the name, predicate or
    /// action is missing or invalid. A missing predicate is reported as an
    /// empty composite.
    pub fn build(self) -> Result<Rule, AggregatorError> {
        let predicate = self.predicate.unwrap_or(Predicate::All {
            predicates: Vec::new(),
        });
        let action = self.action.ok_or(ConfigurationError::MissingAction)?;
        let rule = Rule {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            predicate,
            action,
            cooldown: self.cooldown.unwrap_or(DEFAULT_COOLDOWN),
            created_at: self.created_at.unwrap_or_else(now),
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_point::Aggregation;

    fn hot() -> Predicate {
        Predicate::Threshold {
            sensor_name: "temperature".to_string(),
            endpoint_id: None,
            aggregation: Aggregation::Average,
            window: Duration::from_secs(900),
            comparison: Comparison::Above,
            threshold: 25.0,
        }
    }

    fn log_action() -> ActionDescriptor {
        ActionDescriptor::Log {
            level: LogLevel::Warn,
            template: "{{ rule.name }} fired".to_string(),
        }
    }

    fn valid_rule() -> Rule {
        Rule::builder()
            .name("too hot")
            .predicate(hot())
            .action(log_action())
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_enabled_rule_with_default_cooldown() {
        let rule = valid_rule();
        assert!(rule.enabled);
        assert_eq!(rule.cooldown, DEFAULT_COOLDOWN);
    }

    #[test]
    fn should_return_configuration_error_when_name_is_empty() {
        let result = Rule::builder().predicate(hot()).action(log_action()).build();
        assert!(matches!(
            result,
            Err(AggregatorError::Configuration(ConfigurationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_configuration_error_when_predicate_missing() {
        let result = Rule::builder().name("x").action(log_action()).build();
        assert!(matches!(
            result,
            Err(AggregatorError::Configuration(
                ConfigurationError::EmptyComposite
            ))
        ));
    }

    #[test]
    fn should_return_configuration_error_when_action_missing() {
        let result = Rule::builder().name("x").predicate(hot()).build();
        assert!(matches!(
            result,
            Err(AggregatorError::Configuration(
                ConfigurationError::MissingAction
            ))
        ));
    }

    #[test]
    fn should_return_configuration_error_when_template_is_malformed() {
        let result = Rule::builder()
            .name("broken")
            .predicate(hot())
            .action(ActionDescriptor::Log {
                level: LogLevel::Warn,
                template: "{{ rule.name ".to_string(),
            })
            .build();
        assert!(matches!(
            result,
            Err(AggregatorError::Configuration(
                ConfigurationError::InvalidTemplate { .. }
            ))
        ));
    }

    #[test]
    fn should_apply_update_and_keep_identity() {
        let mut rule = valid_rule();
        let id = rule.id;
        rule.apply(RuleUpdate {
            cooldown: Some(Duration::from_secs(60)),
            enabled: Some(false),
            ..RuleUpdate::default()
        })
        .unwrap();
        assert_eq!(rule.id, id);
        assert_eq!(rule.cooldown, Duration::from_secs(60));
        assert!(!rule.enabled);
    }

    #[test]
    fn should_reject_update_with_malformed_predicate() {
        let mut rule = valid_rule();
        let before = rule.clone();
        let result = rule.apply(RuleUpdate {
            predicate: Some(Predicate::Any { predicates: vec![] }),
            ..RuleUpdate::default()
        });
        assert!(result.is_err());
        assert_eq!(rule, before);
    }

    #[test]
    fn should_roundtrip_rule_through_serde_json() {
        let rule = valid_rule();
        let json = serde_json::to_string(&rule).unwrap();
        let parsed: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rule);
    }
}
