//! Rule service — use-cases for managing rules.

use aggregator_domain::error::{AggregatorError, ConfigurationError, NotFoundError};
use aggregator_domain::id::RuleId;
use aggregator_domain::rule::{Rule, RuleUpdate};

use crate::ports::RuleRepository;

/// Application service for rule CRUD operations.
pub struct RuleService<R> {
    repo: R,
}

impl<R: RuleRepository> RuleService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create a new rule after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Configuration`] for a malformed rule or a
    /// name already in use, or a storage error.
    #[tracing::instrument(skip(self, rule), fields(rule = %rule.name))]
    pub async fn create_rule(&self, rule: Rule) -> Result<Rule, AggregatorError> {
        rule.validate()?;
        if self.repo.find_by_name(&rule.name).await?.is_some() {
            return Err(ConfigurationError::DuplicateRule { name: rule.name }.into());
        }
        self.repo.create(rule).await
    }

    /// Look up a rule by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`] when no rule with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_rule(&self, id: RuleId) -> Result<Rule, AggregatorError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Rule",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all rules.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_rules(&self) -> Result<Vec<Rule>, AggregatorError> {
        self.repo.get_all().await
    }

    /// Apply a partial edit to a rule.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`], a configuration error for an
    /// invalid result or a name clash, or a storage error.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_rule(&self, id: RuleId, update: RuleUpdate) -> Result<Rule, AggregatorError> {
        let mut rule = self.get_rule(id).await?;
        if let Some(name) = update.name.as_deref() {
            if let Some(other) = self.repo.find_by_name(name).await? {
                if other.id != id {
                    return Err(ConfigurationError::DuplicateRule {
                        name: name.to_string(),
                    }
                    .into());
                }
            }
        }
        rule.apply(update)?;
        self.repo.update(rule).await
    }

    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`] or a storage error.
    pub async fn enable(&self, id: RuleId) -> Result<Rule, AggregatorError> {
        self.update_rule(
            id,
            RuleUpdate {
                enabled: Some(true),
                ..RuleUpdate::default()
            },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`] or a storage error.
    pub async fn disable(&self, id: RuleId) -> Result<Rule, AggregatorError> {
        self.update_rule(
            id,
            RuleUpdate {
                enabled: Some(false),
                ..RuleUpdate::default()
            },
        )
        .await
    }

    /// Create the rule, or replace the definition of the existing rule with
    /// the same name while keeping its id (so its firing history and
    /// cooldown carry over).
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed rule, or a storage
    /// error.
    #[tracing::instrument(skip(self, rule), fields(rule = %rule.name))]
    pub async fn upsert_by_name(&self, rule: Rule) -> Result<Rule, AggregatorError> {
        rule.validate()?;
        match self.repo.find_by_name(&rule.name).await? {
            Some(existing) => {
                let merged = Rule {
                    id: existing.id,
                    created_at: existing.created_at,
                    ..rule
                };
                if merged == existing {
                    return Ok(existing);
                }
                tracing::info!(rule_id = %merged.id, "rule definition updated");
                self.repo.update(merged).await
            }
            None => self.repo.create(rule).await,
        }
    }
}
