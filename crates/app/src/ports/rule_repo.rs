//! Rule repository port — persistence for rules.

use std::future::Future;
use std::sync::Arc;

use aggregator_domain::error::AggregatorError;
use aggregator_domain::id::RuleId;
use aggregator_domain::rule::Rule;

/// Repository for persisting and querying [`Rule`]s.
pub trait RuleRepository {
    /// Store a new rule. A name already in use is rejected with
    /// `ConfigurationError::DuplicateRule`.
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AggregatorError>> + Send;

    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AggregatorError>> + Send;

    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Rule>, AggregatorError>> + Send;

    /// All rules, oldest first.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Rule>, AggregatorError>> + Send;

    /// Enabled rules only, oldest first.
    fn get_enabled(&self) -> impl Future<Output = Result<Vec<Rule>, AggregatorError>> + Send;

    fn update(&self, rule: Rule) -> impl Future<Output = Result<Rule, AggregatorError>> + Send;
}

impl<T: RuleRepository + Send + Sync> RuleRepository for Arc<T> {
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AggregatorError>> + Send {
        (**self).create(rule)
    }

    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AggregatorError>> + Send {
        (**self).get_by_id(id)
    }

    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Rule>, AggregatorError>> + Send {
        (**self).find_by_name(name)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Rule>, AggregatorError>> + Send {
        (**self).get_all()
    }

    fn get_enabled(&self) -> impl Future<Output = Result<Vec<Rule>, AggregatorError>> + Send {
        (**self).get_enabled()
    }

    fn update(&self, rule: Rule) -> impl Future<Output = Result<Rule, AggregatorError>> + Send {
        (**self).update(rule)
    }
}
