//! Firing store port — durable record of rule firings.

use std::future::Future;
use std::sync::Arc;

use aggregator_domain::error::AggregatorError;
use aggregator_domain::firing::ActionFiring;
use aggregator_domain::id::RuleId;
use aggregator_domain::time::Timestamp;

/// Persists [`ActionFiring`]s so cooldowns survive restarts.
pub trait FiringStore {
    /// Record a firing. Returns `false` when `(rule_id, fired_at)` was
    /// already recorded.
    fn record_firing(
        &self,
        firing: ActionFiring,
    ) -> impl Future<Output = Result<bool, AggregatorError>> + Send;

    /// The most recent firing of a rule.
    fn last_firing(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Option<Timestamp>, AggregatorError>> + Send;
}

impl<T: FiringStore + Send + Sync> FiringStore for Arc<T> {
    fn record_firing(
        &self,
        firing: ActionFiring,
    ) -> impl Future<Output = Result<bool, AggregatorError>> + Send {
        (**self).record_firing(firing)
    }

    fn last_firing(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Option<Timestamp>, AggregatorError>> + Send {
        (**self).last_firing(rule_id)
    }
}
