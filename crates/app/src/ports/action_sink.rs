//! Action sink port — performing a rule's side effect.

use std::future::Future;
use std::sync::Arc;

use aggregator_domain::data_point::DataPoint;
use aggregator_domain::error::ActionSinkFailure;
use aggregator_domain::id::RuleId;
use aggregator_domain::rule::ActionDescriptor;
use aggregator_domain::time::Timestamp;
use serde::Serialize;

/// The data a firing exposes to payload templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiringContext {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub fired_at: Timestamp,
    /// The aggregated points that satisfied the predicate.
    pub matches: Vec<DataPoint>,
}

/// Delivers a firing to the outside world (webhook, log, …).
///
/// Delivery is at-least-once: a firing whose record could not be written
/// after a successful dispatch will be dispatched again.
pub trait ActionSink {
    fn dispatch(
        &self,
        action: &ActionDescriptor,
        context: &FiringContext,
    ) -> impl Future<Output = Result<(), ActionSinkFailure>> + Send;
}

impl<T: ActionSink + Send + Sync> ActionSink for Arc<T> {
    fn dispatch(
        &self,
        action: &ActionDescriptor,
        context: &FiringContext,
    ) -> impl Future<Output = Result<(), ActionSinkFailure>> + Send {
        (**self).dispatch(action, context)
    }
}
