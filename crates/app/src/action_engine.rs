//! Action engine — evaluates enabled rules on every tick and fires their
//! actions.
//!
//! Each rule runs its own state machine (see
//! [`RuleState`](aggregator_domain::rule::RuleState)). A firing is recorded
//! only after the sink accepted it, so a sink failure leaves the rule
//! eligible on the next tick. Rules are independent: one rule's sink failure
//! never affects another rule.

use std::collections::HashMap;

use aggregator_domain::error::AggregatorError;
use aggregator_domain::firing::ActionFiring;
use aggregator_domain::id::RuleId;
use aggregator_domain::rule::{Decision, Rule, RuleState, decide};
use aggregator_domain::time::Timestamp;
use futures::{StreamExt, stream};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::evaluator::PredicateEvaluator;
use crate::ports::{ActionSink, FiringContext, FiringStore, RuleRepository};

/// Tuning knobs for the action engine.
#[derive(Debug, Clone)]
pub struct ActionEngineConfig {
    /// Maximum number of rules evaluated concurrently.
    pub max_concurrent_rules: usize,
}

impl Default for ActionEngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_rules: 4,
        }
    }
}

/// What happened to one rule during a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    /// The predicate did not hold.
    Idle,
    /// The predicate held but the cooldown is still running.
    CoolingDown { until: Timestamp },
    /// The action was dispatched and the firing recorded.
    Fired { fired_at: Timestamp },
    /// The sink rejected the action; nothing was recorded.
    SinkFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleReport {
    pub rule_id: RuleId,
    pub rule_name: String,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
}

/// Summary of one action tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSummary {
    pub at: Timestamp,
    pub evaluated: usize,
    pub fired: usize,
    pub cooling_down: usize,
    pub idle: usize,
    pub sink_failures: usize,
    /// One report per enabled rule, in rule order.
    pub outcomes: Vec<RuleReport>,
}

impl TickSummary {
    fn from_reports(at: Timestamp, outcomes: Vec<RuleReport>) -> Self {
        let count = |f: fn(&RuleOutcome) -> bool| outcomes.iter().filter(|r| f(&r.outcome)).count();
        Self {
            at,
            evaluated: outcomes.len(),
            fired: count(|o| matches!(o, RuleOutcome::Fired { .. })),
            cooling_down: count(|o| matches!(o, RuleOutcome::CoolingDown { .. })),
            idle: count(|o| matches!(o, RuleOutcome::Idle)),
            sink_failures: count(|o| matches!(o, RuleOutcome::SinkFailed { .. })),
            outcomes,
        }
    }
}

/// Periodic rule evaluator.
pub struct ActionEngine<RR, E, FS, K> {
    rules: RR,
    evaluator: E,
    firings: FS,
    sink: K,
    config: ActionEngineConfig,
    states: RwLock<HashMap<RuleId, RuleState>>,
}

impl<RR, E, FS, K> ActionEngine<RR, E, FS, K>
where
    RR: RuleRepository + Sync,
    E: PredicateEvaluator + Sync,
    FS: FiringStore + Sync,
    K: ActionSink + Sync,
{
    pub fn new(rules: RR, evaluator: E, firings: FS, sink: K, config: ActionEngineConfig) -> Self {
        Self {
            rules,
            evaluator,
            firings,
            sink,
            config,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Current state of a rule; rules never evaluated are idle.
    pub async fn state(&self, rule_id: RuleId) -> RuleState {
        self.states
            .read()
            .await
            .get(&rule_id)
            .copied()
            .unwrap_or_default()
    }

    /// Evaluate every enabled rule once.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::StorageUnavailable`] if rules, data or
    /// firings cannot be read or written. Rules evaluated before the failure
    /// keep their effects.
    #[tracing::instrument(skip(self))]
    pub async fn run_tick(&self, now: Timestamp) -> Result<TickSummary, AggregatorError> {
        let rules = self.rules.get_enabled().await?;

        let results: Vec<Result<RuleReport, AggregatorError>> = stream::iter(rules)
            .map(|rule| async move { self.run_rule(&rule, now).await })
            .buffered(self.config.max_concurrent_rules.max(1))
            .collect()
            .await;
        let outcomes = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        let summary = TickSummary::from_reports(now, outcomes);
        tracing::info!(
            evaluated = summary.evaluated,
            fired = summary.fired,
            cooling_down = summary.cooling_down,
            idle = summary.idle,
            sink_failures = summary.sink_failures,
            "action tick completed"
        );
        Ok(summary)
    }

    async fn run_rule(&self, rule: &Rule, now: Timestamp) -> Result<RuleReport, AggregatorError> {
        self.set_state(rule.id, self.state(rule.id).await.begin()).await;
        let result = self.evaluate_and_fire(rule, now).await;
        let next = match &result {
            Ok(RuleOutcome::CoolingDown { until }) => RuleState::CoolingDown { until: *until },
            Ok(RuleOutcome::Fired { fired_at }) => {
                RuleState::settle(Decision::Fire, Some(*fired_at), rule.cooldown)
            }
            Ok(RuleOutcome::Idle | RuleOutcome::SinkFailed { .. }) | Err(_) => RuleState::Idle,
        };
        self.set_state(rule.id, next).await;

        Ok(RuleReport {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            outcome: result?,
        })
    }

    async fn evaluate_and_fire(
        &self,
        rule: &Rule,
        now: Timestamp,
    ) -> Result<RuleOutcome, AggregatorError> {
        let evaluation = self.evaluator.evaluate(&rule.predicate, now).await?;
        let last_firing = if evaluation.matched {
            self.firings.last_firing(rule.id).await?
        } else {
            None
        };
        match decide(evaluation.matched, last_firing, rule.cooldown, now) {
            Decision::Skip => return Ok(RuleOutcome::Idle),
            Decision::Suppress { until } => {
                tracing::debug!(rule = %rule.name, %until, "rule cooling down");
                return Ok(RuleOutcome::CoolingDown { until });
            }
            Decision::Fire => {}
        }

        let context = FiringContext {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            fired_at: now,
            matches: evaluation.matches,
        };
        if let Err(err) = self.sink.dispatch(&rule.action, &context).await {
            tracing::warn!(
                rule = %rule.name,
                action = rule.action.kind(),
                error = %err,
                "action sink failed"
            );
            return Ok(RuleOutcome::SinkFailed {
                error: err.to_string(),
            });
        }

        let recorded = self
            .firings
            .record_firing(ActionFiring::new(rule.id, now))
            .await?;
        tracing::info!(
            rule = %rule.name,
            rule_id = %rule.id,
            action = rule.action.kind(),
            duplicate = !recorded,
            "rule fired"
        );
        Ok(RuleOutcome::Fired { fired_at: now })
    }

    async fn set_state(&self, rule_id: RuleId, state: RuleState) {
        self.states.write().await.insert(rule_id, state);
    }
}
