//! Scheduler — drives the collection and action loops.
//!
//! Both loops run on fixed intervals inside one task and stop when the
//! shutdown signal flips. A storage failure delays the failing loop with an
//! exponential backoff and marks the process unhealthy until the next
//! success. The [`Health`] snapshot is published on a `watch` channel.

use std::future::Future;
use std::time::Duration;

use aggregator_domain::cycle::CollectionCycle;
use aggregator_domain::error::AggregatorError;
use aggregator_domain::time::{self, Timestamp};
use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::time::MissedTickBehavior;

use crate::action_engine::{ActionEngine, TickSummary};
use crate::collector::Collector;
use crate::evaluator::PredicateEvaluator;
use crate::ports::{
    ActionSink, DataPointStore, EndpointRepository, FiringStore, RuleRepository, SensorSource,
};

/// One collection cycle, as seen by the scheduler.
pub trait CollectionJob {
    fn collect(
        &self,
        now: Timestamp,
        abandon: impl Future<Output = ()> + Send,
    ) -> impl Future<Output = Result<CollectionCycle, AggregatorError>> + Send;
}

/// One action tick, as seen by the scheduler.
pub trait EvaluationJob {
    fn evaluate(&self, now: Timestamp)
    -> impl Future<Output = Result<TickSummary, AggregatorError>> + Send;
}

impl<ER, S, DS> CollectionJob for Collector<ER, S, DS>
where
    ER: EndpointRepository + Sync,
    S: SensorSource,
    DS: DataPointStore + Sync,
{
    fn collect(
        &self,
        now: Timestamp,
        abandon: impl Future<Output = ()> + Send,
    ) -> impl Future<Output = Result<CollectionCycle, AggregatorError>> + Send {
        self.run_cycle_until(now, abandon)
    }
}

impl<RR, E, FS, K> EvaluationJob for ActionEngine<RR, E, FS, K>
where
    RR: RuleRepository + Sync,
    E: PredicateEvaluator + Sync,
    FS: FiringStore + Sync,
    K: ActionSink + Sync,
{
    fn evaluate(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<TickSummary, AggregatorError>> + Send {
        self.run_tick(now)
    }
}

impl<T: CollectionJob + Send + Sync> CollectionJob for std::sync::Arc<T> {
    fn collect(
        &self,
        now: Timestamp,
        abandon: impl Future<Output = ()> + Send,
    ) -> impl Future<Output = Result<CollectionCycle, AggregatorError>> + Send {
        (**self).collect(now, abandon)
    }
}

impl<T: EvaluationJob + Send + Sync> EvaluationJob for std::sync::Arc<T> {
    fn evaluate(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<TickSummary, AggregatorError>> + Send {
        (**self).evaluate(now)
    }
}

/// Timing of the two loops.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub collection_interval: Duration,
    pub action_interval: Duration,
    /// Cap on the delay after repeated storage failures.
    pub max_backoff: Duration,
    /// How long an in-flight cycle may keep fetching once shutdown begins.
    pub shutdown_grace: Duration,
    /// Run an action tick right after every successful collection cycle.
    pub evaluate_after_collection: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collection_interval: Duration::from_secs(60),
            action_interval: Duration::from_secs(60),
            max_backoff: Duration::from_secs(15 * 60),
            shutdown_grace: Duration::from_secs(5),
            evaluate_after_collection: false,
        }
    }
}

/// Condensed view of the last collection cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub cycle_id: String,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub succeeded: usize,
    pub failed: usize,
    pub persisted: usize,
    pub skipped: usize,
}

impl From<&CollectionCycle> for CycleSummary {
    fn from(cycle: &CollectionCycle) -> Self {
        Self {
            cycle_id: cycle.id.to_string(),
            started_at: cycle.started_at,
            finished_at: cycle.finished_at,
            succeeded: cycle.success_count(),
            failed: cycle.failure_count(),
            persisted: cycle.persisted,
            skipped: cycle.skipped,
        }
    }
}

/// Process health as seen by the management API.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Health {
    pub collection_failures: u32,
    pub action_failures: u32,
    pub last_error: Option<String>,
    pub last_cycle: Option<CycleSummary>,
    pub last_tick: Option<TickSummary>,
}

impl Health {
    /// Healthy while neither loop is in a storage-failure streak.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.collection_failures == 0 && self.action_failures == 0
    }
}

/// Delay before the next attempt after `failures` consecutive failures:
/// `interval * 2^failures`, capped at `max`.
#[must_use]
pub fn backoff_delay(interval: Duration, failures: u32, max: Duration) -> Duration {
    let factor = 1_u32 << failures.min(16);
    interval.saturating_mul(factor).min(max)
}

/// Owns the two periodic loops.
pub struct Scheduler<C, A> {
    collector: C,
    engine: A,
    config: SchedulerConfig,
    health: watch::Sender<Health>,
    collected: Notify,
}

impl<C, A> Scheduler<C, A>
where
    C: CollectionJob + Sync,
    A: EvaluationJob + Sync,
{
    pub fn new(collector: C, engine: A, config: SchedulerConfig) -> Self {
        let (health, _) = watch::channel(Health::default());
        Self {
            collector,
            engine,
            config,
            health,
            collected: Notify::new(),
        }
    }

    /// Subscribe to health updates.
    pub fn health(&self) -> watch::Receiver<Health> {
        self.health.subscribe()
    }

    /// Run both loops until `shutdown` becomes `true` (or its sender is
    /// dropped). An in-flight cycle gets the configured grace period, then
    /// its unfinished fetches are abandoned and the rest persisted.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        tracing::info!(
            collection_interval = ?self.config.collection_interval,
            action_interval = ?self.config.action_interval,
            "scheduler started"
        );
        tokio::join!(
            self.collection_loop(shutdown.clone()),
            self.action_loop(shutdown)
        );
        tracing::info!("scheduler stopped");
    }

    async fn collection_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.collection_interval;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0_u32;

        loop {
            tokio::select! {
                biased;
                () = stopped(&mut shutdown) => break,
                _ = interval.tick() => {}
            }

            let abandon = grace_after(shutdown.clone(), self.config.shutdown_grace);
            match self.collector.collect(time::now(), abandon).await {
                Ok(cycle) => {
                    failures = 0;
                    self.health.send_modify(|h| {
                        h.collection_failures = 0;
                        h.last_cycle = Some(CycleSummary::from(&cycle));
                    });
                    if self.config.evaluate_after_collection {
                        self.collected.notify_one();
                    }
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    self.record_failure(&err, |h| h.collection_failures = failures);
                    let delay = backoff_delay(period, failures, self.config.max_backoff);
                    tracing::error!(error = %err, failures, ?delay, "collection cycle failed");
                    if wait_or_stop(delay, &mut shutdown).await {
                        break;
                    }
                    interval.reset();
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }
    }

    async fn action_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.action_interval;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0_u32;

        loop {
            tokio::select! {
                biased;
                () = stopped(&mut shutdown) => break,
                _ = interval.tick() => {}
                () = self.collected.notified() => {}
            }

            match self.engine.evaluate(time::now()).await {
                Ok(summary) => {
                    failures = 0;
                    self.health.send_modify(|h| {
                        h.action_failures = 0;
                        h.last_tick = Some(summary);
                    });
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    self.record_failure(&err, |h| h.action_failures = failures);
                    let delay = backoff_delay(period, failures, self.config.max_backoff);
                    tracing::error!(error = %err, failures, ?delay, "action tick failed");
                    if wait_or_stop(delay, &mut shutdown).await {
                        break;
                    }
                    interval.reset();
                }
            }
        }
    }

    fn record_failure(&self, err: &AggregatorError, update: impl FnOnce(&mut Health)) {
        let message = error_chain(err);
        self.health.send_modify(|h| {
            update(h);
            h.last_error = Some(message);
        });
    }
}

fn error_chain(err: &AggregatorError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Resolves once shutdown has been requested or the sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // An `Err` means the sender was dropped, which also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Resolves `grace` after shutdown is requested.
async fn grace_after(mut shutdown: watch::Receiver<bool>, grace: Duration) {
    stopped(&mut shutdown).await;
    tracing::info!(?grace, "shutdown requested, waiting for in-flight fetches");
    tokio::time::sleep(grace).await;
}

/// Sleep for `delay`; returns `true` if shutdown was requested meanwhile.
async fn wait_or_stop(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        () = stopped(shutdown) => true,
        () = tokio::time::sleep(delay) => false,
    }
}
