//! In-memory port fakes shared by the app-layer tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use aggregator_domain::cycle::EndpointFailure;
use aggregator_domain::data_point::{DataPoint, DataQuery};
use aggregator_domain::endpoint::Endpoint;
use aggregator_domain::error::{ActionSinkFailure, AggregatorError, ConfigurationError};
use aggregator_domain::firing::ActionFiring;
use aggregator_domain::id::{EndpointId, RuleId};
use aggregator_domain::reading::RawReading;
use aggregator_domain::rule::{ActionDescriptor, Rule};
use aggregator_domain::time::Timestamp;

use crate::ports::{
    ActionSink, AppendReport, DataPointStore, EndpointRepository, FiringContext, FiringStore,
    RuleRepository, SensorSource,
};

fn unavailable() -> AggregatorError {
    AggregatorError::StorageUnavailable("store offline".into())
}

// ── Endpoint repo ──────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryEndpointRepo {
    store: Mutex<Vec<Endpoint>>,
}

impl InMemoryEndpointRepo {
    pub fn with(endpoints: Vec<Endpoint>) -> Self {
        Self {
            store: Mutex::new(endpoints),
        }
    }
}

impl EndpointRepository for InMemoryEndpointRepo {
    fn create(
        &self,
        endpoint: Endpoint,
    ) -> impl Future<Output = Result<Endpoint, AggregatorError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = if store.iter().any(|e| e.url == endpoint.url) {
            Err(ConfigurationError::DuplicateEndpoint { url: endpoint.url }.into())
        } else {
            store.push(endpoint.clone());
            Ok(endpoint)
        };
        async { result }
    }

    fn get_by_id(
        &self,
        id: EndpointId,
    ) -> impl Future<Output = Result<Option<Endpoint>, AggregatorError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.iter().find(|e| e.id == id).cloned();
        async { Ok(result) }
    }

    fn find_by_url(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<Endpoint>, AggregatorError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.iter().find(|e| e.url == url).cloned();
        async { Ok(result) }
    }

    fn list(
        &self,
        enabled_only: bool,
    ) -> impl Future<Output = Result<Vec<Endpoint>, AggregatorError>> + Send {
        let store = self.store.lock().unwrap();
        let result: Vec<_> = store
            .iter()
            .filter(|e| !enabled_only || e.enabled)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn update(
        &self,
        endpoint: Endpoint,
    ) -> impl Future<Output = Result<Endpoint, AggregatorError>> + Send {
        let mut store = self.store.lock().unwrap();
        if let Some(slot) = store.iter_mut().find(|e| e.id == endpoint.id) {
            *slot = endpoint.clone();
        }
        async { Ok(endpoint) }
    }
}

// ── Rule repo ──────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRuleRepo {
    store: Mutex<Vec<Rule>>,
}

impl InMemoryRuleRepo {
    pub fn with(rules: Vec<Rule>) -> Self {
        Self {
            store: Mutex::new(rules),
        }
    }
}

impl RuleRepository for InMemoryRuleRepo {
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AggregatorError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = if store.iter().any(|r| r.name == rule.name) {
            Err(ConfigurationError::DuplicateRule { name: rule.name }.into())
        } else {
            store.push(rule.clone());
            Ok(rule)
        };
        async { result }
    }

    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AggregatorError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.iter().find(|r| r.id == id).cloned();
        async { Ok(result) }
    }

    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Rule>, AggregatorError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.iter().find(|r| r.name == name).cloned();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Rule>, AggregatorError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.clone();
        async { Ok(result) }
    }

    fn get_enabled(&self) -> impl Future<Output = Result<Vec<Rule>, AggregatorError>> + Send {
        let store = self.store.lock().unwrap();
        let result: Vec<_> = store.iter().filter(|r| r.enabled).cloned().collect();
        async { Ok(result) }
    }

    fn update(&self, rule: Rule) -> impl Future<Output = Result<Rule, AggregatorError>> + Send {
        let mut store = self.store.lock().unwrap();
        if let Some(slot) = store.iter_mut().find(|r| r.id == rule.id) {
            *slot = rule.clone();
        }
        async { Ok(rule) }
    }
}

// ── Data point + firing store ──────────────────────────────────

/// Store with injectable failures.
#[derive(Default)]
pub struct InMemoryStore {
    points: Mutex<Vec<DataPoint>>,
    firings: Mutex<Vec<ActionFiring>>,
    offline: AtomicBool,
    /// One-shot: allow this many inserts, then fail the rest of the batch.
    fail_after: Mutex<Option<usize>>,
    append_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn points(&self) -> Vec<DataPoint> {
        self.points.lock().unwrap().clone()
    }

    pub fn firings(&self) -> Vec<ActionFiring> {
        self.firings.lock().unwrap().clone()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_after_inserts(&self, inserts: usize) {
        *self.fail_after.lock().unwrap() = Some(inserts);
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn seed(&self, points: impl IntoIterator<Item = DataPoint>) {
        self.points.lock().unwrap().extend(points);
    }
}

impl DataPointStore for InMemoryStore {
    fn append(
        &self,
        batch: &[DataPoint],
    ) -> impl Future<Output = Result<AppendReport, AggregatorError>> + Send {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.offline.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            let mut points = self.points.lock().unwrap();
            let mut fail_after = self.fail_after.lock().unwrap();
            let mut report = AppendReport::default();
            let mut failed = false;
            for point in batch {
                if points.iter().any(|p| p.same_key(point)) {
                    report.skipped += 1;
                    continue;
                }
                if let Some(remaining) = fail_after.as_mut() {
                    if *remaining == 0 {
                        failed = true;
                        break;
                    }
                    *remaining -= 1;
                }
                points.push(point.clone());
                report.inserted += 1;
            }
            if failed {
                *fail_after = None;
                Err(unavailable())
            } else {
                Ok(report)
            }
        };
        async { result }
    }

    fn query(
        &self,
        query: &DataQuery,
    ) -> impl Future<Output = Result<Vec<DataPoint>, AggregatorError>> + Send {
        let result = if self.offline.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(query.run(self.points.lock().unwrap().iter()))
        };
        async { result }
    }

    fn latest_collected_at(
        &self,
        endpoint_id: EndpointId,
        sensor_name: Option<&str>,
    ) -> impl Future<Output = Result<Option<Timestamp>, AggregatorError>> + Send {
        let points = self.points.lock().unwrap();
        let result = points
            .iter()
            .filter(|p| p.endpoint_id == endpoint_id)
            .filter(|p| sensor_name.is_none_or(|name| p.sensor_name == name))
            .map(|p| p.collected_at)
            .max();
        async move { Ok(result) }
    }

    fn endpoint_ids(&self) -> impl Future<Output = Result<Vec<EndpointId>, AggregatorError>> + Send {
        let points = self.points.lock().unwrap();
        let mut ids: Vec<EndpointId> = Vec::new();
        for point in points.iter() {
            if !ids.contains(&point.endpoint_id) {
                ids.push(point.endpoint_id);
            }
        }
        async { Ok(ids) }
    }
}

impl FiringStore for InMemoryStore {
    fn record_firing(
        &self,
        firing: ActionFiring,
    ) -> impl Future<Output = Result<bool, AggregatorError>> + Send {
        let result = if self.offline.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            let mut firings = self.firings.lock().unwrap();
            if firings.contains(&firing) {
                Ok(false)
            } else {
                firings.push(firing);
                Ok(true)
            }
        };
        async { result }
    }

    fn last_firing(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Option<Timestamp>, AggregatorError>> + Send {
        let result = if self.offline.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(self
                .firings
                .lock()
                .unwrap()
                .iter()
                .filter(|f| f.rule_id == rule_id)
                .map(|f| f.fired_at)
                .max())
        };
        async { result }
    }
}

// ── Sensor source ──────────────────────────────────────────────

#[derive(Clone)]
pub enum Behaviour {
    Respond(Vec<RawReading>),
    Fail(EndpointFailure),
    /// Never answers; only the timeout or shutdown ends the fetch.
    Hang,
}

/// Source answering per endpoint URL.
#[derive(Default)]
pub struct FakeSource {
    behaviours: Mutex<HashMap<String, Behaviour>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn on(self, url: &str, behaviour: Behaviour) -> Self {
        self.behaviours
            .lock()
            .unwrap()
            .insert(url.to_string(), behaviour);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SensorSource for FakeSource {
    fn fetch(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Vec<RawReading>, EndpointFailure>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behaviour = self
            .behaviours
            .lock()
            .unwrap()
            .get(&endpoint.url)
            .cloned()
            .unwrap_or(Behaviour::Respond(Vec::new()));
        async move {
            match behaviour {
                Behaviour::Respond(readings) => Ok(readings),
                Behaviour::Fail(failure) => Err(failure),
                Behaviour::Hang => std::future::pending().await,
            }
        }
    }
}

// ── Action sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    dispatched: Mutex<Vec<FiringContext>>,
    failing: AtomicBool,
    failing_rules: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn dispatched(&self) -> Vec<FiringContext> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Reject every firing of the named rule.
    pub fn fail_rule(&self, rule_name: &str) {
        self.failing_rules
            .lock()
            .unwrap()
            .push(rule_name.to_string());
    }
}

impl ActionSink for RecordingSink {
    fn dispatch(
        &self,
        _action: &ActionDescriptor,
        context: &FiringContext,
    ) -> impl Future<Output = Result<(), ActionSinkFailure>> + Send {
        let rejected = self.failing.load(Ordering::SeqCst)
            || self
                .failing_rules
                .lock()
                .unwrap()
                .contains(&context.rule_name);
        let result = if rejected {
            Err(ActionSinkFailure::Rejected { status: 503 })
        } else {
            self.dispatched.lock().unwrap().push(context.clone());
            Ok(())
        };
        async { result }
    }
}
