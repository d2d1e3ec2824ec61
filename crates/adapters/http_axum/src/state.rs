//! Shared application state for axum handlers.

use std::sync::Arc;

use aggregator_app::ports::{DataPointStore, EndpointRepository, RuleRepository};
use aggregator_app::scheduler::Health;
use aggregator_app::services::{EndpointRegistry, RuleService};
use tokio::sync::watch;

/// Application state shared across all axum handlers.
///
/// Generic over the endpoint repository, rule repository and time-series
/// store to avoid dynamic dispatch. `Clone` is implemented manually so the
/// underlying types themselves do not need to be `Clone`.
pub struct AppState<ER, RR, DS> {
    pub endpoints: Arc<EndpointRegistry<ER>>,
    pub rules: Arc<RuleService<RR>>,
    /// Read-only access for `/api/data`.
    pub store: Arc<DS>,
    /// Latest scheduler health snapshot.
    pub health: watch::Receiver<Health>,
}

impl<ER, RR, DS> Clone for AppState<ER, RR, DS> {
    fn clone(&self) -> Self {
        Self {
            endpoints: Arc::clone(&self.endpoints),
            rules: Arc::clone(&self.rules),
            store: Arc::clone(&self.store),
            health: self.health.clone(),
        }
    }
}

impl<ER, RR, DS> AppState<ER, RR, DS>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    /// Create a new application state from pre-wrapped `Arc` services.
    pub fn new(
        endpoints: Arc<EndpointRegistry<ER>>,
        rules: Arc<RuleService<RR>>,
        store: Arc<DS>,
        health: watch::Receiver<Health>,
    ) -> Self {
        Self {
            endpoints,
            rules,
            store,
            health,
        }
    }
}
