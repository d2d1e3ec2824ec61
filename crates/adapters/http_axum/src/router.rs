//! Axum router assembly.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use aggregator_app::ports::{DataPointStore, EndpointRepository, RuleRepository};
use aggregator_app::scheduler::Health;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Mounts the management API under `/api` next to `/health`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<ER, RR, DS>(state: AppState<ER, RR, DS>) -> Router
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check::<ER, RR, DS>))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Latest scheduler snapshot; `503` while a loop is failing against storage.
async fn health_check<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
) -> (StatusCode, Json<Health>)
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let health = state.health.borrow().clone();
    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}
