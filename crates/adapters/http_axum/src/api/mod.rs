//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod data;
#[allow(clippy::missing_errors_doc)]
pub mod endpoints;
#[allow(clippy::missing_errors_doc)]
pub mod rules;

use std::str::FromStr;

use axum::Router;
use axum::routing::{get, post};

use aggregator_app::ports::{DataPointStore, EndpointRepository, RuleRepository};

use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<ER, RR, DS>() -> Router<AppState<ER, RR, DS>>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    Router::new()
        // Endpoints
        .route(
            "/endpoints",
            get(endpoints::list::<ER, RR, DS>).post(endpoints::create::<ER, RR, DS>),
        )
        .route(
            "/endpoints/{id}",
            get(endpoints::get::<ER, RR, DS>).put(endpoints::update::<ER, RR, DS>),
        )
        .route(
            "/endpoints/{id}/enable",
            post(endpoints::enable::<ER, RR, DS>),
        )
        .route(
            "/endpoints/{id}/disable",
            post(endpoints::disable::<ER, RR, DS>),
        )
        // Rules
        .route(
            "/rules",
            get(rules::list::<ER, RR, DS>).post(rules::create::<ER, RR, DS>),
        )
        .route(
            "/rules/{id}",
            get(rules::get::<ER, RR, DS>).put(rules::update::<ER, RR, DS>),
        )
        .route("/rules/{id}/enable", post(rules::enable::<ER, RR, DS>))
        .route("/rules/{id}/disable", post(rules::disable::<ER, RR, DS>))
        // Data
        .route("/data", get(data::query::<ER, RR, DS>))
}

/// Parse a typed identifier from a path segment.
fn parse_id<T: FromStr>(raw: &str) -> Result<T, ApiError> {
    T::from_str(raw).map_err(|_| ApiError::bad_request(format!("invalid id {raw:?}")))
}
