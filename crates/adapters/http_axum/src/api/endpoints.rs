//! JSON handlers for the endpoint registry.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use aggregator_app::ports::{DataPointStore, EndpointRepository, RuleRepository};
use aggregator_domain::endpoint::{Endpoint, EndpointUpdate};
use aggregator_domain::id::EndpointId;

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for registering an endpoint.
#[derive(Debug, Deserialize)]
pub struct CreateEndpointRequest {
    /// Defaults to the URL.
    pub name: Option<String>,
    pub url: String,
    pub api_key: Option<String>,
    /// Seconds, fractional allowed.
    pub timeout: Option<f64>,
    pub colour: Option<String>,
    pub enabled: Option<bool>,
}

impl CreateEndpointRequest {
    fn into_endpoint(self) -> Result<Endpoint, ApiError> {
        let mut builder = Endpoint::builder().url(self.url);
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(api_key) = self.api_key {
            builder = builder.api_key(api_key);
        }
        if let Some(secs) = self.timeout {
            let timeout = Duration::try_from_secs_f64(secs)
                .map_err(|err| ApiError::bad_request(format!("invalid timeout: {err}")))?;
            builder = builder.timeout(timeout);
        }
        if let Some(colour) = self.colour {
            builder = builder.colour(colour);
        }
        if let Some(enabled) = self.enabled {
            builder = builder.enabled(enabled);
        }
        Ok(builder.build()?)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub enabled: bool,
}

/// `GET /api/endpoints`: All endpoints in registration order,
/// `?enabled=true` for the enabled ones only.
pub async fn list<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Endpoint>>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let endpoints = state.endpoints.list(params.enabled).await?;
    Ok(Json(endpoints))
}

/// `GET /api/endpoints/{id}`
pub async fn get<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Path(id): Path<String>,
) -> Result<Json<Endpoint>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let id: EndpointId = parse_id(&id)?;
    Ok(Json(state.endpoints.get(id).await?))
}

/// `POST /api/endpoints`: Register an endpoint. A URL that is already
/// registered answers `409 Conflict`.
pub async fn create<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Json(req): Json<CreateEndpointRequest>,
) -> Result<(StatusCode, Json<Endpoint>), ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let endpoint = req.into_endpoint()?;
    let created = state.endpoints.register(endpoint).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /api/endpoints/{id}`: Edit name, API key, timeout or colour.
pub async fn update<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Path(id): Path<String>,
    Json(update): Json<EndpointUpdate>,
) -> Result<Json<Endpoint>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let id: EndpointId = parse_id(&id)?;
    Ok(Json(state.endpoints.update(id, update).await?))
}

/// `POST /api/endpoints/{id}/enable`
pub async fn enable<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Path(id): Path<String>,
) -> Result<Json<Endpoint>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let id: EndpointId = parse_id(&id)?;
    Ok(Json(state.endpoints.enable(id).await?))
}

/// `POST /api/endpoints/{id}/disable`
pub async fn disable<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Path(id): Path<String>,
) -> Result<Json<Endpoint>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let id: EndpointId = parse_id(&id)?;
    Ok(Json(state.endpoints.disable(id).await?))
}
