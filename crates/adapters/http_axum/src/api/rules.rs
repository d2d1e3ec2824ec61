//! JSON handlers for rules.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use aggregator_app::ports::{DataPointStore, EndpointRepository, RuleRepository};
use aggregator_domain::id::RuleId;
use aggregator_domain::rule::{ActionDescriptor, Predicate, Rule, RuleUpdate};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating a rule.
#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub predicate: Predicate,
    pub action: ActionDescriptor,
    /// Seconds; defaults to 15 minutes.
    pub cooldown: Option<f64>,
    pub enabled: Option<bool>,
}

impl CreateRuleRequest {
    fn into_rule(self) -> Result<Rule, ApiError> {
        let mut builder = Rule::builder()
            .name(self.name)
            .predicate(self.predicate)
            .action(self.action);
        if let Some(secs) = self.cooldown {
            let cooldown = Duration::try_from_secs_f64(secs)
                .map_err(|err| ApiError::bad_request(format!("invalid cooldown: {err}")))?;
            builder = builder.cooldown(cooldown);
        }
        if let Some(enabled) = self.enabled {
            builder = builder.enabled(enabled);
        }
        Ok(builder.build()?)
    }
}

/// `GET /api/rules`
pub async fn list<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
) -> Result<Json<Vec<Rule>>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    Ok(Json(state.rules.list_rules().await?))
}

/// `GET /api/rules/{id}`
pub async fn get<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Path(id): Path<String>,
) -> Result<Json<Rule>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let id: RuleId = parse_id(&id)?;
    Ok(Json(state.rules.get_rule(id).await?))
}

/// `POST /api/rules`: Create a rule. Malformed predicates answer
/// `400 Bad Request`, a name already in use `409 Conflict`.
pub async fn create<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<Rule>), ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let rule = req.into_rule()?;
    let created = state.rules.create_rule(rule).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /api/rules/{id}`: Partial update; omitted fields are kept.
pub async fn update<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Path(id): Path<String>,
    Json(update): Json<RuleUpdate>,
) -> Result<Json<Rule>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let id: RuleId = parse_id(&id)?;
    Ok(Json(state.rules.update_rule(id, update).await?))
}

/// `POST /api/rules/{id}/enable`
pub async fn enable<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Path(id): Path<String>,
) -> Result<Json<Rule>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let id: RuleId = parse_id(&id)?;
    Ok(Json(state.rules.enable(id).await?))
}

/// `POST /api/rules/{id}/disable`
pub async fn disable<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Path(id): Path<String>,
) -> Result<Json<Rule>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let id: RuleId = parse_id(&id)?;
    Ok(Json(state.rules.disable(id).await?))
}
