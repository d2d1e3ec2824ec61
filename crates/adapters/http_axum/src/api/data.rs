//! Read-only access to the time-series store.

use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use aggregator_app::ports::{DataPointStore, EndpointRepository, RuleRepository};
use aggregator_domain::data_point::{Aggregation, DataPoint, DataQuery, TimeRange};
use aggregator_domain::id::EndpointId;
use aggregator_domain::time::{self, Timestamp};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Window used when `from` is omitted.
const DEFAULT_LOOKBACK: Duration = Duration::from_secs(60 * 60);

/// Query string of `GET /api/data`.
#[derive(Debug, Default, Deserialize)]
pub struct DataParams {
    /// Comma-separated sensor names; all sensors when omitted.
    pub sensor: Option<String>,
    pub endpoint: Option<String>,
    pub from: Option<Timestamp>,
    /// Defaults to now.
    pub to: Option<Timestamp>,
    pub aggregation: Option<String>,
}

impl DataParams {
    fn into_query(self, now: Timestamp) -> Result<DataQuery, ApiError> {
        let to = self.to.unwrap_or(now);
        let from = self
            .from
            .unwrap_or_else(|| TimeRange::ending_at(to, DEFAULT_LOOKBACK).from);
        if from > to {
            return Err(ApiError::bad_request("`from` must not be after `to`"));
        }

        let mut query = DataQuery::new(TimeRange::new(from, to));
        for sensor in self.sensor.iter().flat_map(|s| s.split(',')) {
            let sensor = sensor.trim();
            if !sensor.is_empty() {
                query = query.sensor(sensor);
            }
        }
        if let Some(raw) = self.endpoint.as_deref() {
            let endpoint_id: EndpointId = parse_id(raw)?;
            query = query.endpoint(endpoint_id);
        }
        if let Some(raw) = self.aggregation.as_deref() {
            let aggregation: Aggregation = raw.parse().map_err(ApiError::BadRequest)?;
            query = query.aggregate(aggregation);
        }
        Ok(query)
    }
}

/// `GET /api/data?sensor=&endpoint=&from=&to=&aggregation=`
///
/// Points in ascending `collected_at` order, never outside `[from, to]`.
pub async fn query<ER, RR, DS>(
    State(state): State<AppState<ER, RR, DS>>,
    Query(params): Query<DataParams>,
) -> Result<Json<Vec<DataPoint>>, ApiError>
where
    ER: EndpointRepository + Send + Sync + 'static,
    RR: RuleRepository + Send + Sync + 'static,
    DS: DataPointStore + Send + Sync + 'static,
{
    let query = params.into_query(time::now())?;
    Ok(Json(state.store.query(&query).await?))
}
