//! Time-series store port — append-only persistence for data points.

use std::future::Future;
use std::sync::Arc;

use aggregator_domain::data_point::{DataPoint, DataQuery};
use aggregator_domain::error::AggregatorError;
use aggregator_domain::id::EndpointId;
use aggregator_domain::time::Timestamp;
use serde::Serialize;

/// What an [`DataPointStore::append`] call did with its batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppendReport {
    /// Points that were new.
    pub inserted: usize,
    /// Points whose key was already stored.
    pub skipped: usize,
}

impl AppendReport {
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            inserted: self.inserted + other.inserted,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Durable, append-only store of [`DataPoint`]s.
///
/// `(endpoint_id, sensor_name, collected_at)` is unique: appending a point
/// whose key is already present is a silent no-op, so replaying a batch is
/// always safe. Points are never updated or deleted.
pub trait DataPointStore {
    /// Append a batch. Each point is written at most once.
    ///
    /// On `StorageUnavailable` an unknown prefix of the batch may have been
    /// written; callers retry the whole batch.
    fn append(
        &self,
        batch: &[DataPoint],
    ) -> impl Future<Output = Result<AppendReport, AggregatorError>> + Send;

    /// Points matching `query`, ascending by `collected_at`, never outside
    /// the requested range. With an aggregation, one point per
    /// `(endpoint, sensor)` series.
    fn query(
        &self,
        query: &DataQuery,
    ) -> impl Future<Output = Result<Vec<DataPoint>, AggregatorError>> + Send;

    /// Timestamp of the newest stored point for an endpoint, optionally
    /// restricted to one sensor.
    fn latest_collected_at(
        &self,
        endpoint_id: EndpointId,
        sensor_name: Option<&str>,
    ) -> impl Future<Output = Result<Option<Timestamp>, AggregatorError>> + Send;

    /// Endpoints that have at least one stored point.
    fn endpoint_ids(&self) -> impl Future<Output = Result<Vec<EndpointId>, AggregatorError>> + Send;
}

impl<T: DataPointStore + Send + Sync> DataPointStore for Arc<T> {
    fn append(
        &self,
        batch: &[DataPoint],
    ) -> impl Future<Output = Result<AppendReport, AggregatorError>> + Send {
        (**self).append(batch)
    }

    fn query(
        &self,
        query: &DataQuery,
    ) -> impl Future<Output = Result<Vec<DataPoint>, AggregatorError>> + Send {
        (**self).query(query)
    }

    fn latest_collected_at(
        &self,
        endpoint_id: EndpointId,
        sensor_name: Option<&str>,
    ) -> impl Future<Output = Result<Option<Timestamp>, AggregatorError>> + Send {
        (**self).latest_collected_at(endpoint_id, sensor_name)
    }

    fn endpoint_ids(&self) -> impl Future<Output = Result<Vec<EndpointId>, AggregatorError>> + Send {
        (**self).endpoint_ids()
    }
}
