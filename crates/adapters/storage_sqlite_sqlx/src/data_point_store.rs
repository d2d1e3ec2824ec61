//! `SQLite` implementation of [`DataPointStore`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use aggregator_app::ports::{AppendReport, DataPointStore};
use aggregator_domain::data_point::{Aggregation, DataPoint, DataQuery};
use aggregator_domain::error::AggregatorError;
use aggregator_domain::id::EndpointId;
use aggregator_domain::time::{self, Timestamp};
use aggregator_domain::unit::Unit;

use crate::codec::{decode_error, decode_timestamp};
use crate::error::StorageError;

struct Wrapper(DataPoint);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let endpoint_id: String = row.try_get("endpoint_id")?;
        let collected_at: String = row.try_get("collected_at")?;
        let unit: String = row.try_get("unit")?;

        Ok(Self(DataPoint {
            endpoint_id: EndpointId::from_str(&endpoint_id).map_err(decode_error)?,
            sensor_name: row.try_get("sensor_name")?,
            collected_at: decode_timestamp(&collected_at)?,
            value: row.try_get("value")?,
            unit: Unit::from_str(&unit).map_err(decode_error)?,
        }))
    }
}

const INSERT_OR_IGNORE: &str = r"
    INSERT OR IGNORE INTO sensor_values (endpoint_id, sensor_name, collected_at, value, unit)
    VALUES (?, ?, ?, ?, ?)
";

const SELECT_LATEST_COLLECTED_AT: &str = r"
    SELECT MAX(collected_at) FROM sensor_values
    WHERE endpoint_id = ? AND (? IS NULL OR sensor_name = ?)
";

const SELECT_ENDPOINT_IDS: &str =
    "SELECT DISTINCT endpoint_id FROM sensor_values ORDER BY endpoint_id";

/// Matches the stored row a series' newest timestamp points at.
const SAME_ROW: &str = "s.endpoint_id = g.endpoint_id AND s.sensor_name = g.sensor_name AND s.collected_at = g.collected_at";

/// `SQLite`-backed time-series store.
///
/// Uniqueness of `(endpoint_id, sensor_name, collected_at)` is enforced by the
/// table and writes use `INSERT OR IGNORE`, so concurrent or replayed appends
/// never produce duplicates. Aggregations run in SQL, one row per
/// `(endpoint_id, sensor_name)` series.
pub struct SqliteDataPointStore {
    pool: SqlitePool,
}

impl SqliteDataPointStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &DataQuery) {
    builder.push(" WHERE collected_at >= ");
    builder.push_bind(time::encode(query.range.from));
    builder.push(" AND collected_at <= ");
    builder.push_bind(time::encode(query.range.to));

    if let Some(endpoint_id) = query.endpoint_id {
        builder.push(" AND endpoint_id = ");
        builder.push_bind(endpoint_id.to_string());
    }

    if !query.sensor_names.is_empty() {
        builder.push(" AND sensor_name IN (");
        let mut names = builder.separated(", ");
        for name in &query.sensor_names {
            names.push_bind(name.clone());
        }
        names.push_unseparated(")");
    }
}

fn raw_query(query: &DataQuery) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(
        "SELECT endpoint_id, sensor_name, collected_at, value, unit FROM sensor_values",
    );
    push_filters(&mut builder, query);
    builder.push(" ORDER BY collected_at, sensor_name, endpoint_id");
    builder
}

fn aggregate_expression(aggregation: Aggregation) -> &'static str {
    match aggregation {
        Aggregation::Latest => "NULL",
        Aggregation::Average => "AVG(value)",
        Aggregation::Min => "MIN(value)",
        Aggregation::Max => "MAX(value)",
        Aggregation::Sum => "TOTAL(value)",
        Aggregation::Count => "CAST(COUNT(*) AS REAL)",
    }
}

fn aggregated_query(query: &DataQuery, aggregation: Aggregation) -> QueryBuilder<'static, Sqlite> {
    let value = if aggregation == Aggregation::Latest {
        format!("(SELECT s.value FROM sensor_values s WHERE {SAME_ROW})")
    } else {
        "g.aggregated".to_string()
    };

    let mut builder = QueryBuilder::new(format!(
        "SELECT g.endpoint_id, g.sensor_name, g.collected_at, {value} AS value, \
         (SELECT s.unit FROM sensor_values s WHERE {SAME_ROW}) AS unit \
         FROM (SELECT endpoint_id, sensor_name, MAX(collected_at) AS collected_at, {} AS aggregated \
         FROM sensor_values",
        aggregate_expression(aggregation)
    ));
    push_filters(&mut builder, query);
    builder.push(
        " GROUP BY endpoint_id, sensor_name) AS g \
         ORDER BY g.collected_at, g.sensor_name, g.endpoint_id",
    );
    builder
}

impl DataPointStore for SqliteDataPointStore {
    async fn append(&self, batch: &[DataPoint]) -> Result<AppendReport, AggregatorError> {
        let mut report = AppendReport::default();
        if batch.is_empty() {
            return Ok(report);
        }

        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        for point in batch {
            let result = sqlx::query(INSERT_OR_IGNORE)
                .bind(point.endpoint_id.to_string())
                .bind(&point.sensor_name)
                .bind(time::encode(point.collected_at))
                .bind(point.value)
                .bind(point.unit.as_str())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            if result.rows_affected() == 0 {
                report.skipped += 1;
            } else {
                report.inserted += 1;
            }
        }
        tx.commit().await.map_err(StorageError::from)?;

        tracing::debug!(
            inserted = report.inserted,
            skipped = report.skipped,
            "appended data points"
        );
        Ok(report)
    }

    async fn query(&self, query: &DataQuery) -> Result<Vec<DataPoint>, AggregatorError> {
        let mut builder = match query.aggregation {
            None => raw_query(query),
            Some(aggregation) => aggregated_query(query, aggregation),
        };

        let rows: Vec<Wrapper> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let counting = query.aggregation == Some(Aggregation::Count);
        Ok(rows
            .into_iter()
            .map(|w| {
                let mut point = w.0;
                if counting {
                    point.unit = Unit::Dimensionless;
                }
                point
            })
            .collect())
    }

    async fn latest_collected_at(
        &self,
        endpoint_id: EndpointId,
        sensor_name: Option<&str>,
    ) -> Result<Option<Timestamp>, AggregatorError> {
        let latest: Option<String> = sqlx::query_scalar(SELECT_LATEST_COLLECTED_AT)
            .bind(endpoint_id.to_string())
            .bind(sensor_name)
            .bind(sensor_name)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let latest = latest
            .as_deref()
            .map(decode_timestamp)
            .transpose()
            .map_err(StorageError::from)?;
        Ok(latest)
    }

    async fn endpoint_ids(&self) -> Result<Vec<EndpointId>, AggregatorError> {
        let ids: Vec<String> = sqlx::query_scalar(SELECT_ENDPOINT_IDS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let ids = ids
            .iter()
            .map(|id| EndpointId::from_str(id).map_err(decode_error))
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(ids)
    }
}
