//! Data points and the queries that read them back.
//!
//! A [`DataPoint`] is a normalized, timestamped reading. It is immutable once
//! stored, and `(endpoint_id, sensor_name, collected_at)` identifies it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::EndpointId;
use crate::time::{Timestamp, to_chrono};
use crate::unit::Unit;

/// A normalized reading in its canonical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub endpoint_id: EndpointId,
    pub sensor_name: String,
    pub collected_at: Timestamp,
    pub value: f64,
    pub unit: Unit,
}

impl DataPoint {
    /// Whether two points share the store's uniqueness key.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.endpoint_id == other.endpoint_id
            && self.sensor_name == other.sensor_name
            && self.collected_at == other.collected_at
    }

    /// Ordering used for every query result: ascending by `collected_at`,
    /// then sensor name, then endpoint.
    #[must_use]
    pub fn chronological(a: &Self, b: &Self) -> Ordering {
        a.collected_at
            .cmp(&b.collected_at)
            .then_with(|| a.sensor_name.cmp(&b.sensor_name))
            .then_with(|| a.endpoint_id.as_uuid().cmp(&b.endpoint_id.as_uuid()))
    }
}

/// An inclusive time interval `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl TimeRange {
    #[must_use]
    pub fn new(from: Timestamp, to: Timestamp) -> Self {
        Self { from, to }
    }

    /// The window of length `window` ending at `now`, inclusive on both ends.
    #[must_use]
    pub fn ending_at(now: Timestamp, window: Duration) -> Self {
        let from = now
            .checked_sub_signed(to_chrono(window))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        Self { from, to: now }
    }

    #[must_use]
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.from <= ts && ts <= self.to
    }
}

/// How points are reduced per `(endpoint, sensor)` series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// The most recent point of each series.
    Latest,
    Average,
    Min,
    Max,
    Sum,
    /// Number of points, dimensionless.
    Count,
}

impl Aggregation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Average => "average",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Count => "count",
        }
    }

    /// Reduce `points` to one point per `(endpoint, sensor)` series.
    ///
    /// The resulting point carries the timestamp of the newest point in its
    /// series. Results are in [`DataPoint::chronological`] order.
    #[must_use]
    pub fn apply(self, points: &[DataPoint]) -> Vec<DataPoint> {
        let mut series: BTreeMap<(uuid::Uuid, &str), Vec<&DataPoint>> = BTreeMap::new();
        for point in points {
            series
                .entry((point.endpoint_id.as_uuid(), point.sensor_name.as_str()))
                .or_default()
                .push(point);
        }

        let mut reduced: Vec<DataPoint> = series
            .into_values()
            .filter_map(|group| self.reduce(&group))
            .collect();
        reduced.sort_by(DataPoint::chronological);
        reduced
    }

    #[allow(clippy::cast_precision_loss)]
    fn reduce(self, group: &[&DataPoint]) -> Option<DataPoint> {
        let latest = group.iter().max_by_key(|p| p.collected_at)?;
        let values = group.iter().map(|p| p.value);
        let value = match self {
            Self::Latest => latest.value,
            Self::Average => values.sum::<f64>() / group.len() as f64,
            Self::Min => values.fold(f64::INFINITY, f64::min),
            Self::Max => values.fold(f64::NEG_INFINITY, f64::max),
            Self::Sum => values.sum(),
            Self::Count => group.len() as f64,
        };
        let unit = if self == Self::Count {
            Unit::Dimensionless
        } else {
            latest.unit
        };
        Some(DataPoint {
            endpoint_id: latest.endpoint_id,
            sensor_name: latest.sensor_name.clone(),
            collected_at: latest.collected_at,
            value,
            unit,
        })
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            "average" | "avg" | "mean" => Ok(Self::Average),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "sum" => Ok(Self::Sum),
            "count" => Ok(Self::Count),
            other => Err(format!("unknown aggregation {other:?}")),
        }
    }
}

/// A read against the time-series store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuery {
    /// Sensors to include. Empty means every sensor.
    #[serde(default)]
    pub sensor_names: Vec<String>,
    /// Restrict to one endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<EndpointId>,
    pub range: TimeRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
}

impl DataQuery {
    /// Every point of every sensor within `range`.
    #[must_use]
    pub fn new(range: TimeRange) -> Self {
        Self {
            sensor_names: Vec::new(),
            endpoint_id: None,
            range,
            aggregation: None,
        }
    }

    #[must_use]
    pub fn sensor(mut self, name: impl Into<String>) -> Self {
        self.sensor_names.push(name.into());
        self
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint_id: EndpointId) -> Self {
        self.endpoint_id = Some(endpoint_id);
        self
    }

    #[must_use]
    pub fn aggregate(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Whether `point` is selected by this query's filters and range.
    #[must_use]
    pub fn matches(&self, point: &DataPoint) -> bool {
        (self.sensor_names.is_empty() || self.sensor_names.contains(&point.sensor_name))
            && self.endpoint_id.is_none_or(|id| id == point.endpoint_id)
            && self.range.contains(point.collected_at)
    }

    /// Evaluate the query against an in-memory set of points.
    #[must_use]
    pub fn run<'a>(&self, points: impl IntoIterator<Item = &'a DataPoint>) -> Vec<DataPoint> {
        let mut selected: Vec<DataPoint> = points
            .into_iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect();
        match self.aggregation {
            Some(aggregation) => aggregation.apply(&selected),
            None => {
                selected.sort_by(DataPoint::chronological);
                selected
            }
        }
    }
}
