//! Collector — polls every enabled endpoint once per cycle and appends the
//! normalized readings to the store.
//!
//! Endpoint fetches run concurrently with a bounded number in flight, each
//! limited by its endpoint's timeout. A failing endpoint only affects its own
//! outcome: the cycle completes as long as the store acknowledges the batch.
//! When the store is unavailable the batch is kept in memory and replayed
//! first on the next cycle; the store's uniqueness key makes that replay safe.

use std::future::Future;
use std::pin::pin;

use aggregator_domain::cycle::{CollectionCycle, EndpointFailure, EndpointOutcome};
use aggregator_domain::data_point::DataPoint;
use aggregator_domain::endpoint::Endpoint;
use aggregator_domain::error::AggregatorError;
use aggregator_domain::id::EndpointId;
use aggregator_domain::reading::RawReading;
use aggregator_domain::time::{self, Timestamp};
use aggregator_domain::unit::UnitNormalizer;
use futures::{StreamExt, stream};
use tokio::sync::Mutex;

use crate::ports::{AppendReport, DataPointStore, EndpointRepository, SensorSource};

/// Tuning knobs for the collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Maximum number of endpoint fetches in flight at once.
    pub max_in_flight: usize,
    /// Upper bound on points kept in memory while the store is down. The
    /// oldest points are dropped beyond it.
    pub max_pending_points: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            max_pending_points: 100_000,
        }
    }
}

/// Runs collection cycles against the endpoint registry.
pub struct Collector<ER, S, DS> {
    endpoints: ER,
    source: S,
    store: DS,
    normalizer: UnitNormalizer,
    config: CollectorConfig,
    /// Points from a cycle whose append failed. Holding this lock for the
    /// whole append also keeps cycles strictly ordered.
    pending: Mutex<Vec<DataPoint>>,
}

impl<ER, S, DS> Collector<ER, S, DS>
where
    ER: EndpointRepository + Sync,
    S: SensorSource,
    DS: DataPointStore + Sync,
{
    pub fn new(
        endpoints: ER,
        source: S,
        store: DS,
        normalizer: UnitNormalizer,
        config: CollectorConfig,
    ) -> Self {
        Self {
            endpoints,
            source,
            store,
            normalizer,
            config,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Number of points waiting to be written after a storage failure.
    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Run one full cycle over the enabled endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::StorageUnavailable`] when the registry or
    /// the store cannot be reached. Endpoint failures never surface here;
    /// they are reported in the cycle's outcomes.
    pub async fn run_cycle(&self, now: Timestamp) -> Result<CollectionCycle, AggregatorError> {
        self.run_cycle_until(now, std::future::pending()).await
    }

    /// Like [`Collector::run_cycle`], but stop waiting for fetches once
    /// `abandon` completes.
    ///
    /// Endpoints still in flight at that point are reported as
    /// [`EndpointFailure::Abandoned`]; the readings already fetched are
    /// persisted as usual.
    ///
    /// # Errors
    ///
    /// Same as [`Collector::run_cycle`].
    #[tracing::instrument(skip_all, fields(cycle_id = tracing::field::Empty))]
    pub async fn run_cycle_until(
        &self,
        now: Timestamp,
        abandon: impl Future<Output = ()> + Send,
    ) -> Result<CollectionCycle, AggregatorError> {
        let mut cycle = CollectionCycle::start(now);
        tracing::Span::current().record("cycle_id", tracing::field::display(cycle.id));

        let endpoints = self.endpoints.list(true).await?;
        let results = self.fetch_all(&endpoints, now, abandon).await;

        let mut batch = Vec::new();
        for (endpoint, result) in endpoints.iter().zip(results) {
            let result = match result {
                Some(Ok(points)) => {
                    let count = points.len();
                    batch.extend(points);
                    Ok(count)
                }
                Some(Err(failure)) => Err(failure),
                None => Err(EndpointFailure::Abandoned),
            };
            if let Err(failure) = &result {
                tracing::warn!(
                    endpoint_id = %endpoint.id,
                    url = %endpoint.url,
                    error = %failure,
                    "endpoint collection failed"
                );
            }
            cycle.outcomes.push(EndpointOutcome {
                endpoint_id: endpoint.id,
                url: endpoint.url.clone(),
                result,
            });
        }

        let report = self.persist(batch).await?;
        cycle.complete(time::now(), report.inserted, report.skipped);
        tracing::info!(
            endpoints = cycle.outcomes.len(),
            succeeded = cycle.success_count(),
            failed = cycle.failure_count(),
            persisted = cycle.persisted,
            skipped = cycle.skipped,
            "collection cycle completed"
        );
        Ok(cycle)
    }

    /// Fetch every endpoint, returning one slot per endpoint in registry
    /// order. `None` marks a fetch that had not finished when `abandon`
    /// fired.
    async fn fetch_all(
        &self,
        endpoints: &[Endpoint],
        now: Timestamp,
        abandon: impl Future<Output = ()> + Send,
    ) -> Vec<Option<Result<Vec<DataPoint>, EndpointFailure>>> {
        let mut results = vec![None; endpoints.len()];
        let mut fetches = pin!(
            stream::iter(endpoints.iter().cloned().enumerate())
                .map(|(index, endpoint)| async move {
                    (index, self.collect_one(&endpoint, now).await)
                })
                .buffer_unordered(self.config.max_in_flight.max(1))
        );
        let mut abandon = pin!(abandon);

        loop {
            tokio::select! {
                biased;
                next = fetches.next() => match next {
                    Some((index, result)) => results[index] = Some(result),
                    None => break,
                },
                () = &mut abandon => {
                    tracing::warn!(
                        unfinished = results.iter().filter(|r| r.is_none()).count(),
                        "abandoning in-flight fetches"
                    );
                    break;
                }
            }
        }
        results
    }

    /// Fetch and normalize one endpoint's readings.
    async fn collect_one(
        &self,
        endpoint: &Endpoint,
        now: Timestamp,
    ) -> Result<Vec<DataPoint>, EndpointFailure> {
        let readings = tokio::time::timeout(endpoint.timeout, self.source.fetch(endpoint))
            .await
            .map_err(|_| EndpointFailure::Timeout {
                timeout: endpoint.timeout,
            })??;
        self.normalize(endpoint.id, readings, now)
    }

    /// Convert raw readings into data points. A single bad unit fails the
    /// whole endpoint for this cycle. Timestamps are truncated to storage
    /// precision here.
    fn normalize(
        &self,
        endpoint_id: EndpointId,
        readings: Vec<RawReading>,
        now: Timestamp,
    ) -> Result<Vec<DataPoint>, EndpointFailure> {
        readings
            .into_iter()
            .map(|reading| -> Result<DataPoint, EndpointFailure> {
                let (raw_value, raw_unit) = reading.resolve();
                let (value, unit) =
                    self.normalizer
                        .normalize(raw_value, &raw_unit, &reading.sensor_name)?;
                Ok(DataPoint {
                    endpoint_id,
                    collected_at: time::truncate(reading.collected_at.unwrap_or(now)),
                    sensor_name: reading.sensor_name,
                    value,
                    unit,
                })
            })
            .collect()
    }

    /// Append the retained batch followed by `fresh`, retaining everything on
    /// failure.
    async fn persist(&self, fresh: Vec<DataPoint>) -> Result<AppendReport, AggregatorError> {
        let mut pending = self.pending.lock().await;
        let mut batch = std::mem::take(&mut *pending);
        let retried = batch.len();
        batch.extend(fresh);

        if batch.is_empty() {
            return Ok(AppendReport::default());
        }
        if retried > 0 {
            tracing::info!(retried, "replaying points retained from a failed cycle");
        }

        match self.store.append(&batch).await {
            Ok(report) => Ok(report),
            Err(err) => {
                let overflow = batch.len().saturating_sub(self.config.max_pending_points);
                if overflow > 0 {
                    tracing::warn!(dropped = overflow, "pending buffer full, dropping oldest points");
                    batch.drain(..overflow);
                }
                tracing::error!(error = %err, retained = batch.len(), "failed to persist collection batch");
                *pending = batch;
                Err(err)
            }
        }
    }

    /// Fetch the history of one endpoint since its newest stored point and
    /// append it.
    ///
    /// Endpoints with no stored data get their current readings. The
    /// outcome reports endpoint failures the same way a cycle does.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`] for an unknown endpoint, or
    /// [`AggregatorError::StorageUnavailable`].
    #[tracing::instrument(skip(self))]
    pub async fn backfill(
        &self,
        endpoint_id: EndpointId,
        now: Timestamp,
    ) -> Result<EndpointOutcome, AggregatorError> {
        let endpoint = self.endpoints.get_by_id(endpoint_id).await?.ok_or_else(|| {
            aggregator_domain::error::NotFoundError {
                entity: "Endpoint",
                id: endpoint_id.to_string(),
            }
        })?;
        let since = self.store.latest_collected_at(endpoint_id, None).await?;

        let fetched = match since {
            Some(since) => {
                tokio::time::timeout(endpoint.timeout, self.source.fetch_since(&endpoint, since))
                    .await
            }
            None => tokio::time::timeout(endpoint.timeout, self.source.fetch(&endpoint)).await,
        };
        let points = fetched
            .map_err(|_| EndpointFailure::Timeout {
                timeout: endpoint.timeout,
            })
            .and_then(|readings| readings)
            .and_then(|readings| self.normalize(endpoint_id, readings, now));

        let result = match points {
            Ok(points) => {
                let report = self.persist(points).await?;
                tracing::info!(
                    inserted = report.inserted,
                    skipped = report.skipped,
                    "backfill completed"
                );
                Ok(report.inserted)
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "backfill failed");
                Err(failure)
            }
        };
        Ok(EndpointOutcome {
            endpoint_id,
            url: endpoint.url,
            result,
        })
    }
}
