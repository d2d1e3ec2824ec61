//! Predicate evaluation.
//!
//! [`PredicateEvaluator`] is the seam for alternative predicate languages.
//! The default [`StoreEvaluator`] pushes each threshold's aggregation down to
//! the time-series store.

use std::future::Future;

use aggregator_domain::data_point::{DataPoint, DataQuery, TimeRange};
use aggregator_domain::error::AggregatorError;
use aggregator_domain::rule::Predicate;
use aggregator_domain::time::Timestamp;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::ports::DataPointStore;

/// Result of evaluating a predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub matched: bool,
    /// The aggregated points that satisfied their threshold.
    pub matches: Vec<DataPoint>,
}

impl Evaluation {
    fn no_match() -> Self {
        Self::default()
    }
}

/// Decides whether a rule's predicate holds at a given instant.
pub trait PredicateEvaluator {
    fn evaluate<'a>(
        &'a self,
        predicate: &'a Predicate,
        now: Timestamp,
    ) -> impl Future<Output = Result<Evaluation, AggregatorError>> + Send + 'a;
}

/// Evaluates predicates with aggregated store queries.
///
/// A window holding no data never satisfies a threshold.
pub struct StoreEvaluator<DS> {
    store: DS,
}

impl<DS: DataPointStore + Sync> StoreEvaluator<DS> {
    pub fn new(store: DS) -> Self {
        Self { store }
    }

    fn evaluate_boxed<'a>(
        &'a self,
        predicate: &'a Predicate,
        now: Timestamp,
    ) -> BoxFuture<'a, Result<Evaluation, AggregatorError>> {
        async move {
            match predicate {
                Predicate::Threshold {
                    sensor_name,
                    endpoint_id,
                    aggregation,
                    window,
                    comparison,
                    threshold,
                } => {
                    let query = DataQuery {
                        sensor_names: vec![sensor_name.clone()],
                        endpoint_id: *endpoint_id,
                        range: TimeRange::ending_at(now, *window),
                        aggregation: Some(*aggregation),
                    };
                    let matches: Vec<DataPoint> = self
                        .store
                        .query(&query)
                        .await?
                        .into_iter()
                        .filter(|point| comparison.holds(point.value, *threshold))
                        .collect();
                    Ok(Evaluation {
                        matched: !matches.is_empty(),
                        matches,
                    })
                }
                Predicate::All { predicates } => {
                    let mut combined = Evaluation {
                        matched: true,
                        matches: Vec::new(),
                    };
                    for member in predicates {
                        let evaluation = self.evaluate_boxed(member, now).await?;
                        if !evaluation.matched {
                            return Ok(Evaluation::no_match());
                        }
                        combined.matches.extend(evaluation.matches);
                    }
                    Ok(combined)
                }
                Predicate::Any { predicates } => {
                    let mut combined = Evaluation::no_match();
                    for member in predicates {
                        let evaluation = self.evaluate_boxed(member, now).await?;
                        if evaluation.matched {
                            combined.matched = true;
                            combined.matches.extend(evaluation.matches);
                        }
                    }
                    Ok(combined)
                }
            }
        }
        .boxed()
    }
}

impl<DS: DataPointStore + Sync> PredicateEvaluator for StoreEvaluator<DS> {
    fn evaluate<'a>(
        &'a self,
        predicate: &'a Predicate,
        now: Timestamp,
    ) -> impl Future<Output = Result<Evaluation, AggregatorError>> + Send + 'a {
        self.evaluate_boxed(predicate, now)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use aggregator_domain::data_point::Aggregation;
    use aggregator_domain::id::EndpointId;
    use aggregator_domain::rule::Comparison;
    use aggregator_domain::unit::Unit;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::testing::InMemoryStore;

    fn at(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2020, 4, 1, h, m, 0).unwrap()
    }

    fn temperature(endpoint_id: EndpointId, ts: Timestamp, value: f64) -> DataPoint {
        DataPoint {
            endpoint_id,
            sensor_name: "temperature".to_string(),
            collected_at: ts,
            value,
            unit: Unit::Celsius,
        }
    }

    fn threshold(aggregation: Aggregation, comparison: Comparison, value: f64) -> Predicate {
        Predicate::Threshold {
            sensor_name: "temperature".to_string(),
            endpoint_id: None,
            aggregation,
            window: Duration::from_secs(15 * 60),
            comparison,
            threshold: value,
        }
    }

    #[tokio::test]
    async fn should_match_when_window_average_exceeds_threshold() {
        let store = Arc::new(InMemoryStore::default());
        let ep = EndpointId::new();
        store.seed([
            temperature(ep, at(9, 50), 24.0),
            temperature(ep, at(9, 55), 28.0),
            temperature(ep, at(9, 30), 0.0),
        ]);
        let evaluator = StoreEvaluator::new(store);

        let evaluation = evaluator
            .evaluate(
                &threshold(Aggregation::Average, Comparison::Above, 25.0),
                at(10, 0),
            )
            .await
            .unwrap();

        assert!(evaluation.matched);
        assert_eq!(evaluation.matches.len(), 1);
        assert!((evaluation.matches[0].value - 26.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn should_not_match_empty_window() {
        let store = Arc::new(InMemoryStore::default());
        let evaluator = StoreEvaluator::new(store);
        let evaluation = evaluator
            .evaluate(
                &threshold(Aggregation::Max, Comparison::Below, 100.0),
                at(10, 0),
            )
            .await
            .unwrap();
        assert_eq!(evaluation, Evaluation::no_match());
    }

    #[tokio::test]
    async fn should_match_if_any_endpoint_series_satisfies() {
        let store = Arc::new(InMemoryStore::default());
        let cool = EndpointId::new();
        let hot = EndpointId::new();
        store.seed([
            temperature(cool, at(9, 55), 18.0),
            temperature(hot, at(9, 55), 31.0),
        ]);
        let evaluator = StoreEvaluator::new(store);

        let evaluation = evaluator
            .evaluate(
                &threshold(Aggregation::Latest, Comparison::Above, 25.0),
                at(10, 0),
            )
            .await
            .unwrap();

        assert!(evaluation.matched);
        assert_eq!(evaluation.matches[0].endpoint_id, hot);
    }

    #[tokio::test]
    async fn should_combine_members_of_composites() {
        let store = Arc::new(InMemoryStore::default());
        let ep = EndpointId::new();
        store.seed([temperature(ep, at(9, 55), 22.0)]);
        let evaluator = StoreEvaluator::new(store);
        let warm = threshold(Aggregation::Latest, Comparison::Above, 20.0);
        let hot = threshold(Aggregation::Latest, Comparison::Above, 25.0);

        let all = Predicate::All {
            predicates: vec![warm.clone(), hot.clone()],
        };
        let any = Predicate::Any {
            predicates: vec![warm, hot],
        };

        assert!(!evaluator.evaluate(&all, at(10, 0)).await.unwrap().matched);
        let any_result = evaluator.evaluate(&any, at(10, 0)).await.unwrap();
        assert!(any_result.matched);
        assert_eq!(any_result.matches.len(), 1);
    }

    #[tokio::test]
    async fn should_propagate_storage_failure() {
        let store = Arc::new(InMemoryStore::default());
        store.set_offline(true);
        let evaluator = StoreEvaluator::new(store);
        let result = evaluator
            .evaluate(
                &threshold(Aggregation::Average, Comparison::Above, 25.0),
                at(10, 0),
            )
            .await;
        assert!(matches!(result, Err(AggregatorError::StorageUnavailable(_))));
    }
}
