//! Predicate — a condition over recent data that decides whether a rule fires.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data_point::Aggregation;
use crate::error::ConfigurationError;
use crate::id::EndpointId;

/// How an aggregated value is compared against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Above,
    AtOrAbove,
    Below,
    AtOrBelow,
    Equal,
}

impl Comparison {
    #[must_use]
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Above => value > threshold,
            Self::AtOrAbove => value >= threshold,
            Self::Below => value < threshold,
            Self::AtOrBelow => value <= threshold,
            Self::Equal => (value - threshold).abs() < f64::EPSILON,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Above => ">",
            Self::AtOrAbove => ">=",
            Self::Below => "<",
            Self::AtOrBelow => "<=",
            Self::Equal => "==",
        }
    }
}

/// A boolean condition over the data points of a recent window.
///
/// Thresholds are expressed in the canonical unit of the sensor's quantity.
/// "Stays above X for at least D" is written as `min` over a window of `D`
/// compared `above` X.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Aggregate one sensor over `window` and compare the result.
    ///
    /// Without `endpoint_id` every endpoint reporting the sensor is a
    /// separate series and the predicate holds if any series satisfies it.
    Threshold {
        sensor_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint_id: Option<EndpointId>,
        aggregation: Aggregation,
        #[serde(with = "crate::time::seconds")]
        window: Duration,
        comparison: Comparison,
        threshold: f64,
    },
    /// Every member holds.
    All { predicates: Vec<Predicate> },
    /// At least one member holds.
    Any { predicates: Vec<Predicate> },
}

impl Predicate {
    /// Check the predicate is well formed.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for empty sensor names, zero windows,
    /// non-finite thresholds and empty composites, at any nesting depth.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Self::Threshold {
                sensor_name,
                window,
                threshold,
                ..
            } => {
                if sensor_name.trim().is_empty() {
                    return Err(ConfigurationError::EmptySensorName);
                }
                if window.is_zero() {
                    return Err(ConfigurationError::ZeroWindow);
                }
                if !threshold.is_finite() {
                    return Err(ConfigurationError::NonFiniteThreshold);
                }
                Ok(())
            }
            Self::All { predicates } | Self::Any { predicates } => {
                if predicates.is_empty() {
                    return Err(ConfigurationError::EmptyComposite);
                }
                predicates.iter().try_for_each(Self::validate)
            }
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Threshold {
                sensor_name,
                aggregation,
                window,
                comparison,
                threshold,
                ..
            } => write!(
                f,
                "{aggregation}({sensor_name}, {}s) {} {threshold}",
                window.as_secs(),
                comparison.symbol()
            ),
            Self::All { predicates } => write_joined(f, predicates, " && "),
            Self::Any { predicates } => write_joined(f, predicates, " || "),
        }
    }
}

fn write_joined(
    f: &mut std::fmt::Formatter<'_>,
    predicates: &[Predicate],
    separator: &str,
) -> std::fmt::Result {
    f.write_str("(")?;
    for (index, predicate) in predicates.iter().enumerate() {
        if index > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{predicate}")?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hot() -> Predicate {
        Predicate::Threshold {
            sensor_name: "temperature".to_string(),
            endpoint_id: None,
            aggregation: Aggregation::Average,
            window: Duration::from_secs(15 * 60),
            comparison: Comparison::Above,
            threshold: 25.0,
        }
    }

    #[test]
    fn should_compare_strictly_and_inclusively() {
        assert!(Comparison::Above.holds(25.1, 25.0));
        assert!(!Comparison::Above.holds(25.0, 25.0));
        assert!(Comparison::AtOrAbove.holds(25.0, 25.0));
        assert!(Comparison::Below.holds(-1.0, 0.0));
        assert!(Comparison::AtOrBelow.holds(0.0, 0.0));
        assert!(Comparison::Equal.holds(1.0, 1.0));
    }

    #[test]
    fn should_accept_well_formed_predicate() {
        let predicate = Predicate::All {
            predicates: vec![hot()],
        };
        assert_eq!(predicate.validate(), Ok(()));
    }

    #[test]
    fn should_reject_zero_window() {
        let mut predicate = hot();
        if let Predicate::Threshold { window, .. } = &mut predicate {
            *window = Duration::ZERO;
        }
        assert_eq!(predicate.validate(), Err(ConfigurationError::ZeroWindow));
    }

    #[test]
    fn should_reject_nested_empty_composite() {
        let predicate = Predicate::Any {
            predicates: vec![hot(), Predicate::All { predicates: vec![] }],
        };
        assert_eq!(predicate.validate(), Err(ConfigurationError::EmptyComposite));
    }

    #[test]
    fn should_reject_nan_threshold() {
        let mut predicate = hot();
        if let Predicate::Threshold { threshold, .. } = &mut predicate {
            *threshold = f64::NAN;
        }
        assert_eq!(
            predicate.validate(),
            Err(ConfigurationError::NonFiniteThreshold)
        );
    }

    #[test]
    fn should_display_threshold() {
        assert_eq!(hot().to_string(), "average(temperature, 900s) > 25");
    }

    #[test]
    fn should_deserialize_from_tagged_json() {
        let json = serde_json::json!({
            "type": "threshold",
            "sensor_name": "temperature",
            "aggregation": "average",
            "window": 900,
            "comparison": "above",
            "threshold": 25.0
        });
        let predicate: Predicate = serde_json::from_value(json).unwrap();
        assert_eq!(predicate, hot());
    }
}
