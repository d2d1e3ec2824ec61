//! Raw readings as reported by an endpoint, before normalization.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// The value of a single sensor, as it appears on the wire.
///
/// Endpoints are inconsistent: most send a bare number, switches send a
/// boolean, and some wrap the number with its own unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Bool(bool),
    Quantity {
        magnitude: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
}

/// One sensor reading fetched from an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub sensor_name: String,
    pub value: RawValue,
    /// Unit declared next to the value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// When the endpoint took the reading. `None` means "now".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<Timestamp>,
}

impl RawReading {
    /// A numeric reading with a unit and no endpoint timestamp.
    #[must_use]
    pub fn number(sensor_name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            sensor_name: sensor_name.into(),
            value: RawValue::Number(value),
            unit: Some(unit.into()),
            collected_at: None,
        }
    }

    #[must_use]
    pub fn at(mut self, collected_at: Timestamp) -> Self {
        self.collected_at = Some(collected_at);
        self
    }

    /// Reduce the reading to a plain `(value, unit)` pair.
    ///
    /// A unit carried inside a [`RawValue::Quantity`] wins over the reading's
    /// own unit. Booleans become `1.0` / `0.0` and are dimensionless.
    #[must_use]
    pub fn resolve(&self) -> (f64, String) {
        match &self.value {
            RawValue::Number(value) => (*value, self.unit.clone().unwrap_or_default()),
            RawValue::Bool(flag) => (if *flag { 1.0 } else { 0.0 }, "boolean".to_string()),
            RawValue::Quantity { magnitude, unit } => (
                *magnitude,
                unit.clone()
                    .or_else(|| self.unit.clone())
                    .unwrap_or_default(),
            ),
        }
    }
}
