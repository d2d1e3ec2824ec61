//! Wire formats served by sensor endpoints.
//!
//! Two shapes are accepted:
//!
//! ```json
//! { "temperature": { "value": 21.5, "unit": "celsius", "timestamp": "2020-04-01T10:00:00Z" },
//!   "ac_status": true }
//! ```
//!
//! ```json
//! { "sensors": [ { "id": "temperature", "value": 21.5, "unit": "celsius",
//!                  "collected_at": "2020-04-01T10:00:00" } ] }
//! ```
//!
//! Values may be numbers, booleans or `{ "magnitude": …, "unit": … }`
//! objects. Sensors reporting anything else (strings, lists, `null`) are
//! skipped; a body that matches neither shape fails the whole fetch.

use std::collections::BTreeMap;

use aggregator_domain::cycle::EndpointFailure;
use aggregator_domain::reading::{RawReading, RawValue};
use aggregator_domain::time::Timestamp;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    List { sensors: Vec<ListEntry> },
    Map(BTreeMap<String, MapEntry>),
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    id: String,
    value: Value,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    collected_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MapEntry {
    Detailed {
        value: Value,
        #[serde(default)]
        unit: Option<String>,
        #[serde(default, alias = "collected_at")]
        timestamp: Option<String>,
    },
    Bare(Value),
}

impl From<(String, MapEntry)> for ListEntry {
    fn from((id, entry): (String, MapEntry)) -> Self {
        match entry {
            MapEntry::Detailed {
                value,
                unit,
                timestamp,
            } => Self {
                id,
                value,
                unit,
                collected_at: timestamp,
            },
            MapEntry::Bare(value) => Self {
                id,
                value,
                unit: None,
                collected_at: None,
            },
        }
    }
}

/// Decode a response body into raw readings. List payloads keep their
/// order, map payloads come out sorted by sensor name.
///
/// # Errors
///
/// Returns [`EndpointFailure::MalformedPayload`] when the body is not one of
/// the known shapes or a timestamp cannot be parsed.
pub fn decode(body: &[u8]) -> Result<Vec<RawReading>, EndpointFailure> {
    let payload: Payload = serde_json::from_slice(body).map_err(malformed)?;

    let entries: Vec<ListEntry> = match payload {
        Payload::List { sensors } => sensors,
        Payload::Map(map) => map.into_iter().map(ListEntry::from).collect(),
    };

    let mut readings = Vec::with_capacity(entries.len());
    for entry in entries {
        let Ok(value) = serde_json::from_value::<RawValue>(entry.value) else {
            tracing::debug!(sensor = %entry.id, "skipping non-numeric sensor");
            continue;
        };
        let collected_at = entry
            .collected_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        readings.push(RawReading {
            sensor_name: entry.id,
            value,
            unit: entry.unit,
            collected_at,
        });
    }
    Ok(readings)
}

/// RFC 3339 with an offset, or a naive ISO 8601 date-time taken as UTC.
fn parse_timestamp(raw: &str) -> Result<Timestamp, EndpointFailure> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|err| EndpointFailure::MalformedPayload {
            message: format!("invalid timestamp {raw:?}: {err}"),
        })
}

fn malformed(err: serde_json::Error) -> EndpointFailure {
    EndpointFailure::MalformedPayload {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ten_oclock() -> Timestamp {
        Utc.with_ymd_and_hms(2020, 4, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn should_decode_map_payload() {
        let body = br#"{
            "temperature": {"value": 21.5, "unit": "celsius", "timestamp": "2020-04-01T10:00:00Z"},
            "ac_status": true
        }"#;

        let readings = decode(body).unwrap();

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].sensor_name, "ac_status");
        assert_eq!(readings[0].value, RawValue::Bool(true));
        assert_eq!(readings[1].sensor_name, "temperature");
        assert_eq!(readings[1].value, RawValue::Number(21.5));
        assert_eq!(readings[1].unit.as_deref(), Some("celsius"));
        assert_eq!(readings[1].collected_at, Some(ten_oclock()));
    }

    #[test]
    fn should_decode_list_payload_with_quantities() {
        let body = br#"{"sensors": [
            {"id": "RAMAvailable", "value": {"magnitude": 2048, "unit": "megabyte"}},
            {"id": "Temperature", "value": 70.1, "unit": "degF", "collected_at": "2020-04-01T10:00:00"}
        ]}"#;

        let readings = decode(body).unwrap();

        assert_eq!(readings.len(), 2);
        assert_eq!(
            readings[0].resolve(),
            (2048.0, "megabyte".to_string())
        );
        assert_eq!(readings[0].collected_at, None);
        assert_eq!(readings[1].collected_at, Some(ten_oclock()));
    }

    #[test]
    fn should_skip_non_numeric_sensors() {
        let body = br#"{"sensors": [
            {"id": "PythonVersion", "value": [3, 8, 0, "final", 0]},
            {"id": "Uptime", "value": 3600, "unit": "s"},
            {"id": "Note", "value": null}
        ]}"#;

        let readings = decode(body).unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].sensor_name, "Uptime");
    }

    #[test]
    fn should_reject_body_of_unknown_shape() {
        let result = decode(br#"["not", "a", "payload"]"#);
        assert!(matches!(
            result,
            Err(EndpointFailure::MalformedPayload { .. })
        ));
    }

    #[test]
    fn should_reject_invalid_json() {
        assert!(matches!(
            decode(b"<html>oops</html>"),
            Err(EndpointFailure::MalformedPayload { .. })
        ));
    }

    #[test]
    fn should_reject_unparseable_timestamp() {
        let body = br#"{"temperature": {"value": 1.0, "timestamp": "yesterday"}}"#;
        assert!(matches!(
            decode(body),
            Err(EndpointFailure::MalformedPayload { .. })
        ));
    }
}
