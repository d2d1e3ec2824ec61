//! Endpoint — an independently owned HTTP service exposing sensor readings.
//!
//! Endpoints are created, edited and disabled by operators. They are never
//! deleted: disabling keeps the identity stable for the data points already
//! stored against it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AggregatorError, ConfigurationError};
use crate::id::EndpointId;
use crate::time::{Timestamp, now};

/// Request timeout used when an endpoint does not specify one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A sensor endpoint the collector polls on every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub name: String,
    pub url: String,
    /// Sent as the `X-API-KEY` header when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(with = "crate::time::seconds")]
    pub timeout: Duration,
    /// Display colour used by charting tools, e.g. `"#ff8800"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    pub enabled: bool,
    pub registered_at: Timestamp,
}

impl Endpoint {
    /// Create a builder for constructing an [`Endpoint`].
    #[must_use]
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Configuration`] when:
    /// - `name` is empty ([`ConfigurationError::EmptyName`])
    /// - `url` is not an absolute URL ([`ConfigurationError::InvalidUrl`])
    /// - `url` is not `http` or `https` ([`ConfigurationError::UnsupportedScheme`])
    /// - `timeout` is zero ([`ConfigurationError::ZeroTimeout`])
    pub fn validate(&self) -> Result<(), AggregatorError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName.into());
        }
        canonical_url(&self.url)?;
        if self.timeout.is_zero() {
            return Err(ConfigurationError::ZeroTimeout.into());
        }
        Ok(())
    }

    /// Apply an operator edit, then re-validate.
    ///
    /// The URL is part of the endpoint's identity and cannot be edited;
    /// register a new endpoint and disable this one instead.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Endpoint::validate`].
    pub fn apply(&mut self, update: EndpointUpdate) -> Result<(), AggregatorError> {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(api_key) = update.api_key {
            next.api_key = api_key;
        }
        if let Some(timeout) = update.timeout {
            next.timeout = timeout;
        }
        if let Some(colour) = update.colour {
            next.colour = colour;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Parse an endpoint URL and return its canonical spelling.
///
/// Scheme and host are lowercased, a default port is dropped and an empty
/// path becomes `/`, so `HTTP://Sensor.local:80` and `http://sensor.local/`
/// name the same endpoint.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidUrl`] for anything that is not an
/// absolute URL and [`ConfigurationError::UnsupportedScheme`] for schemes
/// other than `http` and `https`.
pub fn canonical_url(raw: &str) -> Result<String, ConfigurationError> {
    let parsed = url::Url::parse(raw).map_err(|source| ConfigurationError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.into()),
        other => Err(ConfigurationError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: other.to_string(),
        }),
    }
}

/// Partial edit of an endpoint. `None` leaves a field untouched; for the
/// optional fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    pub api_key: Option<Option<String>>,
    #[serde(default, with = "optional_seconds")]
    pub timeout: Option<Duration>,
    #[serde(default, with = "double_option")]
    pub colour: Option<Option<String>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Option<String>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<String>>, D::Error> {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

mod optional_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_f64(duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}

/// Step-by-step builder for [`Endpoint`].
#[derive(Debug, Default)]
pub struct EndpointBuilder {
    id: Option<EndpointId>,
    name: Option<String>,
    url: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    colour: Option<String>,
    enabled: Option<bool>,
    registered_at: Option<Timestamp>,
}

impl EndpointBuilder {
    #[must_use]
    pub fn id(mut self, id: EndpointId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn colour(mut self, colour: impl Into<String>) -> Self {
        self.colour = Some(colour.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn registered_at(mut self, ts: Timestamp) -> Self {
        self.registered_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`Endpoint`].
    ///
    /// The URL is stored in its [canonical](canonical_url) form. When no
    /// name is given that URL is used as the name.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Configuration`] if the endpoint is invalid.
    pub fn build(self) -> Result<Endpoint, AggregatorError> {
        let url = canonical_url(&self.url.unwrap_or_default())?;
        let endpoint = Endpoint {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_else(|| url.clone()),
            url,
            api_key: self.api_key,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            colour: self.colour,
            enabled: self.enabled.unwrap_or(true),
            registered_at: self.registered_at.unwrap_or_else(now),
        };
        endpoint.validate()?;
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Endpoint {
        Endpoint::builder()
            .name("Living room")
            .url("http://192.168.1.20:8081/v/2.1/sensors/")
            .api_key("secret")
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_enabled_endpoint_with_default_timeout() {
        let endpoint = sample();
        assert!(endpoint.enabled);
        assert_eq!(endpoint.timeout, DEFAULT_TIMEOUT);
        assert_eq!(endpoint.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn should_use_url_as_name_when_name_missing() {
        let endpoint = Endpoint::builder()
            .url("https://sensors.example.com/")
            .build()
            .unwrap();
        assert_eq!(endpoint.name, "https://sensors.example.com/");
    }

    #[test]
    fn should_store_equivalent_urls_identically() {
        let urls: Vec<String> = ["http://a.local", "http://a.local/", "HTTP://A.LOCAL:80/"]
            .into_iter()
            .map(|raw| Endpoint::builder().url(raw).build().unwrap().url)
            .collect();
        assert_eq!(urls, vec!["http://a.local/"; 3]);
    }

    #[test]
    fn should_keep_path_and_non_default_port() {
        let endpoint = Endpoint::builder()
            .url("http://Sensor.local:8081/v/2.1/sensors/")
            .build()
            .unwrap();
        assert_eq!(endpoint.url, "http://sensor.local:8081/v/2.1/sensors/");
    }

    #[test]
    fn should_reject_relative_url() {
        let result = Endpoint::builder().name("x").url("/sensors").build();
        assert!(matches!(
            result,
            Err(AggregatorError::Configuration(
                ConfigurationError::InvalidUrl { .. }
            ))
        ));
    }

    #[test]
    fn should_reject_non_http_scheme() {
        let result = Endpoint::builder()
            .name("x")
            .url("ftp://sensors.example.com/")
            .build();
        assert!(matches!(
            result,
            Err(AggregatorError::Configuration(
                ConfigurationError::UnsupportedScheme { .. }
            ))
        ));
    }

    #[test]
    fn should_reject_zero_timeout() {
        let result = Endpoint::builder()
            .url("http://sensor.local/")
            .timeout(Duration::ZERO)
            .build();
        assert!(matches!(
            result,
            Err(AggregatorError::Configuration(ConfigurationError::ZeroTimeout))
        ));
    }

    #[test]
    fn should_apply_update_when_valid() {
        let mut endpoint = sample();
        endpoint
            .apply(EndpointUpdate {
                name: Some("Kitchen".to_string()),
                api_key: Some(None),
                timeout: Some(Duration::from_secs(3)),
                colour: Some(Some("#00ff00".to_string())),
            })
            .unwrap();
        assert_eq!(endpoint.name, "Kitchen");
        assert!(endpoint.api_key.is_none());
        assert_eq!(endpoint.timeout, Duration::from_secs(3));
        assert_eq!(endpoint.colour.as_deref(), Some("#00ff00"));
    }

    #[test]
    fn should_leave_endpoint_untouched_when_update_invalid() {
        let mut endpoint = sample();
        let before = endpoint.clone();
        let result = endpoint.apply(EndpointUpdate {
            name: Some("Kitchen".to_string()),
            timeout: Some(Duration::ZERO),
            ..EndpointUpdate::default()
        });
        assert!(result.is_err());
        assert_eq!(endpoint, before);
    }

    #[test]
    fn should_distinguish_missing_and_null_in_update_json() {
        let update: EndpointUpdate =
            serde_json::from_str(r#"{"api_key": null, "timeout": 1.5}"#).unwrap();
        assert_eq!(update.api_key, Some(None));
        assert_eq!(update.colour, None);
        assert_eq!(update.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let endpoint = sample();
        let json = serde_json::to_string(&endpoint).unwrap();
        let parsed: Endpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, endpoint);
    }
}
