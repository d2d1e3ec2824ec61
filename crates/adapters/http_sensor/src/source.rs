//! [`SensorSource`] over HTTP.

use aggregator_app::ports::SensorSource;
use aggregator_domain::cycle::EndpointFailure;
use aggregator_domain::endpoint::Endpoint;
use aggregator_domain::reading::RawReading;
use aggregator_domain::time::{self, Timestamp};
use reqwest::Url;
use reqwest::header::HeaderName;

use crate::config::HttpSensorConfig;
use crate::error::HttpSensorError;
use crate::payload;

/// Fetches readings with a shared, connection-pooling [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpSensorSource {
    client: reqwest::Client,
    api_key_header: HeaderName,
    sensors_path: String,
}

impl HttpSensorSource {
    /// Build the source and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`HttpSensorError`] if the header name is invalid or the
    /// client cannot be built.
    pub fn new(config: &HttpSensorConfig) -> Result<Self, HttpSensorError> {
        let api_key_header = HeaderName::from_bytes(config.api_key_header.as_bytes())
            .map_err(|_| HttpSensorError::InvalidHeader(config.api_key_header.clone()))?;
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            api_key_header,
            sensors_path: config.sensors_path.clone(),
        })
    }

    fn url_for(&self, endpoint: &Endpoint) -> Result<Url, EndpointFailure> {
        let base = Url::parse(&endpoint.url).map_err(|err| EndpointFailure::Transport {
            message: format!("invalid url: {err}"),
        })?;
        if self.sensors_path.is_empty() {
            return Ok(base);
        }
        base.join(&self.sensors_path)
            .map_err(|err| EndpointFailure::Transport {
                message: format!("invalid sensors path: {err}"),
            })
    }

    async fn get(&self, endpoint: &Endpoint, url: Url) -> Result<Vec<RawReading>, EndpointFailure> {
        let mut request = self.client.get(url).timeout(endpoint.timeout);
        if let Some(api_key) = &endpoint.api_key {
            request = request.header(self.api_key_header.clone(), api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| transport_failure(&err, endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                endpoint_id = %endpoint.id,
                %status,
                body = %body.chars().take(200).collect::<String>(),
                "endpoint returned non-2xx status"
            );
            return Err(EndpointFailure::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| transport_failure(&err, endpoint))?;
        payload::decode(&body)
    }
}

fn transport_failure(err: &reqwest::Error, endpoint: &Endpoint) -> EndpointFailure {
    if err.is_timeout() {
        return EndpointFailure::Timeout {
            timeout: endpoint.timeout,
        };
    }
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    EndpointFailure::Transport { message }
}

impl SensorSource for HttpSensorSource {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<RawReading>, EndpointFailure> {
        let url = self.url_for(endpoint)?;
        self.get(endpoint, url).await
    }

    /// Asks the endpoint for history with `?since=`; endpoints that ignore
    /// the parameter still only contribute newer readings.
    async fn fetch_since(
        &self,
        endpoint: &Endpoint,
        since: Timestamp,
    ) -> Result<Vec<RawReading>, EndpointFailure> {
        let mut url = self.url_for(endpoint)?;
        url.query_pairs_mut()
            .append_pair("since", &time::encode(since));
        let readings = self.get(endpoint, url).await?;
        Ok(readings
            .into_iter()
            .filter(|r| r.collected_at.is_none_or(|ts| ts > since))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::Router;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use chrono::{TimeZone, Utc};

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/")
    }

    fn source() -> HttpSensorSource {
        HttpSensorSource::new(&HttpSensorConfig::default()).unwrap()
    }

    fn endpoint(url: &str) -> Endpoint {
        Endpoint::builder()
            .url(url)
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    async fn guarded(headers: HeaderMap) -> impl IntoResponse {
        if headers.get("x-api-key").and_then(|v| v.to_str().ok()) == Some("testing") {
            (
                StatusCode::OK,
                r#"{"sensors": [{"id": "Temperature", "value": 21.5, "unit": "celsius"}]}"#,
            )
        } else {
            (
                StatusCode::FORBIDDEN,
                r#"{"error": "Supply API key in X-API-Key header"}"#,
            )
        }
    }

    #[tokio::test]
    async fn should_fetch_readings_with_api_key() {
        let url = serve(Router::new().route("/", get(guarded))).await;
        let endpoint = Endpoint::builder()
            .url(&url)
            .api_key("testing")
            .build()
            .unwrap();

        let readings = source().fetch(&endpoint).await.unwrap();

        assert_eq!(readings, [RawReading::number("Temperature", 21.5, "celsius")]);
    }

    #[tokio::test]
    async fn should_report_status_when_api_key_is_wrong() {
        let url = serve(Router::new().route("/", get(guarded))).await;
        let endpoint = Endpoint::builder()
            .url(&url)
            .api_key("incorrect")
            .build()
            .unwrap();

        let result = source().fetch(&endpoint).await;

        assert_eq!(result, Err(EndpointFailure::Status { status: 403 }));
    }

    #[tokio::test]
    async fn should_join_configured_sensors_path() {
        let router = Router::new().route(
            "/v/2.1/sensors/",
            get(|| async { r#"{"ac_status": false}"# }),
        );
        let url = serve(router).await;
        let source = HttpSensorSource::new(&HttpSensorConfig {
            sensors_path: "v/2.1/sensors/".to_string(),
            ..HttpSensorConfig::default()
        })
        .unwrap();

        let readings = source.fetch(&endpoint(&url)).await.unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].sensor_name, "ac_status");
    }

    #[tokio::test]
    async fn should_report_malformed_payload() {
        let url = serve(Router::new().route("/", get(|| async { "not json" }))).await;

        let result = source().fetch(&endpoint(&url)).await;

        assert!(matches!(
            result,
            Err(EndpointFailure::MalformedPayload { .. })
        ));
    }

    #[tokio::test]
    async fn should_report_transport_failure_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = source().fetch(&endpoint(&format!("http://{addr}/"))).await;

        assert!(matches!(result, Err(EndpointFailure::Transport { .. })));
    }

    #[tokio::test]
    async fn should_report_timeout_when_endpoint_is_slow() {
        let router = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let url = serve(router).await;
        let endpoint = Endpoint::builder()
            .url(&url)
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();

        let result = source().fetch(&endpoint).await;

        assert_eq!(
            result,
            Err(EndpointFailure::Timeout {
                timeout: Duration::from_millis(100)
            })
        );
    }

    #[tokio::test]
    async fn should_pass_since_and_drop_older_readings() {
        let router = Router::new().route(
            "/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(
                    params.get("since").map(String::as_str),
                    Some("2020-04-01T10:00:00.000000Z")
                );
                r#"{"sensors": [
                    {"id": "t", "value": 1, "collected_at": "2020-04-01T09:59:00Z"},
                    {"id": "t", "value": 2, "collected_at": "2020-04-01T10:00:00Z"},
                    {"id": "t", "value": 3, "collected_at": "2020-04-01T10:01:00Z"}
                ]}"#
            }),
        );
        let url = serve(router).await;
        let since = Utc.with_ymd_and_hms(2020, 4, 1, 10, 0, 0).unwrap();

        let readings = source().fetch_since(&endpoint(&url), since).await.unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(
            readings[0].collected_at,
            Some(Utc.with_ymd_and_hms(2020, 4, 1, 10, 1, 0).unwrap())
        );
    }
}
