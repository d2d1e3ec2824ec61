//! Sensor source port — fetching raw readings from an endpoint.

use std::future::Future;
use std::sync::Arc;

use aggregator_domain::cycle::EndpointFailure;
use aggregator_domain::endpoint::Endpoint;
use aggregator_domain::reading::RawReading;
use aggregator_domain::time::Timestamp;

/// Fetches the current readings of one endpoint.
///
/// Implementations report every problem (transport, status, payload) as an
/// [`EndpointFailure`]; the collector applies the endpoint's timeout itself.
pub trait SensorSource: Send + Sync {
    fn fetch(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Vec<RawReading>, EndpointFailure>> + Send;

    /// Readings taken strictly after `since`.
    ///
    /// Sources that cannot serve history fall back to the current readings,
    /// filtered to those newer than `since`.
    fn fetch_since(
        &self,
        endpoint: &Endpoint,
        since: Timestamp,
    ) -> impl Future<Output = Result<Vec<RawReading>, EndpointFailure>> + Send {
        async move {
            let readings = self.fetch(endpoint).await?;
            Ok(readings
                .into_iter()
                .filter(|r| r.collected_at.is_none_or(|ts| ts > since))
                .collect())
        }
    }
}

impl<T: SensorSource> SensorSource for Arc<T> {
    fn fetch(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Vec<RawReading>, EndpointFailure>> + Send {
        (**self).fetch(endpoint)
    }

    fn fetch_since(
        &self,
        endpoint: &Endpoint,
        since: Timestamp,
    ) -> impl Future<Output = Result<Vec<RawReading>, EndpointFailure>> + Send {
        (**self).fetch_since(endpoint, since)
    }
}
