//! Endpoint repository port — persistence for the endpoint registry.

use std::future::Future;
use std::sync::Arc;

use aggregator_domain::endpoint::Endpoint;
use aggregator_domain::error::AggregatorError;
use aggregator_domain::id::EndpointId;

/// Repository for persisting and querying [`Endpoint`]s.
pub trait EndpointRepository {
    /// Store a new endpoint.
    ///
    /// Must reject a URL that is already registered with
    /// `ConfigurationError::DuplicateEndpoint`, atomically with the insert.
    fn create(
        &self,
        endpoint: Endpoint,
    ) -> impl Future<Output = Result<Endpoint, AggregatorError>> + Send;

    fn get_by_id(
        &self,
        id: EndpointId,
    ) -> impl Future<Output = Result<Option<Endpoint>, AggregatorError>> + Send;

    fn find_by_url(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<Endpoint>, AggregatorError>> + Send;

    /// All endpoints in registration order, optionally only the enabled ones.
    fn list(
        &self,
        enabled_only: bool,
    ) -> impl Future<Output = Result<Vec<Endpoint>, AggregatorError>> + Send;

    /// Replace an existing endpoint's mutable fields.
    fn update(
        &self,
        endpoint: Endpoint,
    ) -> impl Future<Output = Result<Endpoint, AggregatorError>> + Send;
}

impl<T: EndpointRepository + Send + Sync> EndpointRepository for Arc<T> {
    fn create(
        &self,
        endpoint: Endpoint,
    ) -> impl Future<Output = Result<Endpoint, AggregatorError>> + Send {
        (**self).create(endpoint)
    }

    fn get_by_id(
        &self,
        id: EndpointId,
    ) -> impl Future<Output = Result<Option<Endpoint>, AggregatorError>> + Send {
        (**self).get_by_id(id)
    }

    fn find_by_url(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<Endpoint>, AggregatorError>> + Send {
        (**self).find_by_url(url)
    }

    fn list(
        &self,
        enabled_only: bool,
    ) -> impl Future<Output = Result<Vec<Endpoint>, AggregatorError>> + Send {
        (**self).list(enabled_only)
    }

    fn update(
        &self,
        endpoint: Endpoint,
    ) -> impl Future<Output = Result<Endpoint, AggregatorError>> + Send {
        (**self).update(endpoint)
    }
}
