//! Endpoint registry — use-cases for registering and managing endpoints.

use aggregator_domain::endpoint::{Endpoint, EndpointUpdate, canonical_url};
use aggregator_domain::error::{AggregatorError, ConfigurationError, NotFoundError};
use aggregator_domain::id::EndpointId;

use crate::ports::EndpointRepository;

/// Operator-facing registry of sensor endpoints.
///
/// Endpoints are never deleted; [`EndpointRegistry::disable`] removes one
/// from collection while keeping its history addressable.
pub struct EndpointRegistry<R> {
    repo: R,
}

impl<R: EndpointRepository> EndpointRegistry<R> {
    /// Create a new registry backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Register a new endpoint after validating it.
    ///
    /// URLs are compared in canonical form, so two spellings of the same
    /// address are duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::Configuration`] if the endpoint is invalid
    /// or its URL is already registered, or a storage error.
    #[tracing::instrument(skip(self, endpoint), fields(url = %endpoint.url))]
    pub async fn register(&self, mut endpoint: Endpoint) -> Result<Endpoint, AggregatorError> {
        endpoint.validate()?;
        endpoint.url = canonical_url(&endpoint.url)?;
        if self.repo.find_by_url(&endpoint.url).await?.is_some() {
            return Err(ConfigurationError::DuplicateEndpoint { url: endpoint.url }.into());
        }
        let created = self.repo.create(endpoint).await?;
        tracing::info!(endpoint_id = %created.id, name = %created.name, "endpoint registered");
        Ok(created)
    }

    /// Look up an endpoint by id.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`] when no endpoint with `id`
    /// exists, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: EndpointId) -> Result<Endpoint, AggregatorError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Endpoint",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List endpoints in registration order.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self, enabled_only: bool) -> Result<Vec<Endpoint>, AggregatorError> {
        self.repo.list(enabled_only).await
    }

    /// Include an endpoint in the next collection cycles.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`] or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn enable(&self, id: EndpointId) -> Result<Endpoint, AggregatorError> {
        self.set_enabled(id, true).await
    }

    /// Exclude an endpoint from collection without forgetting it.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`] or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn disable(&self, id: EndpointId) -> Result<Endpoint, AggregatorError> {
        self.set_enabled(id, false).await
    }

    /// Edit an endpoint's name, API key, timeout or colour.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`], a configuration error when
    /// the edited endpoint is invalid, or a storage error.
    #[tracing::instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: EndpointId,
        update: EndpointUpdate,
    ) -> Result<Endpoint, AggregatorError> {
        let mut endpoint = self.get(id).await?;
        endpoint.apply(update)?;
        self.repo.update(endpoint).await
    }

    async fn set_enabled(&self, id: EndpointId, enabled: bool) -> Result<Endpoint, AggregatorError> {
        let mut endpoint = self.get(id).await?;
        if endpoint.enabled == enabled {
            return Ok(endpoint);
        }
        endpoint.enabled = enabled;
        let updated = self.repo.update(endpoint).await?;
        tracing::info!(endpoint_id = %id, enabled, "endpoint toggled");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::InMemoryEndpointRepo;

    fn make_registry() -> EndpointRegistry<InMemoryEndpointRepo> {
        EndpointRegistry::new(InMemoryEndpointRepo::default())
    }

    fn endpoint(url: &str) -> Endpoint {
        Endpoint::builder().url(url).build().unwrap()
    }

    #[tokio::test]
    async fn should_register_endpoint_when_valid() {
        let registry = make_registry();
        let created = registry
            .register(endpoint("http://a.local/"))
            .await
            .unwrap();
        let fetched = registry.get(created.id).await.unwrap();
        assert_eq!(fetched.url, "http://a.local/");
    }

    #[tokio::test]
    async fn should_reject_duplicate_url() {
        let registry = make_registry();
        registry.register(endpoint("http://a.local/")).await.unwrap();
        let result = registry.register(endpoint("http://a.local/")).await;
        assert!(matches!(
            result,
            Err(AggregatorError::Configuration(
                ConfigurationError::DuplicateEndpoint { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn should_reject_other_spelling_of_registered_url() {
        let registry = make_registry();
        registry.register(endpoint("http://a.local")).await.unwrap();

        for raw in ["http://a.local/", "HTTP://A.LOCAL:80/"] {
            let mut spelled = endpoint("http://placeholder.local/");
            spelled.url = raw.to_string();
            let result = registry.register(spelled).await;
            assert!(matches!(
                result,
                Err(AggregatorError::Configuration(
                    ConfigurationError::DuplicateEndpoint { .. }
                ))
            ));
        }
        assert_eq!(registry.list(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_list_in_registration_order() {
        let registry = make_registry();
        for url in ["http://c.local/", "http://a.local/", "http://b.local/"] {
            registry.register(endpoint(url)).await.unwrap();
        }
        let urls: Vec<String> = registry
            .list(false)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.url)
            .collect();
        assert_eq!(
            urls,
            vec!["http://c.local/", "http://a.local/", "http://b.local/"]
        );
    }

    #[tokio::test]
    async fn should_exclude_disabled_endpoints_when_enabled_only() {
        let registry = make_registry();
        let a = registry.register(endpoint("http://a.local/")).await.unwrap();
        registry.register(endpoint("http://b.local/")).await.unwrap();
        registry.disable(a.id).await.unwrap();

        let enabled = registry.list(true).await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].url, "http://b.local/");
        assert_eq!(registry.list(false).await.unwrap().len(), 2);

        registry.enable(a.id).await.unwrap();
        assert_eq!(registry.list(true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_return_not_found_when_disabling_unknown_endpoint() {
        let registry = make_registry();
        let result = registry.disable(EndpointId::new()).await;
        assert!(matches!(result, Err(AggregatorError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_update_timeout_and_keep_url() {
        let registry = make_registry();
        let created = registry.register(endpoint("http://a.local/")).await.unwrap();
        let updated = registry
            .update(
                created.id,
                EndpointUpdate {
                    timeout: Some(Duration::from_secs(2)),
                    ..EndpointUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.timeout, Duration::from_secs(2));
        assert_eq!(updated.url, "http://a.local/");
    }
}
