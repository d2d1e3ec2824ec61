//! `SQLite` implementation of [`EndpointRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use aggregator_app::ports::EndpointRepository;
use aggregator_domain::endpoint::Endpoint;
use aggregator_domain::error::{AggregatorError, ConfigurationError, NotFoundError};
use aggregator_domain::id::EndpointId;
use aggregator_domain::time;

use crate::codec::{decode_error, decode_millis, decode_timestamp, encode_millis};
use crate::error::StorageError;

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(Endpoint);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Endpoint> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let timeout_ms: i64 = row.try_get("timeout_ms")?;
        let registered_at: String = row.try_get("registered_at")?;

        Ok(Self(Endpoint {
            id: EndpointId::from_str(&id).map_err(decode_error)?,
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            api_key: row.try_get("api_key")?,
            timeout: decode_millis(timeout_ms)?,
            colour: row.try_get("colour")?,
            enabled: row.try_get("enabled")?,
            registered_at: decode_timestamp(&registered_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO endpoints (id, name, url, api_key, timeout_ms, colour, enabled, registered_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM endpoints WHERE id = ?";
const SELECT_BY_URL: &str = "SELECT * FROM endpoints WHERE url = ?";
const SELECT_ALL: &str = "SELECT * FROM endpoints ORDER BY seq";
const SELECT_ENABLED: &str = "SELECT * FROM endpoints WHERE enabled = 1 ORDER BY seq";

const UPDATE: &str = r"
    UPDATE endpoints
    SET name = ?, url = ?, api_key = ?, timeout_ms = ?, colour = ?, enabled = ?
    WHERE id = ?
";

/// `SQLite`-backed endpoint registry.
///
/// Registration order is the insertion order (`seq`), and URL uniqueness is
/// enforced by the table's `UNIQUE` constraint rather than a prior lookup.
pub struct SqliteEndpointRepository {
    pool: SqlitePool,
}

impl SqliteEndpointRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn duplicate_or_storage(err: sqlx::Error, url: &str) -> AggregatorError {
    let err = StorageError::from(err);
    if err.is_unique_violation() {
        ConfigurationError::DuplicateEndpoint {
            url: url.to_string(),
        }
        .into()
    } else {
        err.into()
    }
}

impl EndpointRepository for SqliteEndpointRepository {
    async fn create(&self, endpoint: Endpoint) -> Result<Endpoint, AggregatorError> {
        sqlx::query(INSERT)
            .bind(endpoint.id.to_string())
            .bind(&endpoint.name)
            .bind(&endpoint.url)
            .bind(endpoint.api_key.as_deref())
            .bind(encode_millis(endpoint.timeout))
            .bind(endpoint.colour.as_deref())
            .bind(endpoint.enabled)
            .bind(time::encode(endpoint.registered_at))
            .execute(&self.pool)
            .await
            .map_err(|err| duplicate_or_storage(err, &endpoint.url))?;

        Ok(endpoint)
    }

    async fn get_by_id(&self, id: EndpointId) -> Result<Option<Endpoint>, AggregatorError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Endpoint>, AggregatorError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_URL)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn list(&self, enabled_only: bool) -> Result<Vec<Endpoint>, AggregatorError> {
        let sql = if enabled_only {
            SELECT_ENABLED
        } else {
            SELECT_ALL
        };
        let rows: Vec<Wrapper> = sqlx::query_as(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, endpoint: Endpoint) -> Result<Endpoint, AggregatorError> {
        let result = sqlx::query(UPDATE)
            .bind(&endpoint.name)
            .bind(&endpoint.url)
            .bind(endpoint.api_key.as_deref())
            .bind(encode_millis(endpoint.timeout))
            .bind(endpoint.colour.as_deref())
            .bind(endpoint.enabled)
            .bind(endpoint.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| duplicate_or_storage(err, &endpoint.url))?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Endpoint",
                id: endpoint.id.to_string(),
            }
            .into());
        }

        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqliteEndpointRepository {
        let db = Config::in_memory().build().await.unwrap();
        SqliteEndpointRepository::new(db.pool().clone())
    }

    fn endpoint(url: &str) -> Endpoint {
        Endpoint::builder().url(url).build().unwrap()
    }

    #[tokio::test]
    async fn should_create_and_get_endpoint_when_valid() {
        let repo = setup().await;
        let created = Endpoint::builder()
            .name("Attic")
            .url("http://attic.local:8080/")
            .api_key("s3cret")
            .timeout(Duration::from_millis(2_500))
            .colour("#ff8800")
            .build()
            .unwrap();

        repo.create(created.clone()).await.unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();

        assert_eq!(found.name, "Attic");
        assert_eq!(found.url, created.url);
        assert_eq!(found.api_key.as_deref(), Some("s3cret"));
        assert_eq!(found.timeout, Duration::from_millis(2_500));
        assert_eq!(found.colour.as_deref(), Some("#ff8800"));
        assert!(found.enabled);
        assert_eq!(
            found.registered_at.timestamp_micros(),
            created.registered_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn should_reject_duplicate_url_when_registered_twice() {
        let repo = setup().await;
        repo.create(endpoint("http://a.local/")).await.unwrap();

        let result = repo.create(endpoint("http://a.local/")).await;

        assert!(matches!(
            result,
            Err(AggregatorError::Configuration(
                ConfigurationError::DuplicateEndpoint { .. }
            ))
        ));
        assert_eq!(repo.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_list_in_registration_order_and_filter_disabled() {
        let repo = setup().await;
        let first = repo.create(endpoint("http://c.local/")).await.unwrap();
        let mut second = repo.create(endpoint("http://a.local/")).await.unwrap();
        let third = repo.create(endpoint("http://b.local/")).await.unwrap();

        second.enabled = false;
        repo.update(second.clone()).await.unwrap();

        let all: Vec<EndpointId> = repo
            .list(false)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(all, [first.id, second.id, third.id]);

        let enabled: Vec<EndpointId> = repo
            .list(true)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(enabled, [first.id, third.id]);
    }

    #[tokio::test]
    async fn should_find_endpoint_by_url() {
        let repo = setup().await;
        let created = repo.create(endpoint("http://a.local/")).await.unwrap();

        let found = repo.find_by_url("http://a.local/").await.unwrap();
        assert_eq!(found.map(|e| e.id), Some(created.id));
        assert!(repo.find_by_url("http://b.local/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_return_not_found_when_updating_unknown_endpoint() {
        let repo = setup().await;
        let result = repo.update(endpoint("http://ghost.local/")).await;
        assert!(matches!(result, Err(AggregatorError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_clear_optional_fields_on_update() {
        let repo = setup().await;
        let mut created = repo
            .create(
                Endpoint::builder()
                    .url("http://a.local/")
                    .api_key("token")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        created.api_key = None;
        repo.update(created.clone()).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert!(found.api_key.is_none());
    }
}
