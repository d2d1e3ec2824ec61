//! `SQLite` implementation of [`RuleRepository`].
//!
//! Predicates and actions are stored as JSON documents so the predicate
//! language can grow without schema migrations.

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use aggregator_app::ports::RuleRepository;
use aggregator_domain::error::{AggregatorError, ConfigurationError, NotFoundError};
use aggregator_domain::id::RuleId;
use aggregator_domain::rule::{ActionDescriptor, Predicate, Rule};
use aggregator_domain::time;

use crate::codec::{decode_error, decode_millis, decode_timestamp, encode_millis};
use crate::error::StorageError;

struct Wrapper(Rule);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Rule> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let predicate_json: String = row.try_get("predicate")?;
        let action_json: String = row.try_get("action")?;
        let cooldown_ms: i64 = row.try_get("cooldown_ms")?;
        let created_at: String = row.try_get("created_at")?;

        let predicate: Predicate = serde_json::from_str(&predicate_json).map_err(decode_error)?;
        let action: ActionDescriptor = serde_json::from_str(&action_json).map_err(decode_error)?;

        Ok(Self(Rule {
            id: RuleId::from_str(&id).map_err(decode_error)?,
            name: row.try_get("name")?,
            enabled: row.try_get("enabled")?,
            predicate,
            action,
            cooldown: decode_millis(cooldown_ms)?,
            created_at: decode_timestamp(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO rules (id, name, enabled, predicate, action, cooldown_ms, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM rules WHERE id = ?";
const SELECT_BY_NAME: &str = "SELECT * FROM rules WHERE name = ?";
const SELECT_ALL: &str = "SELECT * FROM rules ORDER BY created_at, seq";
const SELECT_ENABLED: &str = "SELECT * FROM rules WHERE enabled = 1 ORDER BY created_at, seq";

const UPDATE: &str = r"
    UPDATE rules
    SET name = ?, enabled = ?, predicate = ?, action = ?, cooldown_ms = ?
    WHERE id = ?
";

/// `SQLite`-backed rule repository.
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_all(&self, sql: &'static str) -> Result<Vec<Rule>, AggregatorError> {
        let rows: Vec<Wrapper> = sqlx::query_as(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

fn duplicate_or_storage(err: sqlx::Error, name: &str) -> AggregatorError {
    let err = StorageError::from(err);
    if err.is_unique_violation() {
        ConfigurationError::DuplicateRule {
            name: name.to_string(),
        }
        .into()
    } else {
        err.into()
    }
}

impl RuleRepository for SqliteRuleRepository {
    async fn create(&self, rule: Rule) -> Result<Rule, AggregatorError> {
        let predicate_json = serde_json::to_string(&rule.predicate).map_err(StorageError::from)?;
        let action_json = serde_json::to_string(&rule.action).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(rule.id.to_string())
            .bind(&rule.name)
            .bind(rule.enabled)
            .bind(&predicate_json)
            .bind(&action_json)
            .bind(encode_millis(rule.cooldown))
            .bind(time::encode(rule.created_at))
            .execute(&self.pool)
            .await
            .map_err(|err| duplicate_or_storage(err, &rule.name))?;

        Ok(rule)
    }

    async fn get_by_id(&self, id: RuleId) -> Result<Option<Rule>, AggregatorError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Rule>, AggregatorError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_NAME)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Rule>, AggregatorError> {
        self.fetch_all(SELECT_ALL).await
    }

    async fn get_enabled(&self) -> Result<Vec<Rule>, AggregatorError> {
        self.fetch_all(SELECT_ENABLED).await
    }

    async fn update(&self, rule: Rule) -> Result<Rule, AggregatorError> {
        let predicate_json = serde_json::to_string(&rule.predicate).map_err(StorageError::from)?;
        let action_json = serde_json::to_string(&rule.action).map_err(StorageError::from)?;

        let result = sqlx::query(UPDATE)
            .bind(&rule.name)
            .bind(rule.enabled)
            .bind(&predicate_json)
            .bind(&action_json)
            .bind(encode_millis(rule.cooldown))
            .bind(rule.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| duplicate_or_storage(err, &rule.name))?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Rule",
                id: rule.id.to_string(),
            }
            .into());
        }

        Ok(rule)
    }
}
