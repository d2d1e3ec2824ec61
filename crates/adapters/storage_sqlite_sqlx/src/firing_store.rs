//! `SQLite` implementation of [`FiringStore`].

use sqlx::SqlitePool;

use aggregator_app::ports::FiringStore;
use aggregator_domain::error::AggregatorError;
use aggregator_domain::firing::ActionFiring;
use aggregator_domain::id::RuleId;
use aggregator_domain::time::{self, Timestamp};

use crate::codec::decode_timestamp;
use crate::error::StorageError;

const INSERT_OR_IGNORE: &str = "INSERT OR IGNORE INTO action_firings (rule_id, fired_at) VALUES (?, ?)";
const SELECT_LAST: &str = "SELECT MAX(fired_at) FROM action_firings WHERE rule_id = ?";

/// `SQLite`-backed firing log. Only the most recent firing per rule is ever
/// read back, but every firing is kept.
pub struct SqliteFiringStore {
    pool: SqlitePool,
}

impl SqliteFiringStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl FiringStore for SqliteFiringStore {
    async fn record_firing(&self, firing: ActionFiring) -> Result<bool, AggregatorError> {
        let result = sqlx::query(INSERT_OR_IGNORE)
            .bind(firing.rule_id.to_string())
            .bind(time::encode(firing.fired_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn last_firing(&self, rule_id: RuleId) -> Result<Option<Timestamp>, AggregatorError> {
        let last: Option<String> = sqlx::query_scalar(SELECT_LAST)
            .bind(rule_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let last = last
            .as_deref()
            .map(decode_timestamp)
            .transpose()
            .map_err(StorageError::from)?;
        Ok(last)
    }
}
