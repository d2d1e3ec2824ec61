//! Column encodings shared by the repositories.

use std::time::Duration;

use aggregator_domain::time::Timestamp;

pub(crate) fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.to_utc())
        .map_err(decode_error)
}

/// Durations are stored as whole milliseconds.
pub(crate) fn encode_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn decode_millis(raw: i64) -> Result<Duration, sqlx::Error> {
    u64::try_from(raw)
        .map(Duration::from_millis)
        .map_err(decode_error)
}
