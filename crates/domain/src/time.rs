//! Time and timestamp helpers.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// UTC timestamp used for `collected_at`, `fired_at`, cycle start times, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert a [`std::time::Duration`] into a signed [`chrono::Duration`],
/// saturating at the maximum representable value.
#[must_use]
pub fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Drop sub-microsecond precision, the finest resolution [`encode`] keeps.
///
/// Timestamps are truncated once when they enter the system so a stored
/// value reads back equal to the one written.
#[must_use]
pub fn truncate(ts: Timestamp) -> Timestamp {
    ts.trunc_subsecs(6)
}

/// Fixed-width RFC 3339 encoding (microsecond precision, `Z` suffix).
///
/// Text comparison of two encoded values matches chronological order, which
/// the store relies on for range queries and uniqueness.
#[must_use]
pub fn encode(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Serde helper encoding a [`std::time::Duration`] as fractional seconds.
///
/// Used for timeouts, windows and cooldowns in config files and the
/// management API, e.g. `timeout = 2.5`.
pub mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    /// # Errors
    ///
    /// Fails on negative, NaN or overflowing values.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
