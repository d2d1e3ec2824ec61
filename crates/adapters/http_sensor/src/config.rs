//! Configuration for the HTTP sensor source.

use serde::Deserialize;

/// Settings shared by every endpoint fetch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSensorConfig {
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Header carrying the endpoint's API key.
    pub api_key_header: String,
    /// Path joined onto the endpoint URL, e.g. `v/2.1/sensors/`. Empty means
    /// the endpoint URL itself serves the readings.
    pub sensors_path: String,
}

impl Default for HttpSensorConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("aggregatord/", env!("CARGO_PKG_VERSION")).to_string(),
            api_key_header: "X-API-KEY".to_string(),
            sensors_path: String::new(),
        }
    }
}
