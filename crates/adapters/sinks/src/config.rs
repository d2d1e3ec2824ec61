//! Configuration for the action sinks.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// Disable to reject webhook actions instead of sending them.
    pub webhooks_enabled: bool,
    /// Upper bound on a single webhook request.
    #[serde(with = "aggregator_domain::time::seconds")]
    pub webhook_timeout: Duration,
    pub user_agent: String,
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            webhooks_enabled: true,
            webhook_timeout: Duration::from_secs(10),
            user_agent: concat!("aggregatord/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
