//! Action descriptor — which sink to invoke when a rule fires, and with what.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// HTTP verb used by webhook actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    #[default]
    Post,
    Put,
    Patch,
    Get,
}

/// Severity used by log actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// A side effect performed by an action sink.
///
/// Templates are rendered against the firing context (`rule.id`,
/// `rule.name`, `fired_at`, `matches`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDescriptor {
    /// Send an HTTP request. Without a body template the firing context is
    /// sent as JSON.
    Webhook {
        url: String,
        #[serde(default)]
        method: WebhookMethod,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body_template: Option<String>,
    },
    /// Emit a log line.
    Log {
        #[serde(default)]
        level: LogLevel,
        template: String,
    },
}

impl ActionDescriptor {
    /// Short sink name, used for routing and in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Webhook { .. } => "webhook",
            Self::Log { .. } => "log",
        }
    }

    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when a webhook URL is not an absolute
    /// `http`/`https` URL, or when a template has a syntax error.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Self::Webhook {
                url, body_template, ..
            } => {
                let parsed =
                    url::Url::parse(url).map_err(|source| ConfigurationError::InvalidUrl {
                        url: url.clone(),
                        source,
                    })?;
                match parsed.scheme() {
                    "http" | "https" => {}
                    scheme => {
                        return Err(ConfigurationError::UnsupportedScheme {
                            url: url.clone(),
                            scheme: scheme.to_string(),
                        });
                    }
                }
                body_template.as_deref().map_or(Ok(()), check_template)
            }
            Self::Log { template, .. } => check_template(template),
        }
    }
}

/// Compile a template without rendering it. Variables are resolved only
/// when the rule fires.
fn check_template(source: &str) -> Result<(), ConfigurationError> {
    minijinja::Environment::new()
        .template_from_str(source)
        .map(drop)
        .map_err(|err| ConfigurationError::InvalidTemplate {
            message: err.to_string(),
        })
}

impl std::fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webhook { url, method, .. } => write!(f, "webhook({method:?} {url})"),
            Self::Log { level, .. } => write!(f, "log({level:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_webhook_to_post() {
        let json = serde_json::json!({
            "type": "webhook",
            "url": "https://hooks.example.com/alert"
        });
        let action: ActionDescriptor = serde_json::from_value(json).unwrap();
        assert!(matches!(
            action,
            ActionDescriptor::Webhook {
                method: WebhookMethod::Post,
                body_template: None,
                ..
            }
        ));
        assert_eq!(action.kind(), "webhook");
    }

    #[test]
    fn should_reject_webhook_with_relative_url() {
        let action = ActionDescriptor::Webhook {
            url: "alert".to_string(),
            method: WebhookMethod::Post,
            headers: BTreeMap::new(),
            body_template: None,
        };
        assert!(matches!(
            action.validate(),
            Err(ConfigurationError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn should_reject_log_template_with_syntax_error() {
        let action = ActionDescriptor::Log {
            level: LogLevel::Info,
            template: "{{ rule.name ".to_string(),
        };
        assert!(matches!(
            action.validate(),
            Err(ConfigurationError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn should_reject_webhook_body_template_with_unclosed_block() {
        let action = ActionDescriptor::Webhook {
            url: "https://hooks.example.com/alert".to_string(),
            method: WebhookMethod::Post,
            headers: BTreeMap::new(),
            body_template: Some("{% for m in matches %}{{ m.value }}".to_string()),
        };
        assert!(matches!(
            action.validate(),
            Err(ConfigurationError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn should_deserialize_log_action_with_default_level() {
        let json = serde_json::json!({"type": "log", "template": "{{ rule.name }} fired"});
        let action: ActionDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(
            action,
            ActionDescriptor::Log {
                level: LogLevel::Info,
                template: "{{ rule.name }} fired".to_string()
            }
        );
        assert_eq!(action.validate(), Ok(()));
    }
}
