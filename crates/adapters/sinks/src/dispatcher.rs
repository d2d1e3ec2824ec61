//! Routes action descriptors to the sink that handles them.

use aggregator_app::ports::{ActionSink, FiringContext};
use aggregator_domain::error::ActionSinkFailure;
use aggregator_domain::rule::ActionDescriptor;

use crate::config::SinksConfig;
use crate::error::SinkError;
use crate::log::LogSink;
use crate::templating::TemplateContext;
use crate::webhook::{WebhookRequest, WebhookSink};

/// The process-wide [`ActionSink`].
///
/// Webhooks can be switched off, in which case webhook actions fail with
/// [`ActionSinkFailure::Unsupported`] and the rule retries next tick.
#[derive(Debug, Clone)]
pub struct SinkDispatcher {
    webhook: Option<WebhookSink>,
    log: LogSink,
}

impl SinkDispatcher {
    /// # Errors
    ///
    /// Returns [`SinkError`] if the webhook client cannot be built.
    pub fn new(config: &SinksConfig) -> Result<Self, SinkError> {
        let webhook = if config.webhooks_enabled {
            Some(WebhookSink::new(config)?)
        } else {
            None
        };
        Ok(Self {
            webhook,
            log: LogSink::default(),
        })
    }
}

impl ActionSink for SinkDispatcher {
    async fn dispatch(
        &self,
        action: &ActionDescriptor,
        context: &FiringContext,
    ) -> Result<(), ActionSinkFailure> {
        let template_context = TemplateContext::from(context);
        match action {
            ActionDescriptor::Webhook {
                url,
                method,
                headers,
                body_template,
            } => {
                let Some(webhook) = &self.webhook else {
                    return Err(ActionSinkFailure::Unsupported { kind: action.kind() });
                };
                let request = WebhookRequest {
                    url,
                    method: *method,
                    headers,
                    body_template: body_template.as_deref(),
                };
                webhook.send(request, &template_context).await
            }
            ActionDescriptor::Log { level, template } => self
                .log
                .emit(*level, template, &template_context)
                .map(|_| ()),
        }
    }
}
