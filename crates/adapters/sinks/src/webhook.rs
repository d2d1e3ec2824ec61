//! HTTP webhook sink.

use std::collections::BTreeMap;

use aggregator_domain::error::ActionSinkFailure;
use aggregator_domain::rule::WebhookMethod;
use reqwest::Method;

use crate::config::SinksConfig;
use crate::error::SinkError;
use crate::templating::{TemplateContext, TemplateRenderer};

/// One webhook request, as described by a rule's action.
#[derive(Debug, Clone, Copy)]
pub struct WebhookRequest<'a> {
    pub url: &'a str,
    pub method: WebhookMethod,
    pub headers: &'a BTreeMap<String, String>,
    pub body_template: Option<&'a str>,
}

/// Sends firings over HTTP with a shared, connection-pooling client.
///
/// With a body template the rendered text is sent as-is; otherwise the
/// [`TemplateContext`] is sent as JSON.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    renderer: TemplateRenderer,
}

fn method(method: WebhookMethod) -> Method {
    match method {
        WebhookMethod::Post => Method::POST,
        WebhookMethod::Put => Method::PUT,
        WebhookMethod::Patch => Method::PATCH,
        WebhookMethod::Get => Method::GET,
    }
}

impl WebhookSink {
    /// # Errors
    ///
    /// Returns [`SinkError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &SinksConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.webhook_timeout)
            .build()?;
        Ok(Self {
            client,
            renderer: TemplateRenderer,
        })
    }

    /// Render and send one request. Any non-2xx answer is a rejection.
    ///
    /// # Errors
    ///
    /// Returns [`ActionSinkFailure`] when rendering fails, the target cannot
    /// be reached or it answers with a non-success status.
    pub async fn send(
        &self,
        request: WebhookRequest<'_>,
        context: &TemplateContext,
    ) -> Result<(), ActionSinkFailure> {
        let mut builder = self.client.request(method(request.method), request.url);
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body_template {
            Some(template) => builder.body(self.renderer.render(template, context)?),
            None => builder.json(context),
        };

        let response = builder
            .send()
            .await
            .map_err(|err| ActionSinkFailure::Transport(Box::new(err)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %request.url, %status, "webhook returned non-2xx status");
            return Err(ActionSinkFailure::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(url = %request.url, %status, "webhook delivered");
        Ok(())
    }
}
