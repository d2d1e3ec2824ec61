//! Log sink — turns a firing into a `tracing` event.

use aggregator_domain::error::ActionSinkFailure;
use aggregator_domain::rule::LogLevel;

use crate::templating::{TemplateContext, TemplateRenderer};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink {
    renderer: TemplateRenderer,
}

impl LogSink {
    /// Render the message and emit it under the `aggregator::action` target.
    ///
    /// # Errors
    ///
    /// Returns [`ActionSinkFailure::Render`] if the template fails.
    pub fn emit(
        &self,
        level: LogLevel,
        template: &str,
        context: &TemplateContext,
    ) -> Result<String, ActionSinkFailure> {
        let message = self.renderer.render(template, context)?;
        let rule = context.rule.name.as_str();
        match level {
            LogLevel::Debug => {
                tracing::debug!(target: "aggregator::action", rule, "{message}");
            }
            LogLevel::Info => tracing::info!(target: "aggregator::action", rule, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "aggregator::action", rule, "{message}"),
            LogLevel::Error => {
                tracing::error!(target: "aggregator::action", rule, "{message}");
            }
        }
        Ok(message)
    }
}
