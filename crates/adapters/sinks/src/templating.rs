//! Minijinja rendering of action payloads.
//!
//! Templates are arbitrary strings stored with each rule, so they are
//! compiled on every render. Undefined variables are errors, which surfaces
//! typos as a failed firing instead of a silently blank message.

use aggregator_app::ports::FiringContext;
use aggregator_domain::error::ActionSinkFailure;
use aggregator_domain::time;
use serde::Serialize;

/// What a template (or a default JSON body) can see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateContext {
    pub rule: RuleContext,
    /// RFC 3339.
    pub fired_at: String,
    pub matches: Vec<MatchContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleContext {
    pub id: String,
    pub name: String,
}

/// One aggregated point that satisfied the rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchContext {
    pub endpoint_id: String,
    pub sensor: String,
    pub value: f64,
    pub unit: &'static str,
    pub collected_at: String,
}

impl From<&FiringContext> for TemplateContext {
    fn from(context: &FiringContext) -> Self {
        Self {
            rule: RuleContext {
                id: context.rule_id.to_string(),
                name: context.rule_name.clone(),
            },
            fired_at: time::encode(context.fired_at),
            matches: context
                .matches
                .iter()
                .map(|point| MatchContext {
                    endpoint_id: point.endpoint_id.to_string(),
                    sensor: point.sensor_name.clone(),
                    value: point.value,
                    unit: point.unit.as_str(),
                    collected_at: time::encode(point.collected_at),
                })
                .collect(),
        }
    }
}

/// Stateless renderer; cheap to share.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    fn environment() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env
    }

    /// Render `template` against `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionSinkFailure::Render`] on syntax errors, undefined
    /// variables or filter failures.
    pub fn render(
        &self,
        template: &str,
        context: &TemplateContext,
    ) -> Result<String, ActionSinkFailure> {
        Self::environment()
            .render_str(template, context)
            .map_err(|err| ActionSinkFailure::Render(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use aggregator_domain::data_point::DataPoint;
    use aggregator_domain::id::{EndpointId, RuleId};
    use aggregator_domain::unit::Unit;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn context() -> TemplateContext {
        let fired_at = Utc.with_ymd_and_hms(2020, 4, 1, 10, 0, 0).unwrap();
        TemplateContext::from(&FiringContext {
            rule_id: RuleId::new(),
            rule_name: "hot attic".to_string(),
            fired_at,
            matches: vec![DataPoint {
                endpoint_id: EndpointId::new(),
                sensor_name: "temperature".to_string(),
                collected_at: fired_at,
                value: 26.5,
                unit: Unit::Celsius,
            }],
        })
    }

    #[test]
    fn should_expose_rule_and_matches() {
        let rendered = TemplateRenderer
            .render(
                "{{ rule.name }}: {% for m in matches %}{{ m.sensor }}={{ m.value }} {{ m.unit }}{% endfor %} at {{ fired_at }}",
                &context(),
            )
            .unwrap();
        assert_eq!(
            rendered,
            "hot attic: temperature=26.5 celsius at 2020-04-01T10:00:00.000000Z"
        );
    }

    #[test]
    fn should_fail_on_undefined_variable() {
        let result = TemplateRenderer.render("{{ rule.nmae }}", &context());
        assert!(matches!(result, Err(ActionSinkFailure::Render(_))));
    }

    #[test]
    fn should_fail_on_syntax_error() {
        let result = TemplateRenderer.render("{% for %}", &context());
        assert!(matches!(result, Err(ActionSinkFailure::Render(_))));
    }
}
