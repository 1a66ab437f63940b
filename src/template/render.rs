use std::collections::HashMap;
use std::sync::LazyLock;

use minijinja::{Environment, UndefinedBehavior, Value};

use crate::config::types::PromptTemplate;
use crate::error::ReviewerError;

/// Shared minijinja environment with strict undefined behavior.
static JINJA_ENV: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
});

/// Rendered prompt pair ready for the completion service.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Render a prompt template pair with the given variables.
///
/// Takes ownership of `vars` to avoid cloning large Values (the diff string
/// can be 100 KB+). The context Value is built once and shared across both
/// renders via cheap Arc clone.
pub fn render_prompt(
    template: &PromptTemplate,
    vars: HashMap<String, Value>,
) -> Result<RenderedPrompt, ReviewerError> {
    let env = &*JINJA_ENV;
    let ctx = Value::from_iter(vars);

    let system = render_template(env, "system", &template.system, &ctx)?;
    let user = render_template(env, "user", &template.user, &ctx)?;

    Ok(RenderedPrompt { system, user })
}

fn render_template(
    env: &Environment,
    name: &str,
    template_str: &str,
    ctx: &Value,
) -> Result<String, ReviewerError> {
    let tmpl = env.template_from_str(template_str)?;
    tmpl.render(ctx.clone()).map_err(|e| {
        tracing::warn!(template = name, error = %e, "prompt template failed to render");
        ReviewerError::Template(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_simple_variables() {
        let template = PromptTemplate {
            system: "Review {{ owner }}/{{ repo }}.".into(),
            user: "Diff:\n{{ diff }}".into(),
        };
        let mut vars = HashMap::new();
        vars.insert("owner".to_string(), Value::from("acme"));
        vars.insert("repo".to_string(), Value::from("widgets"));
        vars.insert("diff".to_string(), Value::from("+added line"));

        let rendered = render_prompt(&template, vars).unwrap();
        assert_eq!(rendered.system, "Review acme/widgets.");
        assert!(rendered.user.contains("+added line"));
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let template = PromptTemplate {
            system: "{{ missing }}".into(),
            user: String::new(),
        };
        assert!(render_prompt(&template, HashMap::new()).is_err());
    }
}
