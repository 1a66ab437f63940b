use std::collections::HashMap;

use minijinja::Value;

use super::comment::RepoContext;
use crate::ai::types::Conversation;
use crate::config::types::Settings;

/// Which prompt/parser pairing a strategy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Tagged-markup prompt, structured parser with heuristic fallback.
    Tagged,
    /// Plain markdown prompt, reply passed through as the review body.
    Plain,
}

/// One (prompt-builder, response-parser) strategy pair.
#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub kind: PromptKind,
}

/// The fixed fallback order: structured extraction first, then a plain
/// prompt that always produces a human-readable review.
pub fn default_strategies() -> Vec<Strategy> {
    vec![
        Strategy {
            name: "tagged",
            kind: PromptKind::Tagged,
        },
        Strategy {
            name: "plain",
            kind: PromptKind::Plain,
        },
    ]
}

/// Build the conversation for one batch under the given strategy.
pub fn build_conversation(
    settings: &Settings,
    kind: PromptKind,
    ctx: &RepoContext,
    diff: &str,
) -> Result<Conversation, crate::error::ReviewerError> {
    let template = match kind {
        PromptKind::Tagged => &settings.prompts.review_tagged,
        PromptKind::Plain => &settings.prompts.review_plain,
    };

    let mut vars: HashMap<String, Value> = HashMap::new();
    vars.insert("owner".into(), Value::from(ctx.owner.as_str()));
    vars.insert("repo".into(), Value::from(ctx.repo.as_str()));
    vars.insert("diff".into(), Value::from(diff));

    let rendered = crate::template::render::render_prompt(template, vars)?;
    Ok(Conversation::new(rendered.system, rendered.user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::load_settings;

    #[test]
    fn test_default_strategy_order() {
        let strategies = default_strategies();
        assert_eq!(strategies[0].kind, PromptKind::Tagged);
        assert_eq!(strategies[1].kind, PromptKind::Plain);
    }

    #[test]
    fn test_tagged_conversation_carries_wire_format_and_diff() {
        let settings = load_settings(None).unwrap();
        let ctx = RepoContext {
            owner: "acme".into(),
            repo: "widgets".into(),
        };
        let conv =
            build_conversation(&settings, PromptKind::Tagged, &ctx, "## File: 'a.rs'\n+x\n")
                .unwrap();

        let system = &conv.messages()[0].content;
        assert!(system.contains("<review>"));
        assert!(system.contains("<suggestion>"));
        assert!(system.contains("acme/widgets"));
        assert!(conv.messages()[1].content.contains("## File: 'a.rs'"));
    }
}
