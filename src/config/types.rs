use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Redact a secret string for Debug output. Shows "[REDACTED]" if non-empty, "[]" if empty.
fn redact(s: &str) -> &str {
    if s.is_empty() { "[]" } else { "[REDACTED]" }
}

// ── Top-level Settings ──────────────────────────────────────────────

/// Top-level configuration. Each field maps to a TOML `[section]`.
/// Uses `#[serde(default)]` so missing sections gracefully fall back.
///
/// Settings are plain data passed by `Arc` — there is no process-wide
/// singleton, so tests can run different models/budgets side by side.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    pub config: GlobalConfig,
    /// Context capacity per model name. Unknown models fall back to
    /// `config.max_model_tokens`.
    pub model_token_limits: HashMap<String, u32>,
    pub fallback_parser: FallbackParserConfig,
    pub prompts: Prompts,
    pub openai: OpenAiSecrets,
    pub github: GithubConfig,
}

// ── [config] ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub model: String,
    pub max_model_tokens: u32,
    pub temperature: f32,
    /// Completion request timeout in seconds.
    pub ai_timeout: u64,
    /// Hard cap on generated issue-creation URLs.
    pub max_issue_url_chars: usize,
    /// Bound on the leading-whitespace prefix copied when re-indenting.
    pub max_indent_prefix_chars: usize,
    pub enable_inline_fixes: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            max_model_tokens: 32_000,
            temperature: 0.2,
            ai_timeout: 120,
            max_issue_url_chars: 2048,
            max_indent_prefix_chars: 200,
            enable_inline_fixes: true,
        }
    }
}

// ── [fallback_parser] ───────────────────────────────────────────────

/// Heuristics for the freeform reply parser. These are configurable defaults
/// tuned against one provider's phrasing, not contracts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackParserConfig {
    /// How many characters before a code block to scan for a filename hint.
    pub filename_window_chars: usize,
    /// Minimum length for a preceding paragraph to be used as the comment.
    pub min_paragraph_chars: usize,
}

impl Default for FallbackParserConfig {
    fn default() -> Self {
        Self {
            filename_window_chars: 500,
            min_paragraph_chars: 40,
        }
    }
}

// ── Prompt templates ────────────────────────────────────────────────

/// A system/user prompt template pair (minijinja syntax).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub review_tagged: PromptTemplate,
    pub review_plain: PromptTemplate,
    pub inline_fix: PromptTemplate,
}

// ── Secrets ─────────────────────────────────────────────────────────

#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OpenAiSecrets {
    pub key: String,
    pub api_base: String,
}

impl fmt::Debug for OpenAiSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSecrets")
            .field("key", &redact(&self.key))
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GithubConfig {
    pub token: String,
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: "https://api.github.com".into(),
        }
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &redact(&self.token))
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.config.model, "gpt-4o");
        assert_eq!(s.config.max_model_tokens, 32_000);
        assert_eq!(s.fallback_parser.filename_window_chars, 500);
        assert!(s.model_token_limits.is_empty());
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let s = OpenAiSecrets {
            key: "sk-secret".into(),
            api_base: String::new(),
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
