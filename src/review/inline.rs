use std::collections::HashMap;
use std::fmt::Write;

use minijinja::Value;
use serde::Deserialize;
use serde_json::json;

use super::suggestion::Suggestion;
use crate::ai::CompletionClient;
use crate::ai::types::{Conversation, FunctionSchema};
use crate::config::types::Settings;
use crate::git::types::FileChange;
use crate::template::render::render_prompt;
use crate::util::leading_whitespace;

/// A precise, line-addressed code fix derived from a suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineFix {
    pub filename: String,
    /// 1-based inclusive range in the current file.
    pub line_start: usize,
    pub line_end: usize,
    /// Replacement text, re-indented to the target line.
    pub replacement: String,
    pub comment: String,
}

const FIX_FUNCTION_NAME: &str = "propose_fix";

/// Fixed schema for the structured inline-fix call.
pub fn inline_fix_schema() -> FunctionSchema {
    FunctionSchema {
        name: FIX_FUNCTION_NAME.to_string(),
        description: "Propose an exact replacement for a line range of the file".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Replacement code for the range"},
                "line_start": {"type": "integer", "description": "First replaced line, 1-based"},
                "line_end": {"type": "integer", "description": "Last replaced line, inclusive"},
                "comment": {"type": "string", "description": "One-line explanation of the fix"}
            },
            "required": ["code", "line_start", "line_end", "comment"]
        }),
    }
}

#[derive(Deserialize)]
struct FixArgs {
    code: String,
    line_start: usize,
    line_end: usize,
    #[serde(default)]
    comment: String,
}

/// Derive an inline fix for one suggestion against the current file content.
///
/// Issues a focused, single-suggestion structured-call request, validates
/// the returned line range, re-indents the replacement to the target line,
/// and suppresses no-op fixes whose trimmed replacement equals the trimmed
/// current lines. Any malformed service output yields `None` rather than an
/// error.
pub async fn derive_inline_fix(
    client: &dyn CompletionClient,
    settings: &Settings,
    suggestion: &Suggestion,
    file: &FileChange,
) -> Option<InlineFix> {
    let content = file.head_content.as_deref()?;

    let mut vars: HashMap<String, Value> = HashMap::new();
    vars.insert("filename".into(), Value::from(file.filename.as_str()));
    vars.insert("content".into(), Value::from(number_lines(content)));
    vars.insert(
        "description".into(),
        Value::from(suggestion.description.as_str()),
    );
    vars.insert("comment".into(), Value::from(suggestion.comment.as_str()));
    vars.insert("code".into(), Value::from(suggestion.code.as_str()));

    let prompt = match render_prompt(&settings.prompts.inline_fix, vars) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "inline fix prompt rendering failed");
            return None;
        }
    };

    let conversation = Conversation::new(prompt.system, prompt.user);
    let schema = inline_fix_schema();
    let outcome = match client.complete(&conversation, Some(&schema)).await {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!(file = %file.filename, error = %e, "inline fix request failed");
            return None;
        }
    };

    let call = outcome.function_call?;
    let args: FixArgs = match serde_json::from_str(&call.arguments) {
        Ok(a) => a,
        Err(e) => {
            tracing::debug!(error = %e, "inline fix arguments did not parse");
            return None;
        }
    };

    build_fix(&file.filename, content, args, settings.config.max_indent_prefix_chars)
}

/// Pure part of the derivation, split out for tests.
fn build_fix(
    filename: &str,
    content: &str,
    args: FixArgs,
    max_indent_prefix: usize,
) -> Option<InlineFix> {
    let lines: Vec<&str> = content.lines().collect();
    if args.line_start == 0 || args.line_start > args.line_end || args.line_end > lines.len() {
        tracing::debug!(
            line_start = args.line_start,
            line_end = args.line_end,
            total = lines.len(),
            "inline fix line range out of bounds"
        );
        return None;
    }

    let target = &lines[args.line_start - 1..args.line_end];
    let indent = leading_whitespace(target[0], max_indent_prefix);
    let replacement = reindent(&args.code, indent);

    // No-op suppression: replacing lines with themselves helps nobody.
    if trimmed_lines(&replacement) == trimmed_lines(&target.join("\n")) {
        tracing::debug!(file = %filename, "inline fix is a no-op, suppressed");
        return None;
    }

    Some(InlineFix {
        filename: filename.to_string(),
        line_start: args.line_start,
        line_end: args.line_end,
        replacement,
        comment: args.comment,
    })
}

/// Shift `code` so its first line's indentation matches `indent`, preserving
/// relative indentation of the remaining lines.
fn reindent(code: &str, indent: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();
    let common = common_indent(&lines);

    let mut out = String::with_capacity(code.len() + indent.len() * lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.trim().is_empty() {
            continue;
        }
        let _ = write!(out, "{indent}{}", line.strip_prefix(common).unwrap_or(line));
    }
    out
}

/// Longest whitespace prefix shared by all non-empty lines.
fn common_indent<'a>(lines: &[&'a str]) -> &'a str {
    let mut common: Option<&str> = None;
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let prefix = leading_whitespace(line, usize::MAX);
        common = Some(match common {
            None => prefix,
            Some(current) => {
                let shared = current
                    .bytes()
                    .zip(prefix.bytes())
                    .take_while(|(a, b)| a == b)
                    .count();
                &current[..shared]
            }
        });
    }
    common.unwrap_or("")
}

fn trimmed_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).collect()
}

fn number_lines(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + content.lines().count() * 4);
    for (i, line) in content.lines().enumerate() {
        let _ = writeln!(out, "{} {line}", i + 1);
    }
    out
}
