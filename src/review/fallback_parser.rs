use std::sync::LazyLock;

use regex::Regex;

use super::suggestion::Suggestion;
use crate::config::types::FallbackParserConfig;
use crate::util::floor_char_boundary;

/// Category assigned to every heuristically recovered suggestion.
const FALLBACK_CATEGORY: &str = "improvement";

/// Comment used when no usable text precedes a code block.
const GENERIC_COMMENT: &str = "Consider applying the suggested change below.";

static CODE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```([A-Za-z0-9_+-]*)[ \t]*\r?\n((?s:.*?))```").unwrap());

/// Ordered filename label patterns, highest confidence first. Tuned against
/// one provider's phrasing; treat as defaults, not contracts.
static FILENAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)file:\s*`?([\w./\\-]+)`?",
        r"(?i)path:\s*`?([\w./\\-]+)`?",
        r"(?i)in (?:the )?file\s+`?([\w./\\-]+)`?",
        r"(?i)for (?:the )?file\s+`?([\w./\\-]+)`?",
        r"`?([\w./\\-]+\.[A-Za-z0-9]{1,8})`?:",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PARAGRAPH_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

static SENTENCE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?](?:\s+|$)").unwrap());

/// Heuristically recover suggestions from a freeform reply.
///
/// Every fenced code block yields exactly one suggestion regardless of
/// confidence: this is a best-effort recovery path used only when the
/// structured parser found nothing across all replies.
pub fn parse_freeform_reply(reply: &str, config: &FallbackParserConfig) -> Vec<Suggestion> {
    CODE_BLOCK_RE
        .captures_iter(reply)
        .filter_map(|caps| {
            let code = caps.get(2).map_or("", |m| m.as_str()).trim_end();
            if code.trim().is_empty() {
                return None;
            }
            let language = caps.get(1).map_or("", |m| m.as_str());
            let block_start = caps.get(0).map_or(0, |m| m.start());

            let window = preceding_window(reply, block_start, config.filename_window_chars);
            let filename = find_filename(window)
                .unwrap_or_else(|| synthesized_filename(language));
            let comment = derive_comment(window, config.min_paragraph_chars);
            let description = first_sentence(&comment);

            Some(Suggestion {
                filename,
                description,
                category: FALLBACK_CATEGORY.to_string(),
                comment,
                code: code.to_string(),
            })
        })
        .collect()
}

/// The fixed-size slice of text immediately before a code block.
fn preceding_window(reply: &str, block_start: usize, window_chars: usize) -> &str {
    let begin = floor_char_boundary(reply, block_start.saturating_sub(window_chars));
    let end = floor_char_boundary(reply, block_start);
    &reply[begin..end]
}

/// Try each label pattern in priority order; within a pattern, the match
/// closest to the code block wins.
fn find_filename(window: &str) -> Option<String> {
    for pattern in FILENAME_PATTERNS.iter() {
        if let Some(caps) = pattern.captures_iter(window).last() {
            let name = caps.get(1)?.as_str().trim_matches('`');
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Synthesize a filename from the code block's language tag.
fn synthesized_filename(language: &str) -> String {
    let ext = match language.to_lowercase().as_str() {
        "rust" | "rs" => "rs",
        "go" | "golang" => "go",
        "python" | "py" => "py",
        "javascript" | "js" => "js",
        "typescript" | "ts" => "ts",
        "java" => "java",
        "c" => "c",
        "cpp" | "c++" => "cpp",
        "ruby" | "rb" => "rb",
        "shell" | "bash" | "sh" => "sh",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "json" => "json",
        "sql" => "sql",
        _ => "txt",
    };
    format!("suggested_change.{ext}")
}

/// Derive a comment from the nearest preceding paragraph, falling back to
/// the last one or two sentences, then to a generic template.
fn derive_comment(window: &str, min_paragraph_chars: usize) -> String {
    // Nearest paragraph of sufficient length, skipping fence remnants
    let paragraphs: Vec<&str> = PARAGRAPH_SPLIT_RE
        .split(window)
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.starts_with("```"))
        .collect();

    if let Some(p) = paragraphs.last()
        && p.len() >= min_paragraph_chars
    {
        return p.to_string();
    }

    // Last 1-2 sentences of the window
    let sentences: Vec<&str> = SENTENCE_SPLIT_RE
        .split(window)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let tail: Vec<&str> = sentences.iter().rev().take(2).rev().copied().collect();
    let joined = tail.join(". ");
    if joined.len() >= 10 {
        return format!("{joined}.");
    }

    GENERIC_COMMENT.to_string()
}

fn first_sentence(comment: &str) -> String {
    SENTENCE_SPLIT_RE
        .split(comment)
        .find(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| comment.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FallbackParserConfig {
        FallbackParserConfig::default()
    }

    #[test]
    fn test_spec_scenario_two_blocks_one_hint() {
        // A reply with no container tag, two fenced code blocks, one
        // `path:` hint: two suggestions, one resolved and one synthesized.
        // The narrow window keeps the first block's hint out of the second
        // block's scan range.
        let cfg = FallbackParserConfig {
            filename_window_chars: 80,
            min_paragraph_chars: 40,
        };
        let reply = "\
The handler leaks the connection on early return. This should use a deferred close \
to guarantee cleanup in every path: src/a.go\n\n\
```go\ndefer conn.Close()\n```\n\n\
Separately, this loop can be simplified considerably.\n\n\
```python\nfor item in items: process(item)\n```\n";

        let suggestions = parse_freeform_reply(reply, &cfg);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].filename, "src/a.go");
        assert_eq!(suggestions[1].filename, "suggested_change.py");
        assert_eq!(suggestions[0].category, "improvement");
        assert_eq!(suggestions[1].category, "improvement");
    }

    #[test]
    fn test_file_label_beats_bare_extension_pattern() {
        let reply = "\
Looking at old.rs: the logic in file: src/new.rs needs a guard.\n\n\
```rust\nassert!(x > 0);\n```\n";
        let suggestions = parse_freeform_reply(reply, &config());
        assert_eq!(suggestions[0].filename, "src/new.rs");
    }

    #[test]
    fn test_comment_from_nearest_paragraph() {
        let reply = "\
Intro paragraph that is quite long and should not be picked.\n\n\
This buffer is never flushed, so short writes are silently lost on shutdown.\n\n\
```rust\nwriter.flush()?;\n```\n";
        let suggestions = parse_freeform_reply(reply, &config());
        assert!(suggestions[0].comment.starts_with("This buffer is never flushed"));
        assert_eq!(
            suggestions[0].description,
            "This buffer is never flushed, so short writes are silently lost on shutdown"
        );
    }

    #[test]
    fn test_generic_comment_when_nothing_precedes() {
        let reply = "```rust\nlet x = 1;\n```";
        let suggestions = parse_freeform_reply(reply, &config());
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].comment, GENERIC_COMMENT);
    }

    #[test]
    fn test_empty_code_block_skipped() {
        let reply = "text\n```\n\n```\nmore\n```rust\nreal_code();\n```\n";
        let suggestions = parse_freeform_reply(reply, &config());
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].code, "real_code();");
    }

    #[test]
    fn test_no_code_blocks_yields_zero() {
        assert!(parse_freeform_reply("nothing but prose here", &config()).is_empty());
    }

    #[test]
    fn test_window_is_bounded() {
        let cfg = FallbackParserConfig {
            filename_window_chars: 30,
            min_paragraph_chars: 40,
        };
        // The hint sits outside the 30-char window and must not be found.
        let reply = format!(
            "file: src/far_away.rs\n{}\n```go\ncode()\n```\n",
            "x".repeat(100)
        );
        let suggestions = parse_freeform_reply(&reply, &cfg);
        assert_eq!(suggestions[0].filename, "suggested_change.go");
    }
}
