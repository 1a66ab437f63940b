use std::fmt::Write;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use super::suggestion::Suggestion;

/// Owner/repository identifiers bound once per review.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub owner: String,
    pub repo: String,
}

/// Identifiers must be strictly alphanumeric plus `-_.` before they are ever
/// interpolated into a URL; anything else degrades to a placeholder link.
static SAFE_IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap());

/// Placeholder used instead of emitting a malformed or unsafe URL.
const PLACEHOLDER_LINK: &str = "#";

/// Render the deduplicated suggestions into a single review comment body,
/// grouped per file.
pub fn render_review_comment(
    suggestions: &[Suggestion],
    ctx: &RepoContext,
    max_url_chars: usize,
) -> String {
    let mut by_file: IndexMap<&str, Vec<&Suggestion>> = IndexMap::new();
    for s in suggestions {
        by_file.entry(s.filename.as_str()).or_default().push(s);
    }

    let mut body = String::from("## Code review\n");
    let _ = writeln!(
        body,
        "\n{} suggestion(s) across {} file(s).\n",
        suggestions.len(),
        by_file.len()
    );

    for (filename, group) in &by_file {
        let _ = writeln!(body, "### 📄 `{filename}`\n");
        for s in group {
            if !s.description.is_empty() {
                let _ = writeln!(body, "**{}** ({})\n", s.description, s.category);
            } else {
                let _ = writeln!(body, "**Suggestion** ({})\n", s.category);
            }
            if !s.comment.is_empty() {
                let _ = writeln!(body, "{}\n", s.comment);
            }
            let _ = writeln!(body, "```\n{}\n```\n", s.code);
            let link = issue_link(ctx, s, max_url_chars);
            let _ = writeln!(body, "[Open an issue for this]({link})\n");
        }
    }

    body
}

/// Build a percent-encoded, length-capped issue-creation URL for one
/// suggestion.
///
/// If the full URL (with the code block in the body) exceeds `max_url_chars`
/// it is regenerated without the code block; a URL still over the cap keeps
/// only the title. Unsafe owner/repo identifiers short-circuit to a
/// placeholder.
pub fn issue_link(ctx: &RepoContext, suggestion: &Suggestion, max_url_chars: usize) -> String {
    if !SAFE_IDENT_RE.is_match(&ctx.owner) || !SAFE_IDENT_RE.is_match(&ctx.repo) {
        tracing::warn!(owner = %ctx.owner, repo = %ctx.repo, "unsafe repository identifiers, using placeholder link");
        return PLACEHOLDER_LINK.to_string();
    }

    let title = if suggestion.description.is_empty() {
        format!("Code review suggestion for {}", suggestion.filename)
    } else {
        suggestion.description.clone()
    };

    let with_code = format!(
        "{}\n\n```\n{}\n```",
        suggestion.comment, suggestion.code
    );
    let url = build_issue_url(ctx, &title, &with_code);
    if url.len() <= max_url_chars {
        return url;
    }

    // Over the cap: regenerate without the code block
    let url = build_issue_url(ctx, &title, &suggestion.comment);
    if url.len() <= max_url_chars {
        return url;
    }

    let url = build_issue_url(ctx, &title, "");
    if url.len() <= max_url_chars {
        return url;
    }

    tracing::debug!(
        file = %suggestion.filename,
        "issue link exceeds the cap even title-only, using placeholder"
    );
    PLACEHOLDER_LINK.to_string()
}

fn build_issue_url(ctx: &RepoContext, title: &str, body: &str) -> String {
    let title_enc: String = url::form_urlencoded::byte_serialize(title.as_bytes()).collect();
    if body.is_empty() {
        return format!(
            "https://github.com/{}/{}/issues/new?title={title_enc}",
            ctx.owner, ctx.repo
        );
    }
    let body_enc: String = url::form_urlencoded::byte_serialize(body.as_bytes()).collect();
    format!(
        "https://github.com/{}/{}/issues/new?title={title_enc}&body={body_enc}",
        ctx.owner, ctx.repo
    )
}
