use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::git::types::FileChange;

/// Regex for parsing unified diff hunk headers.
/// Matches: `@@ -start1[,size1] +start2[,size2] @@ [section_header]`
static HUNK_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@[ ]?(.*)").unwrap());

/// Parsed hunk header values.
#[derive(Debug, Clone)]
pub struct HunkHeader {
    pub start1: usize,
    pub size1: usize,
    pub start2: usize,
    pub size2: usize,
    pub section_header: String,
}

impl HunkHeader {
    pub fn parse(line: &str) -> Option<Self> {
        let caps = HUNK_HEADER_RE.captures(line)?;
        Some(Self {
            start1: caps[1].parse().unwrap_or(0),
            size1: caps.get(2).map_or(1, |m| m.as_str().parse().unwrap_or(1)),
            start2: caps[3].parse().unwrap_or(0),
            size2: caps.get(4).map_or(1, |m| m.as_str().parse().unwrap_or(1)),
            section_header: caps.get(5).map_or("", |m| m.as_str()).to_string(),
        })
    }
}

/// Render a file's patch for the model, choosing a strategy by whether full
/// before/after content is available.
///
/// With both sides present, hunk line numbers are re-derived for the "after"
/// side so the model can reference exact lines without recomputing offsets.
/// Otherwise the raw diff is emitted under a filename header. Pure function
/// of its input.
pub fn render_file_patch(file: &FileChange) -> String {
    if file.base_content.is_some() && file.head_content.is_some() {
        render_contextual(&file.filename, &file.diff)
    } else {
        render_raw(&file.filename, &file.diff)
    }
}

/// Raw strategy: the diff as provided by the host, plus a filename header.
pub fn render_raw(filename: &str, diff: &str) -> String {
    format!("\n\n## File: '{}'\n\n{}\n", filename.trim(), diff.trim())
}

/// Contextual strategy: each retained line prefixed with its resolved line
/// number on the "after" side. The hunk header `@@ -a,b +c,d @@` supplies the
/// starting number `c`; removed lines consume no number.
pub fn render_contextual(filename: &str, diff: &str) -> String {
    let mut output = format!("\n\n## File: '{}'\n\n", filename.trim());
    let mut line_number: usize = 0;

    for line in diff.lines() {
        if let Some(header) = HunkHeader::parse(line) {
            line_number = header.start2;
            let _ = writeln!(output, "{line}");
            continue;
        }

        if line.starts_with('-') {
            let _ = writeln!(output, "{line}");
        } else {
            let _ = writeln!(output, "{line_number} {line}");
            line_number += 1;
        }
    }

    output
}

/// Degraded-mode pre-pass: strip every deletion line from a diff.
///
/// The review is scoped to additions, so deletions are the first safe thing
/// to discard when a single file exceeds the token budget on its own. Hunk
/// headers are left untouched; the result is best-effort input, not a valid
/// unified diff.
pub fn strip_deletions(diff: &str) -> String {
    let mut output = String::with_capacity(diff.len());
    for line in diff.lines() {
        if line.starts_with('-') && !line.starts_with("---") {
            continue;
        }
        output.push_str(line);
        output.push('\n');
    }
    output
}
