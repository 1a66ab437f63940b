use std::sync::LazyLock;

use regex::Regex;

use super::suggestion::Suggestion;

// Wire contract with the tagged review prompt (settings/prompts.toml):
// one <review> container, zero or more <suggestion> children, each with
// these five fields in order.
pub const REVIEW_TAG: &str = "review";
pub const SUGGESTION_TAG: &str = "suggestion";
pub const DESCRIBE_TAG: &str = "describe";
pub const CATEGORY_TAG: &str = "type";
pub const COMMENT_TAG: &str = "comment";
pub const CODE_TAG: &str = "code";
pub const FILENAME_TAG: &str = "filename";

/// Category used when a suggestion arrives without one.
const DEFAULT_CATEGORY: &str = "general";

/// Document-type and entity declarations are stripped before parsing; the
/// parser must never resolve anything the model smuggled in.
static DECL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<!\s*(?:DOCTYPE|ENTITY)[^>]*>").unwrap());

static CODE_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<code>(.*?)</code>").unwrap());

/// Parse one raw completion reply into suggestions.
///
/// A reply without the container tag, or one that fails structural parsing
/// after sanitization, yields zero suggestions — never an error for the
/// batch.
pub fn parse_review_reply(reply: &str) -> Vec<Suggestion> {
    let Some(sanitized) = sanitize_reply(reply) else {
        tracing::debug!("reply carries no <review> container, skipping structural parse");
        return Vec::new();
    };

    let doc = match roxmltree::Document::parse(&sanitized) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = %e, "sanitized reply failed structural parse");
            return Vec::new();
        }
    };

    let root = doc.root_element();
    if root.tag_name().name() != REVIEW_TAG {
        tracing::warn!(tag = root.tag_name().name(), "unexpected root element");
        return Vec::new();
    }

    root.children()
        .filter(|n| n.is_element() && n.tag_name().name() == SUGGESTION_TAG)
        .filter_map(|node| suggestion_from_node(node))
        .collect()
}

/// Defensive preprocessing before structural parsing.
///
/// Slices the reply down to the span between the first opening and last
/// closing container tag, discards embedded DOCTYPE/ENTITY declarations,
/// and rewraps every `<code>` field in CDATA with markdown fences removed,
/// so special markup characters inside source code cannot corrupt the
/// structural parse.
fn sanitize_reply(reply: &str) -> Option<String> {
    let open = reply.find(&format!("<{REVIEW_TAG}>"))?;
    let close_tag = format!("</{REVIEW_TAG}>");
    let close = reply.rfind(&close_tag)?;
    if close < open {
        return None;
    }

    let span = &reply[open..close + close_tag.len()];
    let span = DECL_RE.replace_all(span, "");

    let rewrapped = CODE_FIELD_RE.replace_all(&span, |caps: &regex::Captures| {
        let inner = caps
            .get(1)
            .map_or("", |m| m.as_str())
            .replace("<![CDATA[", "")
            .replace("]]>", "");
        let cleaned = strip_code_fences(&inner);
        format!("<{CODE_TAG}><![CDATA[{cleaned}]]></{CODE_TAG}>")
    });

    Some(rewrapped.into_owned())
}

/// Remove fenced-code-block delimiter lines (``` with optional language tag).
fn strip_code_fences(code: &str) -> String {
    code.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn suggestion_from_node(node: roxmltree::Node) -> Option<Suggestion> {
    let code = RawField::for_tag(node, CODE_TAG).normalize();
    let Some(code) = code else {
        tracing::debug!("suggestion dropped: code field did not normalize to text");
        return None;
    };
    let Some(filename) = RawField::for_tag(node, FILENAME_TAG).normalize() else {
        tracing::debug!("suggestion dropped: no usable filename");
        return None;
    };

    Some(Suggestion {
        filename,
        description: RawField::for_tag(node, DESCRIBE_TAG)
            .normalize()
            .unwrap_or_default(),
        category: RawField::for_tag(node, CATEGORY_TAG)
            .normalize()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        comment: RawField::for_tag(node, COMMENT_TAG)
            .normalize()
            .unwrap_or_default(),
        code,
    })
}

/// Shape-tolerant view of one parsed field.
///
/// Upstream models (and the markup itself) can represent a field as plain
/// text, a list of nested elements, or an element carrying only attributes.
/// Every shape normalizes to a single text value through [`RawField::normalize`].
#[derive(Debug, Clone)]
pub enum RawField {
    Text(String),
    List(Vec<RawField>),
    Node {
        text: Option<String>,
        attrs: Vec<(String, String)>,
    },
}

impl RawField {
    /// Build the field for all children of `parent` named `tag`.
    fn for_tag(parent: roxmltree::Node, tag: &str) -> RawField {
        let mut matches: Vec<RawField> = parent
            .children()
            .filter(|c| c.is_element() && c.tag_name().name() == tag)
            .map(Self::from_node)
            .collect();

        match matches.len() {
            0 => RawField::Text(String::new()),
            1 => matches.remove(0),
            _ => RawField::List(matches),
        }
    }

    fn from_node(node: roxmltree::Node) -> RawField {
        let element_children: Vec<RawField> = node
            .children()
            .filter(|c| c.is_element())
            .map(Self::from_node)
            .collect();
        if !element_children.is_empty() {
            return RawField::List(element_children);
        }

        let attrs: Vec<(String, String)> = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();

        match node.text() {
            Some(text) if attrs.is_empty() => RawField::Text(text.to_string()),
            text => RawField::Node {
                text: text.map(str::to_string),
                attrs,
            },
        }
    }

    /// Exhaustively reduce any field shape to trimmed, non-empty text.
    pub fn normalize(&self) -> Option<String> {
        fn non_empty(s: &str) -> Option<String> {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }

        match self {
            RawField::Text(s) => non_empty(s),
            RawField::List(items) => items.iter().find_map(RawField::normalize),
            RawField::Node { text, attrs } => text
                .as_deref()
                .and_then(non_empty)
                .or_else(|| attrs.iter().find_map(|(_, v)| non_empty(v))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_with(suggestions: &str) -> String {
        format!(
            "Sure! Here is my review of the changes.\n<review>{suggestions}</review>\nLet me know if you need more."
        )
    }

    fn one_suggestion(code_field: &str) -> String {
        reply_with(&format!(
            "<suggestion>\
             <describe>Use checked add</describe>\
             <type>bug</type>\
             <comment>The sum can overflow.</comment>\
             {code_field}\
             <filename>src/math.rs</filename>\
             </suggestion>"
        ))
    }

    #[test]
    fn test_parses_well_formed_reply_with_surrounding_prose() {
        let reply = one_suggestion("<code>a.checked_add(b)</code>");
        let suggestions = parse_review_reply(&reply);

        assert_eq!(suggestions.len(), 1);
        let s = &suggestions[0];
        assert_eq!(s.filename, "src/math.rs");
        assert_eq!(s.category, "bug");
        assert_eq!(s.code, "a.checked_add(b)");
    }

    #[test]
    fn test_fenced_code_inside_code_field() {
        // Triple-backtick fenced content inside <code> parses to exactly
        // the fenced block's inner text.
        let reply = one_suggestion("<code>```rust\na.checked_add(b)\n```</code>");
        let suggestions = parse_review_reply(&reply);

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].code.trim(), "a.checked_add(b)");
        assert!(!suggestions[0].code.contains("```"));
    }

    #[test]
    fn test_markup_characters_inside_code_survive() {
        let reply = one_suggestion("<code>if a < b && c > d { swap(&mut a, &mut b); }</code>");
        let suggestions = parse_review_reply(&reply);

        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].code.contains("a < b && c > d"));
    }

    #[test]
    fn test_no_container_tag_short_circuits() {
        assert!(parse_review_reply("no tags here, just prose").is_empty());
    }

    #[test]
    fn test_doctype_and_entity_declarations_stripped() {
        let reply = format!(
            "<!DOCTYPE review [<!ENTITY xxe SYSTEM \"file:///etc/passwd\">]>\n{}",
            one_suggestion("<code>safe()</code>")
        );
        let suggestions = parse_review_reply(&reply);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].code, "safe()");
    }

    #[test]
    fn test_suggestion_without_code_is_dropped() {
        let reply = reply_with(
            "<suggestion><describe>d</describe><type>bug</type>\
             <comment>c</comment><code>  </code><filename>a.rs</filename></suggestion>\
             <suggestion><describe>d2</describe><type>bug</type>\
             <comment>c2</comment><code>real()</code><filename>b.rs</filename></suggestion>",
        );
        let suggestions = parse_review_reply(&reply);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].filename, "b.rs");
    }

    #[test]
    fn test_empty_container_yields_zero() {
        assert!(parse_review_reply("<review></review>").is_empty());
    }

    #[test]
    fn test_malformed_markup_yields_zero_not_panic() {
        let reply = "<review><suggestion><describe>unclosed</review>";
        assert!(parse_review_reply(reply).is_empty());
    }

    #[test]
    fn test_rawfield_normalize_shapes() {
        assert_eq!(
            RawField::Text("  hello  ".into()).normalize().as_deref(),
            Some("hello")
        );
        assert_eq!(RawField::Text("   ".into()).normalize(), None);
        assert_eq!(
            RawField::List(vec![
                RawField::Text(String::new()),
                RawField::Text("second".into())
            ])
            .normalize()
            .as_deref(),
            Some("second")
        );
        assert_eq!(
            RawField::Node {
                text: None,
                attrs: vec![("value".into(), "attr text".into())],
            }
            .normalize()
            .as_deref(),
            Some("attr text")
        );
    }

    #[test]
    fn test_category_defaults_when_missing() {
        let reply = reply_with(
            "<suggestion><describe>d</describe>\
             <comment>c</comment><code>x()</code><filename>a.rs</filename></suggestion>",
        );
        let suggestions = parse_review_reply(&reply);
        assert_eq!(suggestions[0].category, "general");
    }
}
