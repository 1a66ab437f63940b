use crate::git::types::FileChange;

/// A well-formed tagged reply with a single suggestion.
pub const TAGGED_REPLY: &str = r#"<review>
<suggestion>
<describe>Use checked arithmetic for the sum</describe>
<type>bug</type>
<comment>The addition can overflow for large operands; prefer checked_add and surface the overflow.</comment>
<code>a.checked_add(b).ok_or(MathError::Overflow)</code>
<filename>src/math.rs</filename>
</suggestion>
</review>"#;

/// A reply with no tags at all, recoverable only by the freeform parser.
pub const FREEFORM_REPLY: &str = "Looking at path: src/math.rs, the addition can \
overflow for large operands and should use checked arithmetic instead.\n\n\
```rust\na.checked_add(b).ok_or(MathError::Overflow)\n```\n";

/// A minimal single-file change set.
pub fn simple_change() -> FileChange {
    FileChange::new(
        "src/math.rs",
        "@@ -1,3 +1,3 @@\n pub fn sum(a: u32, b: u32) -> u32 {\n-    a + b\n+    a + b + 0\n }",
    )
}
