/// Find the largest byte offset <= `max_bytes` that falls on a UTF-8 char boundary.
pub(crate) fn floor_char_boundary(text: &str, max_bytes: usize) -> usize {
    if max_bytes >= text.len() {
        return text.len();
    }
    // Walk backwards from max_bytes until we hit a char boundary
    let mut i = max_bytes;
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Return the leading whitespace (spaces and tabs) of `line`, scanning at most
/// `max_prefix_bytes` bytes. The bound guards against pathological inputs.
pub fn leading_whitespace(line: &str, max_prefix_bytes: usize) -> &str {
    let end = line
        .char_indices()
        .take_while(|(i, c)| *i < max_prefix_bytes && (*c == ' ' || *c == '\t'))
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    &line[..end]
}
