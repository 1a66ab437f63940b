/// Diff information for a single changed file in the change set under review.
///
/// Created once per review from the change source's file list; before/after
/// content and the cached token count are attached in place afterwards.
#[derive(Debug, Clone, Default)]
pub struct FileChange {
    /// File path in the repository. Unique key within a review.
    pub filename: String,
    /// Unified diff patch string.
    pub diff: String,
    /// Full content on the base branch, when fetchable.
    pub base_content: Option<String>,
    /// Full content on the head branch, when fetchable.
    pub head_content: Option<String>,
    /// Cached token count of this file's rendered patch.
    pub patch_tokens: Option<u32>,
}

impl FileChange {
    pub fn new(filename: impl Into<String>, diff: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            diff: diff.into(),
            ..Default::default()
        }
    }
}
