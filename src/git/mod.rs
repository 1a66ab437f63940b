pub mod github;
pub mod types;

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::error::ReviewerError;
use types::FileChange;

/// Trait for version-control hosts supplying the files under review.
///
/// `fetch_file_content` returns `Ok(None)` for absent, binary or otherwise
/// unfetchable files — callers treat missing content as a rendering
/// degradation, not an error.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// List the changed files (filename + raw diff) of the change set.
    async fn list_changed_files(&self) -> Result<Vec<FileChange>, ReviewerError>;

    /// Fetch the full content of `path` at `git_ref`.
    async fn fetch_file_content(
        &self,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>, ReviewerError>;

    /// Head (source) branch ref of the change set.
    async fn head_ref(&self) -> Result<String, ReviewerError>;

    /// Base (target) branch ref of the change set.
    async fn base_ref(&self) -> Result<String, ReviewerError>;
}

/// Concurrently attach before/after content to every file, best effort.
///
/// Fetches are issued in parallel; a failed or empty fetch leaves the
/// corresponding content as `None`, which downstream rendering absorbs by
/// falling back to the raw diff.
pub async fn prefetch_contents(
    source: &dyn ChangeSource,
    files: &mut [FileChange],
) -> Result<(), ReviewerError> {
    let base = source.base_ref().await?;
    let head = source.head_ref().await?;

    let fetches = files.iter().map(|f| {
        let filename = f.filename.clone();
        let (base, head) = (base.clone(), head.clone());
        async move {
            let base_content = match source.fetch_file_content(&base, &filename).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(file = %filename, error = %e, "base content fetch failed");
                    None
                }
            };
            let head_content = match source.fetch_file_content(&head, &filename).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(file = %filename, error = %e, "head content fetch failed");
                    None
                }
            };
            (base_content, head_content)
        }
    });

    let contents = join_all(fetches).await;
    for (file, (base_content, head_content)) in files.iter_mut().zip(contents) {
        file.base_content = base_content;
        file.head_content = head_content;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use crate::testing::mock_git::MockChangeSource;

    #[tokio::test]
    async fn test_prefetch_attaches_only_available_content() {
        let mut source = MockChangeSource::with_files(vec![fixtures::simple_change()]);
        source.insert_content("feature", "src/math.rs", "pub fn sum() {}");

        let mut files = source.list_changed_files().await.unwrap();
        prefetch_contents(&source, &mut files).await.unwrap();

        assert_eq!(files[0].head_content.as_deref(), Some("pub fn sum() {}"));
        assert!(files[0].base_content.is_none());
    }
}
