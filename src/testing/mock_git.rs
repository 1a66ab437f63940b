use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::ReviewerError;
use crate::git::ChangeSource;
use crate::git::types::FileChange;

/// An in-memory [`ChangeSource`] serving a fixed change set.
pub struct MockChangeSource {
    files: Vec<FileChange>,
    /// Keyed by (ref, path).
    contents: HashMap<(String, String), String>,
    list_calls: AtomicUsize,
}

impl MockChangeSource {
    pub fn with_files(files: Vec<FileChange>) -> Self {
        Self {
            files,
            contents: HashMap::new(),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// How many times the change set was listed.
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn insert_content(
        &mut self,
        git_ref: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.contents
            .insert((git_ref.into(), path.into()), content.into());
    }
}

#[async_trait]
impl ChangeSource for MockChangeSource {
    async fn list_changed_files(&self) -> Result<Vec<FileChange>, ReviewerError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.files.clone())
    }

    async fn fetch_file_content(
        &self,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>, ReviewerError> {
        Ok(self
            .contents
            .get(&(git_ref.to_string(), path.to_string()))
            .cloned())
    }

    async fn head_ref(&self) -> Result<String, ReviewerError> {
        Ok("feature".to_string())
    }

    async fn base_ref(&self) -> Result<String, ReviewerError> {
        Ok("main".to_string())
    }
}
