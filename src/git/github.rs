use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use super::ChangeSource;
use super::types::FileChange;
use crate::config::types::Settings;
use crate::error::ReviewerError;

const USER_AGENT: &str = concat!("code-reviewer-rs/", env!("CARGO_PKG_VERSION"));

/// GitHub REST change source for one pull request.
pub struct GithubSource {
    client: Client,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
    pr_number: u64,
}

impl GithubSource {
    pub fn new(
        settings: &Settings,
        owner: impl Into<String>,
        repo: impl Into<String>,
        pr_number: u64,
    ) -> Result<Self, ReviewerError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(ReviewerError::Http)?;

        Ok(Self {
            client,
            api_base: settings.github.api_base.trim_end_matches('/').to_string(),
            token: settings.github.token.clone(),
            owner: owner.into(),
            repo: repo.into(),
            pr_number,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }
        req
    }

    async fn pull_request(&self) -> Result<PullResponse, ReviewerError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_base, self.owner, self.repo, self.pr_number
        );
        let resp = self.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(ReviewerError::ContentSource(format!(
                "fetching PR failed with {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ChangeSource for GithubSource {
    async fn list_changed_files(&self) -> Result<Vec<FileChange>, ReviewerError> {
        let mut files = Vec::new();
        let mut page = 1u32;

        loop {
            let url = format!(
                "{}/repos/{}/{}/pulls/{}/files?per_page=100&page={page}",
                self.api_base, self.owner, self.repo, self.pr_number
            );
            let resp = self.get(&url).send().await?;
            if !resp.status().is_success() {
                return Err(ReviewerError::ContentSource(format!(
                    "listing changed files failed with {}",
                    resp.status()
                )));
            }
            let batch: Vec<PullFile> = resp.json().await?;
            let done = batch.len() < 100;

            for entry in batch {
                // Binary files come back without a patch; skip them here so
                // downstream only ever sees textual diffs.
                if let Some(patch) = entry.patch {
                    files.push(FileChange::new(entry.filename, patch));
                }
            }

            if done {
                break;
            }
            page += 1;
        }

        Ok(files)
    }

    async fn fetch_file_content(
        &self,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>, ReviewerError> {
        let url = format!(
            "{}/repos/{}/{}/contents/{path}?ref={git_ref}",
            self.api_base, self.owner, self.repo
        );
        let resp = self.get(&url).send().await?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ReviewerError::ContentSource(format!(
                "fetching content of {path} failed with {}",
                resp.status()
            )));
        }

        let body: ContentResponse = resp.json().await?;
        if body.encoding.as_deref() != Some("base64") {
            return Ok(None);
        }

        let raw: String = body.content.unwrap_or_default();
        let compact: String = raw.split_whitespace().collect();
        let bytes = match base64::engine::general_purpose::STANDARD.decode(compact) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(path, error = %e, "content blob is not valid base64");
                return Ok(None);
            }
        };

        // Non-UTF-8 blobs are binary as far as the review is concerned.
        Ok(String::from_utf8(bytes).ok())
    }

    async fn head_ref(&self) -> Result<String, ReviewerError> {
        Ok(self.pull_request().await?.head.r#ref)
    }

    async fn base_ref(&self) -> Result<String, ReviewerError> {
        Ok(self.pull_request().await?.base.r#ref)
    }
}

// ── Response deserialization ───────────────────────────────────────

#[derive(Deserialize)]
struct PullFile {
    filename: String,
    patch: Option<String>,
}

#[derive(Deserialize)]
struct ContentResponse {
    content: Option<String>,
    encoding: Option<String>,
}

#[derive(Deserialize)]
struct PullResponse {
    head: BranchRef,
    base: BranchRef,
}

#[derive(Deserialize)]
struct BranchRef {
    r#ref: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_response() {
        let raw = r#"{"content": "aGVsbG8=\n", "encoding": "base64", "size": 5}"#;
        let body: ContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.encoding.as_deref(), Some("base64"));

        let compact: String = body.content.unwrap().split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "hello");
    }

    #[test]
    fn test_parse_content_response_submodule_shape() {
        // Submodule and directory entries carry no content/encoding
        let raw = r#"{"size": 0}"#;
        let body: ContentResponse = serde_json::from_str(raw).unwrap();
        assert!(body.content.is_none());
        assert_ne!(body.encoding.as_deref(), Some("base64"));
    }
}
