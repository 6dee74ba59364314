//! Change-request metadata collaborator.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ApplyError, Result};

/// One file touched by a merged change request, repo-relative.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangedFile {
    #[serde(rename = "filename")]
    pub path: String,
}

/// Source of merged change-request metadata.
#[async_trait]
pub trait SourceControlClient: Send + Sync {
    /// Whether the change request has been merged.
    async fn is_merged(&self, pr_number: u64) -> Result<bool>;

    /// Files touched by the change request, in API order.
    async fn changed_files(&self, pr_number: u64) -> Result<Vec<ChangedFile>>;
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    merged: bool,
}

/// GitHub REST implementation of [`SourceControlClient`].
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    repo: String,
    token: String,
}

impl GithubClient {
    /// `repo` is `owner/name`; `token` a PAT with read access.
    pub fn new(repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_api_base("https://api.github.com", repo, token)
    }

    /// Point the client at a different API host (test servers).
    pub fn with_api_base(
        api_base: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            repo: repo.into(),
            token: token.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "nsapply")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApplyError::Scm(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(ApplyError::Scm(format!(
                "GET {url}: status {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApplyError::Scm(format!("decoding {url}: {e}")))
    }
}

#[async_trait]
impl SourceControlClient for GithubClient {
    async fn is_merged(&self, pr_number: u64) -> Result<bool> {
        let url = format!("{}/repos/{}/pulls/{}", self.api_base, self.repo, pr_number);
        let pr: PullRequest = self.get_json(&url).await?;
        Ok(pr.merged)
    }

    async fn changed_files(&self, pr_number: u64) -> Result<Vec<ChangedFile>> {
        let mut files = Vec::new();
        // The files endpoint pages at 100 entries.
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}/repos/{}/pulls/{}/files?per_page=100&page={}",
                self.api_base, self.repo, pr_number, page
            );
            let batch: Vec<ChangedFile> = self.get_json(&url).await?;
            if batch.is_empty() {
                break;
            }
            files.extend(batch);
            page += 1;
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_file_deserializes_github_shape() {
        let raw = r#"[{"filename": "namespaces/live/team-a/00-namespace.yaml", "status": "modified"}]"#;
        let files: Vec<ChangedFile> = serde_json::from_str(raw).unwrap();
        assert_eq!(files[0].path, "namespaces/live/team-a/00-namespace.yaml");
    }

    #[test]
    fn test_pull_request_deserializes_merged_flag() {
        let raw = r#"{"number": 42, "merged": true, "state": "closed"}"#;
        let pr: PullRequest = serde_json::from_str(raw).unwrap();
        assert!(pr.merged);
    }
}
