//! GitHub client for the themes repository.
//!
//! The read side backs the sync job (directory listing + per-theme meta.json);
//! the write side backs the drain job, turning one batch of staged file
//! operations into a branch and a single pull request. Listing failures are
//! returned as errors, never as an empty listing, so callers can tell
//! "no themes" apart from "fetch failed".

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::RemoteThemeMetadata;

/// GitHub REST API base URL
const GITHUB_API_BASE: &str = "https://api.github.com";

/// Raw file content base URL
const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// User agent sent with every request (required by the GitHub API)
const USER_AGENT: &str = "themehub-sync";

/// Read side of the themes repository.
#[async_trait]
pub trait ThemeSource: Send + Sync {
    /// List the ids (directory names) of all themes in the repository.
    async fn list_theme_ids(&self) -> Result<Vec<String>, AppError>;

    /// Fetch the parsed meta.json for one theme.
    ///
    /// Returns `None` when the file is missing, unreachable or malformed, so
    /// a single broken theme never aborts the rest of a sync pass.
    async fn fetch_metadata(
        &self,
        theme_id: &str,
    ) -> Result<Option<RemoteThemeMetadata>, AppError>;
}

/// Write side of the themes repository.
#[async_trait]
pub trait ThemePublisher: Send + Sync {
    /// Submit one batched change set as a single pull request.
    async fn submit(&self, change_set: &ChangeSet) -> Result<PullRequestRef, AppError>;
}

/// A staged file addition; the path is repository-relative.
#[derive(Debug, Clone)]
pub struct FileAddition {
    pub path: String,
    pub content: Bytes,
}

/// One batch of staged repository operations.
///
/// All additions and removals land on one branch and one pull request, so a
/// drain run never produces a commit per theme.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub title: String,
    pub body: String,
    pub additions: Vec<FileAddition>,
    /// Repository-relative directories to remove recursively
    pub removals: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Reference to a submitted pull request.
#[derive(Debug, Clone)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
}

/// One entry of a repository contents listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoContentEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    html_url: String,
}

/// GitHub API client implementing both repository seams.
pub struct GithubClient {
    client: reqwest::Client,
    owner: String,
    repo: String,
    branch: String,
    themes_path: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            owner: config.github_owner.clone(),
            repo: config.github_repo.clone(),
            branch: config.github_branch.clone(),
            themes_path: config.themes_path.clone(),
            token: config.github_token.clone(),
        })
    }

    fn api_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            GITHUB_API_BASE, self.owner, self.repo, suffix
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("token {}", token));
        }
        builder
    }

    async fn branch_head_sha(&self, branch: &str) -> Result<String, AppError> {
        let url = self.api_url(&format!("git/ref/heads/{}", branch));
        let response = self.request(reqwest::Method::GET, &url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Publish(format!(
                "Resolving branch {} returned status {}",
                branch,
                response.status()
            )));
        }

        let git_ref: GitRef = response
            .json()
            .await
            .map_err(|e| AppError::RemoteFormat(format!("Malformed ref payload: {}", e)))?;
        Ok(git_ref.object.sha)
    }

    async fn create_branch(&self, name: &str, sha: &str) -> Result<(), AppError> {
        let url = self.api_url("git/refs");
        let body = json!({ "ref": format!("refs/heads/{}", name), "sha": sha });
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Publish(format!(
                "Creating branch {} returned status {}",
                name,
                response.status()
            )));
        }

        debug!("Created branch {}", name);
        Ok(())
    }

    /// SHA of an existing file on the given branch, or None if absent.
    async fn content_sha(&self, path: &str, branch: &str) -> Result<Option<String>, AppError> {
        let url = format!("{}?ref={}", self.api_url(&format!("contents/{}", path)), branch);
        let response = self.request(reqwest::Method::GET, &url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Publish(format!(
                "Looking up {} returned status {}",
                path,
                response.status()
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::RemoteFormat(format!("Malformed contents payload: {}", e)))?;
        Ok(value
            .get("sha")
            .and_then(|sha| sha.as_str())
            .map(|sha| sha.to_string()))
    }

    /// Create or update a file on the given branch.
    ///
    /// The existing SHA is looked up first so a retried batch overwrites its
    /// own previous write instead of failing on "file exists".
    async fn put_file(
        &self,
        branch: &str,
        path: &str,
        content: &Bytes,
        message: &str,
    ) -> Result<(), AppError> {
        let existing_sha = self.content_sha(path, branch).await?;

        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": branch,
        });
        if let Some(sha) = existing_sha {
            body["sha"] = json!(sha);
        }

        let url = self.api_url(&format!("contents/{}", path));
        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Publish(format!(
                "Adding {} returned status {}",
                path,
                response.status()
            )));
        }

        debug!("Added file {}", path);
        Ok(())
    }

    /// List the entries of a directory on the given branch; empty if absent.
    async fn list_dir(&self, path: &str, branch: &str) -> Result<Vec<RepoContentEntry>, AppError> {
        let url = format!("{}?ref={}", self.api_url(&format!("contents/{}", path)), branch);
        let response = self.request(reqwest::Method::GET, &url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(AppError::Publish(format!(
                "Listing {} returned status {}",
                path,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::RemoteFormat(format!("Malformed listing payload: {}", e)))
    }

    async fn delete_file(
        &self,
        branch: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), AppError> {
        let url = self.api_url(&format!("contents/{}", path));
        let body = json!({ "message": message, "sha": sha, "branch": branch });
        let response = self
            .request(reqwest::Method::DELETE, &url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Publish(format!(
                "Removing {} returned status {}",
                path,
                response.status()
            )));
        }

        debug!("Removed file {}", path);
        Ok(())
    }

    /// Remove a directory recursively on the given branch.
    async fn remove_dir(&self, branch: &str, dir: &str, message: &str) -> Result<(), AppError> {
        for entry in self.list_dir(dir, branch).await? {
            if entry.entry_type == "dir" {
                Box::pin(self.remove_dir(branch, &entry.path, message)).await?;
            } else {
                self.delete_file(branch, &entry.path, &entry.sha, message)
                    .await?;
            }
        }
        Ok(())
    }

    async fn open_pull_request(
        &self,
        head: &str,
        title: &str,
        body_text: &str,
    ) -> Result<PullRequestRef, AppError> {
        let url = self.api_url("pulls");
        let body = json!({
            "title": title,
            "body": body_text,
            "head": head,
            "base": self.branch,
        });
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Publish(format!(
                "Opening pull request from {} returned status {}",
                head,
                response.status()
            )));
        }

        let pr: PullRequestResponse = response
            .json()
            .await
            .map_err(|e| AppError::RemoteFormat(format!("Malformed pull request payload: {}", e)))?;

        Ok(PullRequestRef {
            number: pr.number,
            url: pr.html_url,
        })
    }
}

#[async_trait]
impl ThemeSource for GithubClient {
    async fn list_theme_ids(&self) -> Result<Vec<String>, AppError> {
        let url = self.api_url(&format!("contents/{}", self.themes_path));
        let response = self.request(reqwest::Method::GET, &url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "Theme listing returned status {}",
                response.status()
            )));
        }

        let entries: Vec<RepoContentEntry> = response
            .json()
            .await
            .map_err(|e| AppError::RemoteFormat(format!("Malformed theme listing: {}", e)))?;

        let folders: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.entry_type == "dir")
            .map(|entry| entry.name)
            .collect();

        debug!("Fetched {} theme folders", folders.len());
        Ok(folders)
    }

    async fn fetch_metadata(
        &self,
        theme_id: &str,
    ) -> Result<Option<RemoteThemeMetadata>, AppError> {
        let url = format!(
            "{}/{}/{}/{}/{}/{}/meta.json",
            GITHUB_RAW_BASE, self.owner, self.repo, self.branch, self.themes_path, theme_id
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Fetching meta.json for theme {} failed: {}", theme_id, e);
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            warn!(
                "Fetching meta.json for theme {} returned status {}",
                theme_id,
                response.status()
            );
            return Ok(None);
        }

        match response.json::<RemoteThemeMetadata>().await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                warn!("Malformed meta.json for theme {}: {}", theme_id, e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ThemePublisher for GithubClient {
    async fn submit(&self, change_set: &ChangeSet) -> Result<PullRequestRef, AppError> {
        if self.token.is_none() {
            return Err(AppError::Publish(
                "No GitHub token configured, cannot submit change set".to_string(),
            ));
        }

        let base_sha = self.branch_head_sha(&self.branch).await?;
        let branch_name = format!("theme-jobs/{}", Uuid::new_v4());
        self.create_branch(&branch_name, &base_sha).await?;

        for addition in &change_set.additions {
            self.put_file(&branch_name, &addition.path, &addition.content, &change_set.title)
                .await?;
        }
        for dir in &change_set.removals {
            self.remove_dir(&branch_name, dir, &change_set.title).await?;
        }

        let pr = self
            .open_pull_request(&branch_name, &change_set.title, &change_set.body)
            .await?;
        info!("Opened pull request #{} ({})", pr.number, pr.url);
        Ok(pr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contents_listing() {
        let raw = r#"[
            {"name": "minimal_midnight", "path": "themes/minimal_midnight", "sha": "a1", "type": "dir"},
            {"name": "README.md", "path": "themes/README.md", "sha": "b2", "type": "file"}
        ]"#;

        let entries: Vec<RepoContentEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_type, "dir");
        assert_eq!(entries[1].name, "README.md");
    }

    #[test]
    fn test_parse_git_ref() {
        let raw = r#"{"ref": "refs/heads/main", "object": {"sha": "abc123", "type": "commit"}}"#;
        let git_ref: GitRef = serde_json::from_str(raw).unwrap();
        assert_eq!(git_ref.object.sha, "abc123");
    }

    #[test]
    fn test_parse_pull_request_response() {
        let raw = r#"{"number": 42, "html_url": "https://github.com/x/y/pull/42", "state": "open"}"#;
        let pr: PullRequestResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.html_url, "https://github.com/x/y/pull/42");
    }

    #[test]
    fn test_change_set_is_empty() {
        let mut change_set = ChangeSet::default();
        assert!(change_set.is_empty());

        change_set.removals.push("themes/old_theme".to_string());
        assert!(!change_set.is_empty());
    }
}
