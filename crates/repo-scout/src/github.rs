//! GitHub REST boundary: the four read-only operations the agent's tools use.
//!
//! `RepoHost` is the seam — `ToolExecutor` and the repository index depend on
//! the trait, and tests substitute scripted fakes. `GithubClient` is the
//! production implementation over reqwest.
//!
//! Tree retrieval is a stated multi-hop contract: callers never pass a tree
//! SHA. With no branch given the client resolves the default branch, then the
//! branch head commit's tree SHA, then fetches the tree recursively.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::GithubConfig;

/// Search result page size requested from both search endpoints.
const SEARCH_PER_PAGE: u32 = 10;

/// Errors from the GitHub boundary.
///
/// These never cross the tool-executor boundary as `Err`; the executor
/// flattens them into structured error payloads.
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("GitHub request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("GitHub API rate limit exceeded.{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    #[error("unexpected GitHub response shape: {0}")]
    Unexpected(String),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" Retry after ~{secs}s."),
        None => String::new(),
    }
}

/// Split an `owner/name` identifier into its two non-empty halves.
pub fn split_repo(repo: &str) -> Option<(&str, &str)> {
    let (owner, name) = repo.split_once('/')?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner, name))
}

/// The read-only source-hosting operations the agent consumes.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// `GET /search/code` with a fully composed query string (qualifiers
    /// already embedded — the search endpoint takes them in the query text).
    async fn search_code(&self, query: &str) -> Result<Value, GithubError>;

    /// `GET /search/issues`, same query contract as `search_code`.
    async fn search_issues(&self, query: &str) -> Result<Value, GithubError>;

    /// Recursive tree for `owner/name`, resolving the default branch when
    /// `branch` is `None`. Returns the raw tree response (`tree` array).
    async fn repo_tree(
        &self,
        owner: &str,
        name: &str,
        branch: Option<&str>,
    ) -> Result<Value, GithubError>;

    /// `GET /repos/{owner}/{name}/contents/{path}` — file metadata plus
    /// base64 content.
    async fn file_contents(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Value, GithubError>;
}

/// Production `RepoHost` over the GitHub REST API.
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self, GithubError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Ok(version) = HeaderValue::from_str(&config.api_version) {
            headers.insert("X-GitHub-Api-Version", version);
        }
        if let Some(token) = &config.token {
            if let Ok(auth) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, auth);
            }
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn request(&self, path: &str, params: &[(&str, String)]) -> Result<Value, GithubError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "github request");
        let resp = self.http.get(&url).query(params).send().await?;
        let status = resp.status();

        // 403 with an exhausted quota header is the rate-limit shape; other
        // 403s (e.g. abuse detection) fall through to the generic branch.
        if status.as_u16() == 403 {
            let remaining = resp
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok());
            if remaining == Some("0") {
                let retry_after = resp
                    .headers()
                    .get("x-ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|reset| (reset - chrono::Utc::now().timestamp()).max(0) as u64);
                return Err(GithubError::RateLimited { retry_after });
            }
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(GithubError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl RepoHost for GithubClient {
    async fn search_code(&self, query: &str) -> Result<Value, GithubError> {
        self.request(
            "/search/code",
            &[
                ("q", query.to_string()),
                ("per_page", SEARCH_PER_PAGE.to_string()),
                ("page", "1".to_string()),
            ],
        )
        .await
    }

    async fn search_issues(&self, query: &str) -> Result<Value, GithubError> {
        self.request(
            "/search/issues",
            &[
                ("q", query.to_string()),
                ("per_page", SEARCH_PER_PAGE.to_string()),
                ("page", "1".to_string()),
            ],
        )
        .await
    }

    async fn repo_tree(
        &self,
        owner: &str,
        name: &str,
        branch: Option<&str>,
    ) -> Result<Value, GithubError> {
        let branch = match branch {
            Some(b) => b.to_string(),
            None => {
                let repo = self.request(&format!("/repos/{owner}/{name}"), &[]).await?;
                repo.get("default_branch")
                    .and_then(Value::as_str)
                    .unwrap_or("main")
                    .to_string()
            }
        };

        let branch_data = self
            .request(&format!("/repos/{owner}/{name}/branches/{branch}"), &[])
            .await?;
        let tree_sha = branch_data
            .pointer("/commit/commit/tree/sha")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GithubError::Unexpected(format!("branch {branch} carries no tree sha"))
            })?
            .to_string();

        self.request(
            &format!("/repos/{owner}/{name}/git/trees/{tree_sha}"),
            &[("recursive", "1".to_string())],
        )
        .await
    }

    async fn file_contents(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Value, GithubError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(b) = branch {
            params.push(("ref", b.to_string()));
        }
        self.request(&format!("/repos/{owner}/{name}/contents/{path}"), &params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_repo_accepts_owner_name() {
        assert_eq!(split_repo("adoptium/TKG"), Some(("adoptium", "TKG")));
    }

    #[test]
    fn split_repo_rejects_missing_halves() {
        assert_eq!(split_repo("adoptium"), None);
        assert_eq!(split_repo("/TKG"), None);
        assert_eq!(split_repo("adoptium/"), None);
    }

    #[test]
    fn split_repo_keeps_extra_segments_in_name() {
        // Deep paths are not valid repos, but splitting is on the first slash
        // only — validation against the remainder happens at the tool boundary.
        assert_eq!(split_repo("a/b/c"), Some(("a", "b/c")));
    }

    #[test]
    fn rate_limited_display_names_the_estimate() {
        let err = GithubError::RateLimited {
            retry_after: Some(42),
        };
        let text = err.to_string();
        assert!(text.contains("rate limit"));
        assert!(text.contains("~42s"));
    }

    #[test]
    fn rate_limited_display_without_estimate() {
        let err = GithubError::RateLimited { retry_after: None };
        assert!(err.to_string().contains("rate limit"));
        assert!(!err.to_string().contains("Retry after"));
    }

    #[test]
    fn api_error_display_carries_status_and_message() {
        let err = GithubError::Api {
            status: 422,
            message: "Validation Failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "GitHub API error 422: Validation Failed"
        );
    }
}
