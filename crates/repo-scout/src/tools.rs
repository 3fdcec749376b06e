//! Tool execution boundary: validate, execute, normalize.
//!
//! `execute` never returns `Err`. Every failure — bad parameters, unknown
//! tool, upstream HTTP trouble — becomes a structured payload with an
//! `error` field, so a tool failure is just another observation for the
//! oracle and the loop keeps running.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine as _;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::ScoutConfig;
use crate::github::{split_repo, GithubError, RepoHost};

/// Item cap applied to both search result lists.
const MAX_SEARCH_ITEMS: usize = 10;
/// Issue body excerpt length (characters) before the ellipsis.
const ISSUE_BODY_EXCERPT: usize = 200;

/// The fixed tool vocabulary the oracle may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    SearchCode,
    SearchIssues,
    GetRepoStructure,
    GetFileContents,
}

impl FromStr for ToolKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search_code" => Ok(Self::SearchCode),
            "search_issues" => Ok(Self::SearchIssues),
            "get_repo_structure" => Ok(Self::GetRepoStructure),
            "get_file_contents" => Ok(Self::GetFileContents),
            _ => Err(()),
        }
    }
}

/// Executes one tool invocation per loop iteration against the repo host.
pub struct ToolExecutor {
    host: Arc<dyn RepoHost>,
    /// Repositories searched when the action does not name its own.
    repositories: Vec<String>,
    /// Qualifiers appended to every composed search query.
    qualifiers: BTreeMap<String, String>,
}

impl ToolExecutor {
    pub fn new(host: Arc<dyn RepoHost>, config: &ScoutConfig) -> Self {
        Self {
            host,
            repositories: config.repositories.clone(),
            qualifiers: config.search_qualifiers.clone(),
        }
    }

    /// Run `tool` with `parameters`; always yields a payload, never an error.
    pub async fn execute(&self, tool: &str, parameters: &Map<String, Value>) -> Value {
        let Ok(kind) = ToolKind::from_str(tool) else {
            return error_payload(format!("Unknown tool: {tool}"));
        };
        debug!(tool, "executing tool");
        match kind {
            ToolKind::SearchCode => self.search_code(parameters).await,
            ToolKind::SearchIssues => self.search_issues(parameters).await,
            ToolKind::GetRepoStructure => self.repo_structure(parameters).await,
            ToolKind::GetFileContents => self.file_contents(parameters).await,
        }
    }

    // ── Search tools ─────────────────────────────────────────────────────

    async fn search_code(&self, parameters: &Map<String, Value>) -> Value {
        let query = match self.composed_query(parameters) {
            Ok(q) => q,
            Err(payload) => return payload,
        };
        match self.host.search_code(&query).await {
            Err(e) => host_error_payload(e),
            Ok(results) => {
                let items: Vec<Value> = list_items(&results)
                    .iter()
                    .take(MAX_SEARCH_ITEMS)
                    .map(|item| {
                        json!({
                            "name": item.get("name"),
                            "path": item.get("path"),
                            "repository": item.pointer("/repository/full_name"),
                            "url": item.get("html_url"),
                            "score": item.get("score"),
                        })
                    })
                    .collect();
                json!({
                    "total_count": results.get("total_count").and_then(Value::as_u64).unwrap_or(0),
                    "items": items,
                })
            }
        }
    }

    async fn search_issues(&self, parameters: &Map<String, Value>) -> Value {
        let query = match self.composed_query(parameters) {
            Ok(q) => q,
            Err(payload) => return payload,
        };
        match self.host.search_issues(&query).await {
            Err(e) => host_error_payload(e),
            Ok(results) => {
                let items: Vec<Value> = list_items(&results)
                    .iter()
                    .take(MAX_SEARCH_ITEMS)
                    .map(|item| {
                        let labels: Vec<Value> = item
                            .get("labels")
                            .and_then(Value::as_array)
                            .map(|ls| ls.iter().filter_map(|l| l.get("name").cloned()).collect())
                            .unwrap_or_default();
                        json!({
                            "title": item.get("title"),
                            "number": item.get("number"),
                            "state": item.get("state"),
                            "repository": repo_from_url(item.get("repository_url")),
                            "url": item.get("html_url"),
                            "body": item.get("body").and_then(Value::as_str).map(excerpt),
                            "labels": labels,
                        })
                    })
                    .collect();
                json!({
                    "total_count": results.get("total_count").and_then(Value::as_u64).unwrap_or(0),
                    "items": items,
                })
            }
        }
    }

    /// Compose the full search query: free text, configured qualifiers, then
    /// one `repo:` qualifier per permitted repository. The search endpoint
    /// requires qualifiers inside the query text, not as request fields.
    fn composed_query(&self, parameters: &Map<String, Value>) -> Result<String, Value> {
        let query = parameters
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if query.is_empty() {
            return Err(error_payload("query parameter is required"));
        }

        let repos: Vec<String> = parameters
            .get("repos")
            .and_then(Value::as_array)
            .map(|rs| {
                rs.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .filter(|rs: &Vec<String>| !rs.is_empty())
            .unwrap_or_else(|| self.repositories.clone());

        let mut parts = vec![query.to_string()];
        parts.extend(self.qualifiers.iter().map(|(k, v)| format!("{k}:{v}")));
        parts.extend(repos.iter().map(|r| format!("repo:{r}")));
        Ok(parts.join(" "))
    }

    // ── Structure / contents tools ───────────────────────────────────────

    async fn repo_structure(&self, parameters: &Map<String, Value>) -> Value {
        let Some((repo, owner, name)) = valid_repo(parameters) else {
            return error_payload("Invalid repo parameter. Must be in format owner/name");
        };
        let branch = optional_str(parameters, "branch");

        match self.host.repo_tree(owner, name, branch).await {
            Err(e) => host_error_payload(e),
            Ok(tree_data) => {
                let items = tree_data
                    .get("tree")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();

                let mut directories = Vec::new();
                let mut files = Vec::new();
                for item in &items {
                    let Some(path) = item.get("path").and_then(Value::as_str) else {
                        continue;
                    };
                    if item.get("type").and_then(Value::as_str) == Some("tree") {
                        directories.push(path.to_string());
                    } else {
                        files.push(path.to_string());
                    }
                }
                directories.sort();
                files.sort();

                json!({
                    "repository": repo,
                    "total_items": items.len(),
                    "total_directories": directories.len(),
                    "total_files": files.len(),
                    "directories": directories,
                    "files": files,
                })
            }
        }
    }

    async fn file_contents(&self, parameters: &Map<String, Value>) -> Value {
        let Some((repo, owner, name)) = valid_repo(parameters) else {
            return error_payload("Invalid repo parameter. Must be in format owner/name");
        };
        let Some(path) = optional_str(parameters, "path") else {
            return error_payload("path parameter is required");
        };
        let branch = optional_str(parameters, "branch");

        match self.host.file_contents(owner, name, path, branch).await {
            Err(e) => host_error_payload(e),
            Ok(file_data) => {
                let encoding = file_data
                    .get("encoding")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let raw = file_data.get("content").and_then(Value::as_str).unwrap_or("");
                let content = if encoding == "base64" && !raw.is_empty() {
                    decode_content(raw)
                } else {
                    raw.to_string()
                };

                json!({
                    "repository": repo,
                    "path": path,
                    "name": file_data.get("name"),
                    "size": file_data.get("size"),
                    "type": file_data.get("type"),
                    "sha": file_data.get("sha"),
                    "encoding": encoding,
                    "content": content,
                    "url": file_data.get("html_url"),
                })
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn error_payload(message: impl Into<String>) -> Value {
    json!({"error": message.into()})
}

/// Flatten a host error into a payload; rate limits keep their retry estimate
/// as a structured field so callers above the loop can implement backoff.
fn host_error_payload(err: GithubError) -> Value {
    let message = err.to_string();
    match err {
        GithubError::RateLimited {
            retry_after: Some(secs),
        } => json!({"error": message, "retry_after_secs": secs}),
        _ => error_payload(message),
    }
}

fn list_items(results: &Value) -> Vec<Value> {
    results
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn optional_str<'a>(parameters: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    parameters
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Pull a validated `repo` parameter apart; `None` means a validation error.
fn valid_repo(parameters: &Map<String, Value>) -> Option<(&str, &str, &str)> {
    let repo = optional_str(parameters, "repo")?;
    let (owner, name) = split_repo(repo)?;
    if name.contains('/') {
        return None;
    }
    Some((repo, owner, name))
}

/// `https://api.github.com/repos/owner/name` → `owner/name`.
fn repo_from_url(url: Option<&Value>) -> Value {
    let Some(url) = url.and_then(Value::as_str) else {
        return Value::Null;
    };
    let mut segments = url.rsplit('/');
    let name = segments.next().unwrap_or_default();
    let owner = segments.next().unwrap_or_default();
    if owner.is_empty() || name.is_empty() {
        Value::Null
    } else {
        Value::String(format!("{owner}/{name}"))
    }
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= ISSUE_BODY_EXCERPT {
        body.to_string()
    } else {
        let cut: String = body.chars().take(ISSUE_BODY_EXCERPT).collect();
        format!("{cut}...")
    }
}

/// Decode a base64 content payload. GitHub wraps the base64 text with
/// newlines, so whitespace is stripped before decoding. Non-UTF-8 decodes
/// become a readable placeholder naming the byte size.
fn decode_content(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match base64::engine::general_purpose::STANDARD.decode(cleaned.as_bytes()) {
        Err(e) => format!("[Error decoding content: {e}]"),
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => format!("[Binary file, size: {} bytes]", e.as_bytes().len()),
        },
    }
}
