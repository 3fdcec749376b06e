//! Repository structure index: context seeding for search-query accuracy.
//!
//! One recursive tree fetch per permitted repository, condensed into a
//! directory list and a file-extension histogram. The rendered context block
//! goes into the first user message so the oracle can write qualifiers
//! (`path:`, `extension:`, `filename:`) that match what actually exists.
//!
//! Index entries are read-only once built. The process-wide `IndexCache` is
//! keyed by the sorted repository set, populated under a lock so concurrent
//! queries never observe a half-built index, and replaced wholesale — never
//! merged — when the caller supplies a different repository set.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::github::{split_repo, RepoHost};

/// Directory count shown per repository in the context block.
const CONTEXT_MAX_DIRS: usize = 10;
/// Extension count shown per repository.
const CONTEXT_MAX_EXTENSIONS: usize = 15;
/// Root-level key files shown per repository.
const CONTEXT_MAX_KEY_FILES: usize = 5;
/// Extensions whose root-level files are worth calling out to the oracle.
const KEY_FILE_EXTENSIONS: &[&str] = &["xml", "gradle", "java", "py", "rs", "md", "json", "yaml", "yml"];

/// Condensed structure of one repository, built from a recursive tree fetch.
#[derive(Debug, Clone)]
pub struct RepoSummary {
    /// Total entries in the tree (directories + files).
    pub total_items: usize,
    /// All directory paths, sorted.
    pub directories: Vec<String>,
    /// File paths grouped by lowercase extension, sorted within each group.
    /// Extension-less files land under `no_extension`.
    pub files_by_extension: BTreeMap<String, Vec<String>>,
}

impl RepoSummary {
    /// Build from a raw `git/trees?recursive=1` response.
    pub fn from_tree(tree_data: &Value) -> Self {
        let items = tree_data
            .get("tree")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut directories = Vec::new();
        let mut files_by_extension: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for item in &items {
            let path = item.get("path").and_then(Value::as_str).unwrap_or("");
            if path.is_empty() {
                continue;
            }
            if item.get("type").and_then(Value::as_str) == Some("tree") {
                directories.push(path.to_string());
            } else {
                let ext = Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase())
                    .unwrap_or_else(|| "no_extension".to_string());
                files_by_extension.entry(ext).or_default().push(path.to_string());
            }
        }

        directories.sort();
        for files in files_by_extension.values_mut() {
            files.sort();
        }

        Self {
            total_items: items.len(),
            directories,
            files_by_extension,
        }
    }

    pub fn total_directories(&self) -> usize {
        self.directories.len()
    }

    /// Root-level files with extensions the oracle commonly needs to see
    /// (build files, configs, docs), capped for context economy.
    fn key_files(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for ext in KEY_FILE_EXTENSIONS {
            if let Some(files) = self.files_by_extension.get(*ext) {
                out.extend(
                    files
                        .iter()
                        .filter(|f| !f.contains('/'))
                        .take(3)
                        .map(String::as_str),
                );
            }
        }
        out.truncate(CONTEXT_MAX_KEY_FILES);
        out
    }

    fn top_level_directories(&self) -> Vec<&str> {
        self.directories
            .iter()
            .filter(|d| !d.starts_with('.') && !d.contains('/'))
            .take(CONTEXT_MAX_DIRS)
            .map(String::as_str)
            .collect()
    }
}

/// Per-repository index entry: either a summary or the load failure.
#[derive(Debug, Clone)]
pub enum IndexEntry {
    Loaded(RepoSummary),
    /// Structure fetch failed; the repo stays queryable, just without context.
    Failed(String),
}

/// The index over all permitted repositories for one repository set.
#[derive(Debug, Default)]
pub struct RepositoryIndex {
    entries: BTreeMap<String, IndexEntry>,
}

impl RepositoryIndex {
    pub fn get(&self, repo: &str) -> Option<&IndexEntry> {
        self.entries.get(repo)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the context block injected into the first user message.
    pub fn context_block(&self) -> String {
        if self.entries.is_empty() {
            return "No repository structure information available.".to_string();
        }

        let mut parts = vec!["REPOSITORY STRUCTURE CONTEXT:".to_string()];
        for (repo, entry) in &self.entries {
            match entry {
                IndexEntry::Failed(reason) => {
                    parts.push(format!("\n{repo}: [Error loading structure: {reason}]"));
                }
                IndexEntry::Loaded(summary) => {
                    parts.push(format!("\n{repo}:"));
                    parts.push(format!("  Total files/dirs: {}", summary.total_items));

                    let dirs = summary.top_level_directories();
                    if !dirs.is_empty() {
                        parts.push(format!("  Top-level directories: {}", dirs.join(", ")));
                    }

                    let extensions: Vec<&str> = summary
                        .files_by_extension
                        .keys()
                        .take(CONTEXT_MAX_EXTENSIONS)
                        .map(String::as_str)
                        .collect();
                    if !extensions.is_empty() {
                        parts.push(format!("  File types: {}", extensions.join(", ")));
                    }

                    let key_files = summary.key_files();
                    if !key_files.is_empty() {
                        parts.push(format!("  Key files: {}", key_files.join(", ")));
                    }
                }
            }
        }
        parts.join("\n")
    }
}

/// Process-wide, read-mostly cache of repository indices.
///
/// Population is serialized: the lock is held across the build so two queries
/// arriving with the same new repository set trigger exactly one fetch pass.
#[derive(Default)]
pub struct IndexCache {
    slot: Mutex<Option<(Vec<String>, Arc<RepositoryIndex>)>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index for `repos`, building it on first use or whenever the
    /// repository set differs from the cached one.
    pub async fn load(&self, host: &dyn RepoHost, repos: &[String]) -> Arc<RepositoryIndex> {
        let mut key: Vec<String> = repos.to_vec();
        key.sort();
        key.dedup();

        let mut slot = self.slot.lock().await;
        if let Some((cached_key, index)) = slot.as_ref() {
            if *cached_key == key {
                return Arc::clone(index);
            }
        }

        info!(repos = key.len(), "building repository index");
        let mut index = RepositoryIndex::default();
        for repo in &key {
            let entry = match split_repo(repo) {
                None => IndexEntry::Failed(format!("`{repo}` is not in owner/name form")),
                Some((owner, name)) => match host.repo_tree(owner, name, None).await {
                    Ok(tree) => {
                        let summary = RepoSummary::from_tree(&tree);
                        info!(repo = %repo, items = summary.total_items, "structure loaded");
                        IndexEntry::Loaded(summary)
                    }
                    Err(e) => {
                        warn!(repo = %repo, error = %e, "structure load failed");
                        IndexEntry::Failed(e.to_string())
                    }
                },
            };
            index.entries.insert(repo.clone(), entry);
        }

        let index = Arc::new(index);
        *slot = Some((key, Arc::clone(&index)));
        index
    }
}
