//! Runtime configuration for the agent, the GitHub boundary, and the oracle.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (applied by the binary after loading)
//! 2. Values from an optional TOML config file
//! 3. Environment variable overrides (`SCOUT_*`, `GITHUB_TOKEN`)
//! 4. Built-in defaults

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use serde::Deserialize;

/// Default GitHub REST endpoint.
const DEFAULT_GITHUB_BASE_URL: &str = "https://api.github.com";
/// REST API version header value.
const DEFAULT_GITHUB_API_VERSION: &str = "2022-11-28";
/// Per-request timeout against the GitHub API.
const DEFAULT_GITHUB_TIMEOUT_SECS: u64 = 15;
/// Default chat-completions endpoint (GitHub Models inference).
const DEFAULT_ORACLE_ENDPOINT: &str = "https://models.github.ai/inference";
/// Default decision model.
const DEFAULT_ORACLE_MODEL: &str = "mistral-ai/Codestral-2501";
/// Iteration ceiling before the loop gives up with the exhaustion message.
const DEFAULT_MAX_ITERATIONS: u32 = 10;
/// Character budget for a single observation fed back into the conversation.
const DEFAULT_OBSERVATION_LIMIT: usize = 1_500;

const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
const ENV_GITHUB_BASE_URL: &str = "SCOUT_GITHUB_BASE_URL";
const ENV_ORACLE_ENDPOINT: &str = "SCOUT_ORACLE_ENDPOINT";
const ENV_ORACLE_MODEL: &str = "SCOUT_ORACLE_MODEL";
const ENV_ORACLE_API_KEY: &str = "SCOUT_ORACLE_API_KEY";
const ENV_MAX_ITERATIONS: &str = "SCOUT_MAX_ITERATIONS";

/// GitHub REST boundary configuration.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// Base URL for the REST API.
    pub base_url: String,
    /// Bearer token. Unauthenticated requests work but rate-limit quickly.
    pub token: Option<String>,
    /// Value of the `X-GitHub-Api-Version` header.
    pub api_version: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            base_url: env::var(ENV_GITHUB_BASE_URL)
                .unwrap_or_else(|_| DEFAULT_GITHUB_BASE_URL.to_string()),
            token: env::var(ENV_GITHUB_TOKEN).ok(),
            api_version: DEFAULT_GITHUB_API_VERSION.to_string(),
            timeout_secs: DEFAULT_GITHUB_TIMEOUT_SECS,
        }
    }
}

/// Chat-completions oracle configuration.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Base URL of the OpenAI-compatible endpoint (without `/chat/completions`).
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// API key. Falls back to the GitHub token, which GitHub Models accepts.
    pub api_key: Option<String>,
    pub temperature: f64,
    pub top_p: f64,
    /// Completion cap per oracle call, leaving room for observations.
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: env::var(ENV_ORACLE_ENDPOINT)
                .unwrap_or_else(|_| DEFAULT_ORACLE_ENDPOINT.to_string()),
            model: env::var(ENV_ORACLE_MODEL).unwrap_or_else(|_| DEFAULT_ORACLE_MODEL.to_string()),
            api_key: env::var(ENV_ORACLE_API_KEY)
                .ok()
                .or_else(|| env::var(ENV_GITHUB_TOKEN).ok()),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1_000,
        }
    }
}

/// Top-level configuration consumed by the agent.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub github: GithubConfig,
    pub oracle: OracleConfig,
    /// Maximum reasoning iterations per query.
    pub max_iterations: u32,
    /// Character budget applied to tool observations before they re-enter
    /// the conversation.
    pub observation_limit: usize,
    /// Repositories the agent is permitted to query, as `owner/name`.
    pub repositories: Vec<String>,
    /// Extra search qualifiers appended to every search query, e.g.
    /// `{"is": "issue"}` becomes `is:issue`.
    pub search_qualifiers: BTreeMap<String, String>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        let max_iterations = env::var(ENV_MAX_ITERATIONS)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ITERATIONS);
        Self {
            github: GithubConfig::default(),
            oracle: OracleConfig::default(),
            max_iterations,
            observation_limit: DEFAULT_OBSERVATION_LIMIT,
            repositories: Vec::new(),
            search_qualifiers: BTreeMap::new(),
        }
    }
}

/// On-disk TOML shape. Every field optional; present fields override.
#[derive(Debug, Default, Deserialize)]
struct ScoutFile {
    repositories: Option<Vec<String>>,
    search_qualifiers: Option<BTreeMap<String, String>>,
    max_iterations: Option<u32>,
    observation_limit: Option<usize>,
    oracle_endpoint: Option<String>,
    oracle_model: Option<String>,
    github_base_url: Option<String>,
}

impl ScoutConfig {
    /// Build from environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Load a TOML file and merge it over `self`.
    pub fn merge_file(mut self, path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config file {}: {e}", path.display()))?;
        let file: ScoutFile =
            toml::from_str(&raw).map_err(|e| format!("invalid config file: {e}"))?;

        if let Some(repos) = file.repositories {
            self.repositories = repos;
        }
        if let Some(quals) = file.search_qualifiers {
            self.search_qualifiers = quals;
        }
        if let Some(n) = file.max_iterations {
            self.max_iterations = n;
        }
        if let Some(n) = file.observation_limit {
            self.observation_limit = n;
        }
        if let Some(url) = file.oracle_endpoint {
            self.oracle.endpoint = url;
        }
        if let Some(model) = file.oracle_model {
            self.oracle.model = model;
        }
        if let Some(url) = file.github_base_url {
            self.github.base_url = url;
        }
        Ok(self)
    }

    /// Validate the config; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("max_iterations must be > 0".to_string());
        }
        if self.observation_limit < 64 {
            return Err(format!(
                "observation_limit must be at least 64, got {}",
                self.observation_limit
            ));
        }
        if !(0.0..=1.0).contains(&self.oracle.temperature) {
            return Err(format!(
                "temperature must be in [0, 1], got {}",
                self.oracle.temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.oracle.top_p) {
            return Err(format!("top_p must be in [0, 1], got {}", self.oracle.top_p));
        }
        for repo in &self.repositories {
            match crate::github::split_repo(repo) {
                Some((_, name)) if !name.contains('/') => {}
                _ => return Err(format!("repository `{repo}` is not in owner/name form")),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = ScoutConfig::default();
        cfg.validate().expect("default config should be valid");
    }

    #[test]
    fn zero_max_iterations_rejected() {
        let mut cfg = ScoutConfig::default();
        cfg.max_iterations = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_repository_rejected() {
        for bad in ["not-a-repo", "owner/", "/name", "a/b/c"] {
            let mut cfg = ScoutConfig::default();
            cfg.repositories = vec![bad.to_string()];
            assert!(cfg.validate().is_err(), "expected rejection for {bad:?}");
        }
    }

    #[test]
    fn valid_repositories_accepted() {
        let mut cfg = ScoutConfig::default();
        cfg.repositories = vec!["adoptium/aqa-tests".to_string(), "eclipse-openj9/openj9".into()];
        cfg.validate().expect("owner/name repos should validate");
    }

    #[test]
    fn tiny_observation_limit_rejected() {
        let mut cfg = ScoutConfig::default();
        cfg.observation_limit = 10;
        assert!(cfg.validate().is_err());
    }
}
