//! repo-scout: a reason-then-act agent answering questions about a fixed set
//! of GitHub repositories.
//!
//! Given a question, the agent loops: consult a chat-completions oracle,
//! interpret its free-form reply as either one structured tool action or a
//! terminal answer, execute at most one tool per iteration, feed the
//! compressed observation back, and stop on an accepted answer or on the
//! iteration ceiling. Every collaborator — oracle, repository host, index
//! cache — is injected, so the loop itself is deterministic and testable
//! offline.

pub mod agent;
pub mod config;
pub mod github;
pub mod index;
pub mod oracle;
pub mod prompts;
pub mod tools;

pub use agent::{Agent, AgentError, AnswerPolicy, QueryReport, Termination};
pub use config::ScoutConfig;
pub use github::{GithubClient, GithubError, RepoHost};
pub use index::IndexCache;
pub use oracle::{ChatCompletionsOracle, Message, ModelOracle, OracleError, Role};
pub use tools::ToolExecutor;
