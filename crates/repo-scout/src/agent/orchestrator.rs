//! The iterate-until-answer-or-exhausted orchestration loop.
//!
//! ## Lifecycle
//!
//! ```text
//! Agent::query(question)
//!   → seed conversation (system prompt, question, repository context)
//!   → loop (bounded by max_iterations):
//!       oracle.complete(conversation)
//!       parse action?   → execute tool, compress, append observation
//!       extract answer? → Answered
//!       neither         → append corrective guidance
//!   → ceiling reached  → Exhausted with the fixed fallback message
//! ```
//!
//! Action detection runs before answer detection: a response may legitimately
//! mix explanatory prose mentioning "final answer" with a structured action,
//! and the structural signal wins. True termination then has to pass the
//! stricter single-step rejection rules of the answer extractor.
//!
//! Every collaborator is constructor-injected; the loop holds no process-wide
//! state of its own.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::agent::answer::{extract_answer, AnswerPolicy};
use crate::agent::budget::compress_observation;
use crate::agent::errors::AgentError;
use crate::agent::parser::parse_action;
use crate::config::ScoutConfig;
use crate::github::RepoHost;
use crate::index::IndexCache;
use crate::oracle::{Message, ModelOracle};
use crate::prompts;
use crate::tools::ToolExecutor;

/// How a query run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The oracle produced an accepted terminal answer.
    Answered,
    /// The iteration ceiling was reached; the answer is the fixed fallback.
    Exhausted,
}

/// Outcome of one query: always carries some answer text.
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub answer: String,
    pub iterations: u32,
    pub termination: Termination,
}

/// The reason-then-act agent: one conversation per query, one oracle call and
/// at most one tool execution per iteration.
pub struct Agent {
    config: ScoutConfig,
    oracle: Arc<dyn ModelOracle>,
    host: Arc<dyn RepoHost>,
    executor: ToolExecutor,
    index: Arc<IndexCache>,
    policy: AnswerPolicy,
}

impl Agent {
    pub fn new(
        config: ScoutConfig,
        oracle: Arc<dyn ModelOracle>,
        host: Arc<dyn RepoHost>,
        index: Arc<IndexCache>,
    ) -> Result<Self, AgentError> {
        config.validate().map_err(AgentError::Configuration)?;
        let executor = ToolExecutor::new(Arc::clone(&host), &config);
        Ok(Self {
            config,
            oracle,
            host,
            executor,
            index,
            policy: AnswerPolicy::default(),
        })
    }

    /// Override the hallucination-rejection thresholds.
    pub fn with_answer_policy(mut self, policy: AnswerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run one query to completion. Always returns an answer string unless
    /// the oracle itself fails.
    pub async fn query(&self, question: &str) -> Result<QueryReport, AgentError> {
        let repos = &self.config.repositories;
        let index = self.index.load(self.host.as_ref(), repos).await;
        let context_block = index.context_block();

        let mut messages = vec![
            Message::system(prompts::SYSTEM_PROMPT),
            Message::user(prompts::initial_user_prompt(question, repos, &context_block)),
        ];

        let max = self.config.max_iterations;
        let mut iteration: u32 = 0;

        while iteration < max {
            iteration += 1;
            let response = self.oracle.complete(&messages).await?;
            debug!(iteration, chars = response.len(), "oracle response");

            if let Some(action) = parse_action(&response) {
                info!(iteration, tool = %action.tool, "executing action");
                let result = self.executor.execute(&action.tool, &action.parameters).await;
                let serialized = serde_json::to_string_pretty(&result)
                    .unwrap_or_else(|_| result.to_string());
                let observation =
                    compress_observation(&serialized, self.config.observation_limit);

                messages.push(Message::assistant(response));
                messages.push(Message::user(prompts::observation_message(&observation)));
                continue;
            }

            if let Some(answer) = extract_answer(&response, &self.policy) {
                info!(iteration, "terminal answer accepted");
                return Ok(QueryReport {
                    answer,
                    iterations: iteration,
                    termination: Termination::Answered,
                });
            }

            warn!(iteration, "response had neither action nor acceptable answer");
            messages.push(Message::assistant(response));
            messages.push(Message::user(prompts::corrective_guidance(repos)));
        }

        warn!(max_iterations = max, "iteration ceiling reached");
        Ok(QueryReport {
            answer: prompts::exhaustion_message(max),
            iterations: max,
            termination: Termination::Exhausted,
        })
    }
}
