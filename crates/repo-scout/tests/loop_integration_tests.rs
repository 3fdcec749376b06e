//! End-to-end loop coverage using in-process fakes — no network, no model
//! endpoint. Exercises the public crate surface the way the binary wires it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use repo_scout::{
    Agent, AnswerPolicy, GithubError, IndexCache, Message, ModelOracle, OracleError, RepoHost,
    ScoutConfig, Termination,
};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Replays a script, repeating the last entry; records conversations.
struct ScriptedOracle {
    script: Vec<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedOracle {
    fn new(script: &[&str]) -> Self {
        Self {
            script: script.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelOracle for ScriptedOracle {
    async fn complete(&self, messages: &[Message]) -> Result<String, OracleError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        Ok(self.script[n.min(self.script.len() - 1)].clone())
    }
}

/// Oracle whose endpoint is down — every call fails.
struct DeadOracle;

#[async_trait]
impl ModelOracle for DeadOracle {
    async fn complete(&self, _messages: &[Message]) -> Result<String, OracleError> {
        Err(OracleError::Api {
            status: 502,
            body: "bad gateway".to_string(),
        })
    }
}

/// A small but realistic repository host with one repo's worth of data.
struct FixtureHost;

#[async_trait]
impl RepoHost for FixtureHost {
    async fn search_code(&self, query: &str) -> Result<Value, GithubError> {
        // Only the build file matches build-ish queries.
        if query.contains("build") {
            Ok(json!({
                "total_count": 1,
                "items": [{
                    "name": "build.xml",
                    "path": "build.xml",
                    "repository": {"full_name": "demo/harness"},
                    "html_url": "https://example.invalid/build.xml",
                    "score": 9.5,
                }]
            }))
        } else {
            Ok(json!({"total_count": 0, "items": []}))
        }
    }

    async fn search_issues(&self, _query: &str) -> Result<Value, GithubError> {
        let items: Vec<Value> = (0..8)
            .map(|i| {
                json!({
                    "title": format!("CI failure #{i} with a fairly long descriptive title"),
                    "number": i,
                    "state": "open",
                    "repository_url": "https://api.github.com/repos/demo/harness",
                    "html_url": "https://example.invalid/issue",
                    "body": "log output ".repeat(40),
                    "labels": [{"name": "ci"}],
                })
            })
            .collect();
        Ok(json!({"total_count": 8, "items": items}))
    }

    async fn repo_tree(
        &self,
        _owner: &str,
        _name: &str,
        _branch: Option<&str>,
    ) -> Result<Value, GithubError> {
        Ok(json!({"tree": [
            {"path": "src", "type": "tree"},
            {"path": "src/Main.java", "type": "blob", "size": 400},
            {"path": "build.xml", "type": "blob", "size": 120},
        ]}))
    }

    async fn file_contents(
        &self,
        _owner: &str,
        _name: &str,
        path: &str,
        _branch: Option<&str>,
    ) -> Result<Value, GithubError> {
        // base64("<project name=\"demo\"/>")
        Ok(json!({
            "name": path.rsplit('/').next().unwrap_or(path),
            "size": 22,
            "type": "file",
            "sha": "f00",
            "encoding": "base64",
            "content": "PHByb2plY3QgbmFtZT0iZGVtbyIvPg==",
            "html_url": "https://example.invalid/file",
        }))
    }
}

fn make_agent(script: &[&str], max_iterations: u32) -> (Agent, Arc<ScriptedOracle>) {
    let mut config = ScoutConfig::default();
    config.max_iterations = max_iterations;
    config.repositories = vec!["demo/harness".to_string()];

    let oracle = Arc::new(ScriptedOracle::new(script));
    let agent = Agent::new(
        config,
        oracle.clone(),
        Arc::new(FixtureHost),
        Arc::new(IndexCache::new()),
    )
    .expect("test config is valid");
    (agent, oracle)
}

// ── Full sessions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_step_session_search_read_answer() {
    let search = r#"Thought: find the build file first.
Action:
{"tool": "search_code", "parameters": {"query": "build filename:build.xml"}}"#;
    let read = r#"Thought: read it to confirm the project name.
Action:
{"tool": "get_file_contents", "parameters": {"repo": "demo/harness", "path": "build.xml"}}"#;
    let answer = "Thought: confirmed.\nFinal Answer: The Ant build file is build.xml; the project is named \"demo\".";

    let (agent, oracle) = make_agent(&[search, read, answer], 10);
    let report = agent.query("what build system does demo/harness use?").await.unwrap();

    assert_eq!(report.termination, Termination::Answered);
    assert_eq!(report.iterations, 3);

    // Second conversation saw the code-search observation; third saw the
    // decoded file contents.
    let seen = oracle.seen.lock().unwrap();
    assert!(seen[1].last().unwrap().content.contains("build.xml"));
    assert!(seen[2].last().unwrap().content.contains("<project name="));
}

#[tokio::test]
async fn oversized_issue_list_is_compressed_in_conversation() {
    let search = r#"Action:
{"tool": "search_issues", "parameters": {"query": "ci failure"}}"#;
    let answer = "Final Answer: there are several open CI failures.";

    let (agent, oracle) = make_agent(&[search, answer], 5);
    let report = agent.query("what is failing?").await.unwrap();
    assert_eq!(report.termination, Termination::Answered);

    let seen = oracle.seen.lock().unwrap();
    let observation = &seen[1].last().unwrap().content;
    assert!(observation.contains("Showing 3 of 8 total items"));
    // Issue bodies were excerpted at the tool boundary before compression.
    assert!(observation.contains("..."));
}

#[tokio::test]
async fn hallucinated_transcript_costs_one_iteration_then_recovers() {
    let fake = "Step 1: I search.\nObservation: {\"items\": []}\nStep 2: done.\nFinal Answer: made up";
    let genuine = "Final Answer: grounded answer.";

    let (agent, oracle) = make_agent(&[fake, genuine], 5);
    let report = agent.query("anything").await.unwrap();

    assert_eq!(report.answer, "grounded answer.");
    assert_eq!(report.iterations, 2);

    // The re-prompt carried corrective guidance.
    let seen = oracle.seen.lock().unwrap();
    let guidance = &seen[1].last().unwrap().content;
    assert!(guidance.contains("EXACTLY ONE"));
}

#[tokio::test]
async fn exhaustion_returns_fixed_message_naming_ceiling() {
    let (agent, oracle) = make_agent(&["still thinking..."], 3);
    let report = agent.query("anything").await.unwrap();

    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.iterations, 3);
    assert!(report.answer.contains("(3)"));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn oracle_failure_propagates_out_of_query() {
    let mut config = ScoutConfig::default();
    config.max_iterations = 3;
    config.repositories = vec!["demo/harness".to_string()];

    let agent = Agent::new(
        config,
        Arc::new(DeadOracle),
        Arc::new(FixtureHost),
        Arc::new(IndexCache::new()),
    )
    .unwrap();

    let result = agent.query("anything").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn relaxed_answer_policy_is_honored() {
    // Two Thought lines would be rejected under the default policy.
    let chatty = "Thought: first pass.\nThought: second pass.\nFinal Answer: fine anyway.";
    let mut config = ScoutConfig::default();
    config.max_iterations = 2;
    config.repositories = vec!["demo/harness".to_string()];

    let agent = Agent::new(
        config,
        Arc::new(ScriptedOracle::new(&[chatty])),
        Arc::new(FixtureHost),
        Arc::new(IndexCache::new()),
    )
    .unwrap()
    .with_answer_policy(AnswerPolicy {
        max_reasoning_markers: 3,
        max_action_markers: 1,
    });

    let report = agent.query("anything").await.unwrap();
    assert_eq!(report.answer, "fine anyway.");
    assert_eq!(report.iterations, 1);
}

#[tokio::test]
async fn unknown_tool_becomes_observation_and_loop_continues() {
    let wrong = r#"Action:
{"tool": "clone_repo", "parameters": {"repo": "demo/harness"}}"#;
    let answer = "Final Answer: done without cloning.";

    let (agent, oracle) = make_agent(&[wrong, answer], 5);
    let report = agent.query("anything").await.unwrap();

    assert_eq!(report.termination, Termination::Answered);
    let seen = oracle.seen.lock().unwrap();
    let observation = &seen[1].last().unwrap().content;
    assert!(observation.contains("Unknown tool: clone_repo"));
}
