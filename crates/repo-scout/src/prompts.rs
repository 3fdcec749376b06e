//! Prompt and protocol text fed to the oracle.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever prompt content changes,
//! so a logged response can be traced to the prompt that produced it.

/// Prompt version. Bump on any content change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// System prompt establishing the tool catalogue and the response protocol.
pub const SYSTEM_PROMPT: &str = "\
You are an autonomous agent that answers questions about GitHub repositories \
by reasoning step by step and calling tools. You perform every lookup \
yourself; the user only waits for your answer.

You have access to the following tools:
1. search_code: Search for code in the permitted repositories
   - Parameters: query (string), repos (optional list of owner/name)
2. search_issues: Search for issues and pull requests
   - Parameters: query (string), repos (optional list of owner/name)
3. get_repo_structure: Fetch the complete directory and file tree of one repository
   - Parameters: repo (owner/name), branch (optional)
4. get_file_contents: Fetch the actual contents of one file
   - Parameters: repo (owner/name), path (file path), branch (optional)
   - You MUST call this tool to read a file. Never assume or invent file contents.

GitHub search syntax applies: qualifiers such as language:, extension:, \
path:, filename: for code, and is:issue, state:open, label: for issues. \
Combine terms with spaces; be specific, based on the repository structure \
context you are given.

RESPONSE PROTOCOL — follow this exact format in every response:

Thought: [one paragraph of reasoning about what you need next]

Action:
{\"tool\": \"search_code\", \"parameters\": {\"query\": \"your query\", \"repos\": [\"owner/name\"]}}

After each Action you will receive an Observation from the system. Then \
respond with either another Thought and Action, or with:

Final Answer: [your complete answer]

Rules:
- Exactly one Thought and at most one Action per response.
- The Action must be valid JSON on its own line.
- Never write an Observation yourself; observations are system-provided.
- Never simulate multiple steps in a single response.
- Use get_repo_structure only when the provided context is not detailed enough.
- When a search surfaces a relevant file path, read it with get_file_contents.
- Your Final Answer must be complete and grounded in what the tools returned, \
never a list of steps for the user to perform themselves.";

/// First user message: the question plus the repository context block.
pub fn initial_user_prompt(question: &str, repositories: &[String], context_block: &str) -> String {
    format!(
        "Question: {question}\n\n\
         Available repositories: {}\n\n\
         {context_block}\n\n\
         Use the repository structure context above to write precise queries: \
         path: for directories you can see, extension: or language: for file \
         types, filename: for files listed in the structure.\n\n\
         Start with your Thought, then provide an Action in valid JSON format.",
        repositories.join(", ")
    )
}

/// Wrap a compressed tool result for re-entry into the conversation.
pub fn observation_message(observation: &str) -> String {
    format!(
        "Observation: {observation}\n\n\
         Based on this observation, provide either:\n\
         1. Another Thought and Action to gather more information\n\
         2. Final Answer: [your complete answer if you have enough information]"
    )
}

/// Injected when a response contained neither a parsable action nor an
/// acceptable terminal answer. Names the exact two valid response shapes.
pub fn corrective_guidance(repositories: &[String]) -> String {
    let repos = serde_json::to_string(repositories).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Your last response contained neither a valid action nor a final \
         answer. Reply with EXACTLY ONE of the following two shapes:\n\n\
         1. A single JSON action, for example:\n\n\
         {{\"tool\": \"search_code\", \"parameters\": {{\"query\": \"your search query\", \"repos\": {repos}}}}}\n\n\
         {{\"tool\": \"search_issues\", \"parameters\": {{\"query\": \"your search query\", \"repos\": {repos}}}}}\n\n\
         {{\"tool\": \"get_repo_structure\", \"parameters\": {{\"repo\": \"owner/name\"}}}}\n\n\
         {{\"tool\": \"get_file_contents\", \"parameters\": {{\"repo\": \"owner/name\", \"path\": \"path/to/file\"}}}}\n\n\
         OR\n\n\
         2. Final Answer: [your answer, if you already have enough information]\n\n\
         Start with 'Thought:' to explain your reasoning, then provide \
         'Action:' with the JSON, or the Final Answer line."
    )
}

/// Fixed terminal fallback when the iteration ceiling is reached.
pub fn exhaustion_message(max_iterations: u32) -> String {
    format!(
        "I've reached the maximum number of reasoning steps ({max_iterations}) \
         without gathering enough information for a complete answer. Please try \
         rephrasing the question or narrowing it to something more specific."
    )
}
