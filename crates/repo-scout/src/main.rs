use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use repo_scout::{
    Agent, ChatCompletionsOracle, GithubClient, IndexCache, ScoutConfig, Termination,
};

/// Ask questions about a fixed set of GitHub repositories.
#[derive(Debug, Parser)]
#[command(name = "repo-scout", version)]
struct Args {
    /// The question to answer.
    question: String,

    /// Repository the agent may query, as owner/name. Repeatable.
    #[arg(long = "repo")]
    repos: Vec<String>,

    /// Optional TOML config file (repositories, qualifiers, model overrides).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the iteration ceiling.
    #[arg(long)]
    max_iterations: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ScoutConfig::from_env();
    if let Some(path) = &args.config {
        config = config
            .merge_file(path)
            .map_err(|e| anyhow::anyhow!(e))
            .context("loading config file")?;
    }
    if !args.repos.is_empty() {
        config.repositories = args.repos.clone();
    }
    if let Some(n) = args.max_iterations {
        config.max_iterations = n;
    }
    if config.repositories.is_empty() {
        bail!("no repositories configured; pass --repo owner/name or a config file");
    }

    info!(
        repos = config.repositories.len(),
        model = %config.oracle.model,
        max_iterations = config.max_iterations,
        "repo-scout starting"
    );

    let host = Arc::new(GithubClient::new(&config.github)?);
    let oracle = Arc::new(ChatCompletionsOracle::new(config.oracle.clone()));
    let index = Arc::new(IndexCache::new());

    let agent = Agent::new(config, oracle, host, index)?;
    let report = agent.query(&args.question).await?;

    match report.termination {
        Termination::Answered => {
            info!(iterations = report.iterations, "query answered");
        }
        Termination::Exhausted => {
            info!(iterations = report.iterations, "iteration ceiling reached");
        }
    }
    println!("{}", report.answer);

    Ok(())
}
