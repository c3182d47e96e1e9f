//! Review command - run the agent team against one pull request

use std::future::Future;
use std::io;
use std::sync::Arc;

use clap::Args;
use relay_core::agent::backends;
use relay_core::workflow::{RunOutcome, Workflow, WorkflowRunner};
use relay_core::{Config, RunInput, Secrets};
use relay_github::GitHubClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::reporter::{emoji, ConsoleReporter, JsonReporter};

/// Conventional exit status for a process stopped by SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancel the run on the first interrupt; true once a second one arrives
async fn escalate_interrupts<F, Fut>(mut interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    eprintln!("Interrupted; stopping after the current turn (Ctrl-C again to quit now)");
    cancel.cancel();

    interrupt().await.is_ok()
}

/// Review a pull request
#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Pull request number
    pub pr: u64,

    /// Repository (owner/repo or GitHub URL); falls back to config
    #[arg(short, long)]
    pub repo: Option<String>,

    /// Use the deterministic offline policy instead of a language model
    #[arg(long)]
    pub offline: bool,

    /// Turn ceiling for the run
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl ReviewArgs {
    /// Execute the review command
    pub async fn execute(&self, verbose: bool, no_emoji: bool) -> anyhow::Result<()> {
        let config = Config::load_with_overrides(self.repo.clone(), self.max_turns, self.offline)?;
        let secrets = Secrets::load()?;

        let repo = config.github.repo.as_deref().ok_or_else(|| {
            anyhow::anyhow!("No repository specified. Use --repo owner/repo or set [github] repo")
        })?;
        let client = GitHubClient::from_repo(repo, &secrets)?;

        let decider = backends::from_config(&config.model, secrets.model_api_key().as_deref())?;
        let workflow = Workflow::pr_review(Arc::new(client), config.workflow)?;
        let runner = WorkflowRunner::new(Arc::new(workflow), decider).with_retry(config.retry.clone());

        info!(
            repo,
            pr = self.pr,
            decider = ?config.model.decider,
            max_turns = config.workflow.max_turns,
            "Starting review"
        );
        if !self.json {
            println!(
                "{} Reviewing PR #{} in {}",
                emoji(no_emoji, "🔍", "[REVIEW]"),
                self.pr,
                repo
            );
        }

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if escalate_interrupts(tokio::signal::ctrl_c, on_interrupt).await {
                warn!("Second interrupt; exiting without waiting for the turn");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        });

        let mut handle = runner.start_with_cancellation(RunInput::review(self.pr), cancel);
        let outcome = if self.json {
            handle.drive(&mut JsonReporter).await
        } else {
            handle.drive(&mut ConsoleReporter::new(no_emoji, verbose)).await
        };

        match outcome {
            RunOutcome::Finished { .. } => Ok(()),
            RunOutcome::Failed(failure) => Err(anyhow::anyhow!("{}", failure)),
        }
    }
}
