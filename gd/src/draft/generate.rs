//! Generate: sync, run the bot, commit its work, accept

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{AbortPolicy, AcceptLevel, AcceptResult, DraftError, Drafter};
use crate::bots::{Bot, create_bot};
use crate::domain::{Action, ActionOutcome, Draft, Operation};
use crate::r#loop::{ActionReport, ActionRunner, RunOutcome, commit_title};
use crate::tools::ToolContext;
use crate::vcs::Sha;

/// One `git-draft generate` invocation
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,

    /// Name of the template the prompt came from, recorded only
    pub template: Option<String>,

    /// Bot entry to use; the configured default when unset
    pub bot: Option<String>,

    /// Overrides the configured accept level
    pub accept: Option<AcceptLevel>,

    /// Overrides the configured deadline
    pub timeout_secs: Option<u64>,

    /// Keep unstaged changes out of the sync commit
    pub preserve_unstaged: bool,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub draft: Draft,
    pub sync_commit: Option<Sha>,
    pub prompt_commit: Sha,
    /// `refs/drafts/<suffix>/<n>` pointing at `prompt_commit`
    pub history_ref: String,
    pub title: String,
    pub accept: AcceptResult,
    pub operations: Vec<Operation>,
    pub walltime: Duration,
}

impl Drafter {
    /// Run a prompt on the active draft, creating one if needed
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResult, DraftError> {
        debug!(bot = ?request.bot, "Drafter::generate: called");
        validate_prompt(&request.prompt)?;

        let bot_config = self.config.find_bot(request.bot.as_deref()).ok_or_else(|| {
            let name = request.bot.clone().or_else(|| self.config.default_bot.clone());
            DraftError::UnknownBot(name.unwrap_or_else(|| "<none configured>".to_string()))
        })?;
        let bot = create_bot(bot_config)?;
        self.generate_with(request, bot.as_ref()).await
    }

    /// `generate` with an already constructed bot; `request.bot` is ignored
    pub async fn generate_with(&self, request: &GenerateRequest, bot: &dyn Bot) -> Result<GenerateResult, DraftError> {
        debug!(bot = %bot.name(), "Drafter::generate_with: called");
        validate_prompt(&request.prompt)?;
        let _lock = self.lock().await?;

        let draft = self.resolve_or_create_locked().await?;
        let sync_commit = self.sync_locked(&draft, request.preserve_unstaged).await?;
        let base = self
            .vcs
            .head()
            .await?
            .ok_or_else(|| DraftError::RepositoryState("draft branch has no commits".to_string()))?;

        let prompt_id = self.best_effort(
            "record prompt",
            self.history
                .record_prompt(&draft.suffix, request.template.as_deref(), &request.prompt),
        );

        let runner_config = self.config.runner_config(request.timeout_secs);
        let timeout = runner_config.timeout;
        let runner = ActionRunner::new(runner_config);
        let ctx = ToolContext::with_vcs(self.vcs.clone());
        info!(suffix = %draft.suffix, bot = %bot.name(), "Running bot");
        let report = runner.run(bot, &request.prompt, &ctx).await;

        let summary = match &report.outcome {
            RunOutcome::Success { summary } => summary.clone(),
            RunOutcome::Timeout => {
                self.abandon_action(&base, &report).await?;
                self.record_action(prompt_id, bot.name(), &report, None);
                return Err(DraftError::Timeout(timeout.unwrap_or(report.walltime)));
            }
            RunOutcome::Failure { error } => {
                self.abandon_action(&base, &report).await?;
                self.record_action(prompt_id, bot.name(), &report, None);
                return Err(DraftError::BotGateway(error.clone()));
            }
        };

        let title = commit_title(summary.as_deref(), &request.prompt);
        let message = prompt_message(&title, &request.prompt, bot.name());
        let tree = self.vcs.write_tree().await?;
        let prompt_commit = self.vcs.commit_tree(&tree, &[base], &message).await?;
        self.vcs
            .update_ref(&format!("refs/heads/{}", draft.branch_name()), &prompt_commit)
            .await?;
        let history_ref = draft.history_ref(self.next_history_index(&draft).await?);
        self.vcs.update_ref(&history_ref, &prompt_commit).await?;
        info!(commit = %prompt_commit.short(), %history_ref, %title, "Created prompt commit");

        self.record_action(prompt_id, bot.name(), &report, Some(&prompt_commit));

        let level = request.accept.unwrap_or(self.config.accept);
        let accept = self.apply_accept(&draft, &prompt_commit, level).await?;

        Ok(GenerateResult {
            draft,
            sync_commit,
            prompt_commit,
            history_ref,
            title,
            accept,
            operations: report.operations,
            walltime: report.walltime,
        })
    }

    /// Deal with a failed action's writes per the abort policy
    async fn abandon_action(&self, base: &Sha, report: &ActionReport) -> Result<(), DraftError> {
        let written = report.written_paths();
        debug!(?written, policy = ?self.config.on_abort, "Drafter::abandon_action: called");
        match self.config.on_abort {
            AbortPolicy::Keep => self.vcs.unstage_all().await?,
            AbortPolicy::Revert => self.vcs.restore_paths(base, &written).await?,
        }
        Ok(())
    }

    fn record_action(&self, prompt_id: Option<i64>, bot_name: &str, report: &ActionReport, commit: Option<&Sha>) {
        let Some(prompt_id) = prompt_id else {
            warn!("History: skipping action record, its prompt was not recorded");
            return;
        };
        let (outcome, error) = match &report.outcome {
            RunOutcome::Success { .. } => (ActionOutcome::Success, None),
            RunOutcome::Timeout => (ActionOutcome::Timeout, None),
            RunOutcome::Failure { error } => (ActionOutcome::Failure, Some(error.clone())),
        };
        let action = Action {
            prompt_id,
            bot_name: bot_name.to_string(),
            walltime: report.walltime.as_secs_f64(),
            outcome,
            commit_sha: commit.map(|c| c.to_string()),
            error,
            turn_count: report.turn_count,
            request_count: report.usage.request_count,
            token_count: report.usage.token_count,
        };
        let Some(action_id) = self.best_effort("record action", self.history.record_action(&action)) else {
            return;
        };
        let commit_sha = commit.map(Sha::as_str);
        for op in &report.operations {
            self.best_effort(
                "record operation",
                self.history.record_operation(action_id, commit_sha, op),
            );
        }
    }

    async fn next_history_index(&self, draft: &Draft) -> Result<u64, DraftError> {
        let prefix = draft.history_prefix();
        let refs = self.vcs.list_refs(&prefix).await?;
        let max = refs
            .iter()
            .filter_map(|(name, _)| name.strip_prefix(&prefix)?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }
}

fn validate_prompt(prompt: &str) -> Result<(), DraftError> {
    if prompt.trim().is_empty() {
        debug!("validate_prompt: empty prompt");
        return Err(DraftError::InvalidPrompt("prompt is empty".to_string()));
    }
    Ok(())
}

fn prompt_message(title: &str, prompt: &str, bot_name: &str) -> String {
    format!("{title}\n\n{}\n\nDraft-Kind: prompt\nDraft-Bot: {bot_name}", prompt.trim())
}
