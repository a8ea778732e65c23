//! Drafter - draft resolution, sync commits and history queries

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{DraftError, DraftLock, SYNC_MESSAGE, has_kind};
use crate::config::Config;
use crate::domain::{Draft, DraftSummary, Prompt};
use crate::history::{HistoryStore, PersistenceResult};
use crate::vcs::{Sha, Vcs};

/// Candidate suffixes tried before giving up
const MAX_SUFFIX_ATTEMPTS: usize = 16;

const REPO_UUID_KEY: &str = "draft.repouuid";
const ORIGIN_KEY: &str = "draftorigin";
const ORIGIN_SHA_KEY: &str = "draftoriginsha";
const CREATED_KEY: &str = "draftcreated";

/// Top-level orchestrator of the draft lifecycle
pub struct Drafter {
    pub(super) vcs: Arc<dyn Vcs>,
    pub(super) history: Arc<HistoryStore>,
    pub(super) config: Config,
}

impl Drafter {
    pub fn new(vcs: Arc<dyn Vcs>, history: Arc<HistoryStore>, config: Config) -> Self {
        debug!(repo = ?vcs.repo_root(), "Drafter::new: called");
        Self { vcs, history, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repo_root(&self) -> &Path {
        self.vcs.repo_root()
    }

    pub(super) async fn lock(&self) -> Result<DraftLock, DraftError> {
        let git_dir = self.vcs.git_dir().await?;
        DraftLock::acquire(&git_dir)
    }

    /// The draft whose branch is checked out, if any
    pub async fn current_draft(&self) -> Result<Option<Draft>, DraftError> {
        debug!("Drafter::current_draft: called");
        let branch = match self.vcs.current_branch().await? {
            Some(branch) => branch,
            None => return Ok(None),
        };
        let suffix = match Draft::suffix_of(&branch) {
            Some(suffix) => suffix.to_string(),
            None => return Ok(None),
        };

        let probe = Draft::new(suffix, "", "");
        let origin_branch = self.vcs.config_get(&probe.config_key(ORIGIN_KEY)).await?;
        let origin_sha = self.vcs.config_get(&probe.config_key(ORIGIN_SHA_KEY)).await?;
        let (origin_branch, origin_sha) = match (origin_branch, origin_sha) {
            (Some(branch), Some(sha)) => (branch, sha),
            _ => {
                debug!(%branch, "Drafter::current_draft: missing origin metadata");
                return Err(DraftError::RepositoryState(format!(
                    "branch {branch} looks like a draft but has no origin metadata"
                )));
            }
        };
        let created_at = self
            .vcs
            .config_get(&probe.config_key(CREATED_KEY))
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Some(Draft {
            origin_branch,
            origin_sha,
            created_at,
            ..probe
        }))
    }

    /// Active draft, or an error naming what is checked out instead
    pub(super) async fn require_draft(&self) -> Result<Draft, DraftError> {
        match self.current_draft().await? {
            Some(draft) => Ok(draft),
            None => Err(DraftError::RepositoryState("no draft branch is checked out".to_string())),
        }
    }

    pub(super) async fn require_no_merge(&self) -> Result<(), DraftError> {
        if self.vcs.merge_in_progress().await? {
            debug!("Drafter::require_no_merge: merge in progress");
            return Err(DraftError::RepositoryState(
                "a draft merge has unresolved conflicts; resolve and commit them, or quit the draft".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the checked-out draft, or branch a new one from HEAD in place
    pub async fn resolve_or_create(&self) -> Result<Draft, DraftError> {
        let _lock = self.lock().await?;
        self.resolve_or_create_locked().await
    }

    pub(super) async fn resolve_or_create_locked(&self) -> Result<Draft, DraftError> {
        debug!("Drafter::resolve_or_create_locked: called");
        if let Some(draft) = self.current_draft().await? {
            debug!(suffix = %draft.suffix, "Drafter::resolve_or_create_locked: reusing draft");
            return Ok(draft);
        }

        let origin_branch = self
            .vcs
            .current_branch()
            .await?
            .ok_or_else(|| DraftError::RepositoryState("HEAD is detached; check out a branch first".to_string()))?;
        let head = self.vcs.head().await?.ok_or_else(|| {
            DraftError::RepositoryState(format!("branch {origin_branch} has no commits yet"))
        })?;
        self.require_no_merge().await?;

        let suffix = self.allocate_suffix().await?;
        let draft = Draft::new(suffix, origin_branch, head.as_str());
        let branch = draft.branch_name();

        self.vcs.create_branch(&branch, &head).await?;
        self.vcs.checkout(&branch).await?;
        self.vcs
            .config_set(&draft.config_key(ORIGIN_KEY), &draft.origin_branch)
            .await?;
        self.vcs
            .config_set(&draft.config_key(ORIGIN_SHA_KEY), &draft.origin_sha)
            .await?;
        self.vcs
            .config_set(&draft.config_key(CREATED_KEY), &draft.created_at.to_rfc3339())
            .await?;
        self.vcs.update_ref(&draft.public_ref(), &head).await?;

        let repo_uuid = self.repo_uuid().await?;
        self.best_effort(
            "record branch",
            self.history.record_branch(self.repo_root(), &repo_uuid, &draft),
        );

        info!(%branch, origin = %draft.origin_branch, origin_sha = %head.short(), "Created draft");
        Ok(draft)
    }

    async fn allocate_suffix(&self) -> Result<String, DraftError> {
        for attempt in 0..MAX_SUFFIX_ATTEMPTS {
            let candidate = Draft::random_suffix();
            let probe = Draft::new(candidate.as_str(), "", "");
            let taken = self.vcs.branch_exists(&probe.branch_name()).await?
                || !self.vcs.list_refs(&probe.history_prefix()).await?.is_empty();
            if !taken {
                debug!(%candidate, attempt, "Drafter::allocate_suffix: allocated");
                return Ok(candidate);
            }
            debug!(%candidate, attempt, "Drafter::allocate_suffix: collision");
        }
        Err(DraftError::RepositoryState(format!(
            "could not allocate an unused draft name in {MAX_SUFFIX_ATTEMPTS} attempts"
        )))
    }

    /// Stable id of this repository, created on first use
    async fn repo_uuid(&self) -> Result<String, DraftError> {
        if let Some(existing) = self.vcs.config_get(REPO_UUID_KEY).await? {
            return Ok(existing);
        }
        let fresh = uuid::Uuid::new_v4().to_string();
        self.vcs.config_set(REPO_UUID_KEY, &fresh).await?;
        debug!(%fresh, "Drafter::repo_uuid: created");
        Ok(fresh)
    }

    /// Commit the user's pending work on the active draft
    ///
    /// Returns the sync commit at HEAD, if there is one.
    pub async fn sync(&self, preserve_unstaged: bool) -> Result<Option<Sha>, DraftError> {
        let _lock = self.lock().await?;
        let draft = self.require_draft().await?;
        self.sync_locked(&draft, preserve_unstaged).await
    }

    pub(super) async fn sync_locked(&self, draft: &Draft, preserve_unstaged: bool) -> Result<Option<Sha>, DraftError> {
        debug!(suffix = %draft.suffix, preserve_unstaged, "Drafter::sync_locked: called");
        self.require_no_merge().await?;

        let stashed = if preserve_unstaged {
            self.vcs.stash_unstaged().await?
        } else {
            self.vcs.stage_all().await?;
            false
        };

        let committed = self.commit_index_as_sync(draft).await;

        if stashed && let Err(e) = self.vcs.stash_pop().await {
            warn!(error = %e, "Unstaged changes could not be restored; they remain in the stash");
            return Err(e.into());
        }
        let sync = committed?;

        if let Some(head) = self.vcs.head().await? {
            self.vcs.update_ref(&draft.public_ref(), &head).await?;
        }
        Ok(sync)
    }

    async fn commit_index_as_sync(&self, draft: &Draft) -> Result<Option<Sha>, DraftError> {
        let head = self
            .vcs
            .head()
            .await?
            .ok_or_else(|| DraftError::RepositoryState("draft branch has no commits".to_string()))?;
        let tree = self.vcs.write_tree().await?;

        if tree == self.vcs.tree_of(&head).await? {
            let message = self.vcs.commit_message(&head).await?;
            let reused = has_kind(&message, "sync").then_some(head);
            debug!(reused = reused.is_some(), "Drafter::commit_index_as_sync: nothing new");
            return Ok(reused);
        }

        let commit = self.vcs.commit_tree(&tree, &[head], SYNC_MESSAGE).await?;
        self.vcs
            .update_ref(&format!("refs/heads/{}", draft.branch_name()), &commit)
            .await?;
        info!(commit = %commit.short(), "Created sync commit");
        Ok(Some(commit))
    }

    /// Contents of the active draft's most recent prompt
    pub async fn latest_prompt(&self) -> Result<Option<String>, DraftError> {
        let draft = match self.current_draft().await? {
            Some(draft) => draft,
            None => return Ok(None),
        };
        Ok(self.history.latest_prompt(self.repo_root(), &draft.suffix)?)
    }

    /// Prompts of `suffix`, or of the active draft, newest first
    pub async fn list_prompts(&self, suffix: Option<&str>) -> Result<Vec<Prompt>, DraftError> {
        let suffix = match suffix {
            Some(s) => s.to_string(),
            None => self.require_draft().await?.suffix,
        };
        Ok(self.history.list_prompts(self.repo_root(), &suffix)?)
    }

    /// Drafts of this repository, newest first
    pub fn list_drafts(&self) -> Result<Vec<DraftSummary>, DraftError> {
        Ok(self.history.list_drafts(self.repo_root())?)
    }

    /// Log a history write failure and carry on; git stays authoritative
    pub(super) fn best_effort<T>(&self, what: &str, result: PersistenceResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "History: {} failed", what);
                None
            }
        }
    }
}
