//! Accept policy applied after a prompt commit

use tracing::{debug, info, warn};

use super::{AcceptLevel, DraftError, Drafter, MERGE_MESSAGE, SYNC_MESSAGE};
use crate::domain::Draft;
use crate::vcs::{MergeOutcome, Sha};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptResult {
    /// Level 0: the prompt commit is checked out as is
    Manual,
    /// No edits happened during the action, nothing to merge
    NothingToMerge,
    /// User edits and the prompt commit were merged into this commit
    Merged(Sha),
    /// The merge stopped; these paths need manual resolution
    Conflicted(Vec<String>),
    /// Merged (when needed), then carried onto the origin branch
    Finalized { origin_branch: String },
}

impl Drafter {
    pub(super) async fn apply_accept(
        &self,
        draft: &Draft,
        prompt_commit: &Sha,
        level: AcceptLevel,
    ) -> Result<AcceptResult, DraftError> {
        debug!(%level, "Drafter::apply_accept: called");
        let policy = match level.merge_policy() {
            Some(policy) => policy,
            None => return Ok(AcceptResult::Manual),
        };

        // The index holds the prompt commit; anything else in the worktree
        // was edited while the bot ran
        let edited = self.vcs.changed_paths_worktree().await?;
        let merged = if edited.is_empty() {
            debug!("Drafter::apply_accept: no concurrent edits");
            AcceptResult::NothingToMerge
        } else {
            let public = self
                .vcs
                .rev_parse(&draft.public_ref())
                .await?
                .ok_or_else(|| DraftError::RepositoryState(format!("missing {}", draft.public_ref())))?;
            let tree = self.vcs.build_tree(&public, &edited).await?;
            let user_sync = self.vcs.commit_tree(&tree, &[public], SYNC_MESSAGE).await?;
            debug!(?edited, user_sync = %user_sync.short(), "Drafter::apply_accept: captured concurrent edits");

            self.vcs.reset_hard(&user_sync).await?;
            match self.vcs.merge(prompt_commit, policy, MERGE_MESSAGE).await? {
                MergeOutcome::Merged(commit) => {
                    self.vcs.update_ref(&draft.public_ref(), &commit).await?;
                    info!(commit = %commit.short(), "Merged prompt commit with concurrent edits");
                    AcceptResult::Merged(commit)
                }
                MergeOutcome::Conflicted(paths) => {
                    warn!(?paths, "Merge left conflicts for manual resolution");
                    return Ok(AcceptResult::Conflicted(paths));
                }
            }
        };

        if level == AcceptLevel::Finalize {
            self.finalize_locked(draft, true).await?;
            return Ok(AcceptResult::Finalized {
                origin_branch: draft.origin_branch.clone(),
            });
        }
        Ok(merged)
    }
}
