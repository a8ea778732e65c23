//! Leaving a draft: finalize (carry the work over) and quit (discard it)

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::{DraftError, Drafter};
use crate::domain::Draft;
use crate::vcs::Sha;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeResult {
    pub draft: Draft,
    /// Branch now checked out with the draft's state as uncommitted changes
    pub origin_branch: String,
    /// Whether the draft branch was deleted
    pub deleted: bool,
}

impl Drafter {
    /// Check out the origin branch with the draft's working state on top
    pub async fn finalize(&self, delete: bool) -> Result<FinalizeResult, DraftError> {
        let _lock = self.lock().await?;
        let draft = self.require_draft().await?;
        self.finalize_locked(&draft, delete).await?;
        Ok(FinalizeResult {
            origin_branch: draft.origin_branch.clone(),
            draft,
            deleted: delete,
        })
    }

    pub(super) async fn finalize_locked(&self, draft: &Draft, delete: bool) -> Result<(), DraftError> {
        debug!(suffix = %draft.suffix, delete, "Drafter::finalize_locked: called");
        self.require_no_merge().await?;

        let origin_sha = Sha::new(draft.origin_sha.as_str());
        let origin_now = self.vcs.rev_parse(&draft.origin_branch).await?.ok_or_else(|| {
            DraftError::RepositoryState(format!("origin branch {} no longer exists", draft.origin_branch))
        })?;

        let upstream = if origin_now == origin_sha {
            Vec::new()
        } else {
            self.vcs.changed_paths_between(&origin_sha, &origin_now).await?
        };
        if !upstream.is_empty() {
            let delta: BTreeSet<String> = self.vcs.changed_paths_from(&origin_sha).await?.into_iter().collect();
            let overlap: Vec<String> = upstream.iter().filter(|p| delta.contains(*p)).cloned().collect();
            if !overlap.is_empty() {
                debug!(?overlap, "Drafter::finalize_locked: origin moved under the draft");
                return Err(DraftError::OriginMoved {
                    branch: draft.origin_branch.clone(),
                    paths: overlap,
                });
            }
            debug!(?upstream, "Drafter::finalize_locked: keeping non-overlapping upstream changes");
        }

        self.vcs.detach().await?;
        self.vcs.reset_mixed(&origin_now).await?;
        self.vcs.restore_paths(&origin_now, &upstream).await?;
        self.vcs.checkout(&draft.origin_branch).await?;

        if delete {
            self.drop_draft_refs(draft).await?;
        }
        info!(suffix = %draft.suffix, origin = %draft.origin_branch, delete, "Finalized draft");
        Ok(())
    }

    /// Discard the draft and restore the origin branch's committed state
    pub async fn quit(&self) -> Result<Draft, DraftError> {
        let _lock = self.lock().await?;
        let draft = self.require_draft().await?;
        debug!(suffix = %draft.suffix, "Drafter::quit: called");

        if self.vcs.merge_in_progress().await? {
            self.vcs.abort_merge().await?;
        }
        self.vcs.force_checkout(&draft.origin_branch).await?;
        self.vcs.clean_untracked().await?;
        self.drop_draft_refs(&draft).await?;

        info!(suffix = %draft.suffix, origin = %draft.origin_branch, "Quit draft");
        Ok(draft)
    }

    /// Delete the branch (and its config section) and the public pointer;
    /// the ref history stays
    async fn drop_draft_refs(&self, draft: &Draft) -> Result<(), DraftError> {
        self.vcs.delete_branch(&draft.branch_name()).await?;
        if self.vcs.rev_parse(&draft.public_ref()).await?.is_some() {
            self.vcs.delete_ref(&draft.public_ref()).await?;
        }
        self.best_effort("mark retired", self.history.mark_retired(&draft.suffix));
        Ok(())
    }
}
