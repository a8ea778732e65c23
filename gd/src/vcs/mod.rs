//! Version-control adapter
//!
//! The draft engine never shells out itself. Everything it needs from git is
//! expressed through the [`Vcs`] trait; [`GitCli`] implements it by running
//! the `git` executable against the repository's working directory.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

mod error;
mod git;

pub use error::{VcsError, VcsResult};
pub use git::GitCli;

/// A full object id (commit or tree)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha(String);

impl Sha {
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(10)]
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How conflicting hunks are handled by [`Vcs::merge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Leave conflicting paths unmerged in the index and working tree
    Conservative,
    /// Resolve every conflict with the incoming side's content
    PreferTheirs,
}

/// Result of a merge into HEAD
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// HEAD now points at this commit (a merge commit, or the previous HEAD
    /// when there was nothing to merge)
    Merged(Sha),
    /// The merge stopped with these paths unmerged
    Conflicted(Vec<String>),
}

/// Version-control primitives consumed by the draft engine
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Working directory root
    fn repo_root(&self) -> &Path;

    /// Absolute path of the repository's git directory
    async fn git_dir(&self) -> VcsResult<PathBuf>;

    /// Checked-out branch name, `None` when HEAD is detached
    async fn current_branch(&self) -> VcsResult<Option<String>>;

    /// Commit HEAD points at, `None` on an unborn branch
    async fn head(&self) -> VcsResult<Option<Sha>>;

    /// Resolve a revision to a commit, `None` if it does not exist
    async fn rev_parse(&self, rev: &str) -> VcsResult<Option<Sha>>;

    async fn branch_exists(&self, name: &str) -> VcsResult<bool>;
    async fn create_branch(&self, name: &str, from: &Sha) -> VcsResult<()>;

    /// Switch branches, keeping working-tree changes
    async fn checkout(&self, branch: &str) -> VcsResult<()>;

    /// Switch branches, discarding working-tree changes
    async fn force_checkout(&self, branch: &str) -> VcsResult<()>;

    /// Detach HEAD at its current commit
    async fn detach(&self) -> VcsResult<()>;

    async fn delete_branch(&self, name: &str) -> VcsResult<()>;

    /// Stage everything, untracked files included
    async fn stage_all(&self) -> VcsResult<()>;
    async fn stage_paths(&self, paths: &[String]) -> VcsResult<()>;

    /// Reset the index to HEAD, leaving the working tree untouched
    async fn unstage_all(&self) -> VcsResult<()>;

    /// Any staged, unstaged or untracked change relative to HEAD
    async fn is_dirty(&self) -> VcsResult<bool>;

    /// Any change between the index and the working tree (untracked included)
    async fn has_unstaged_changes(&self) -> VcsResult<bool>;

    /// Paths differing between the index and the working tree, untracked included
    async fn changed_paths_worktree(&self) -> VcsResult<Vec<String>>;

    /// Paths differing between the working tree and `base`
    async fn changed_paths_from(&self, base: &Sha) -> VcsResult<Vec<String>>;

    /// Paths differing between two commits
    async fn changed_paths_between(&self, from: &Sha, to: &Sha) -> VcsResult<Vec<String>>;

    /// Stash unstaged and untracked changes, keeping the index. Returns
    /// whether a stash entry was created.
    async fn stash_unstaged(&self) -> VcsResult<bool>;
    async fn stash_pop(&self) -> VcsResult<()>;

    /// Write the index as a tree
    async fn write_tree(&self) -> VcsResult<Sha>;

    /// Tree of a commit
    async fn tree_of(&self, commit: &Sha) -> VcsResult<Sha>;

    /// Tree equal to `base`'s tree with `paths` taken from the working tree.
    /// The real index is left untouched.
    async fn build_tree(&self, base: &Sha, paths: &[String]) -> VcsResult<Sha>;

    async fn commit_tree(&self, tree: &Sha, parents: &[Sha], message: &str) -> VcsResult<Sha>;
    async fn commit_message(&self, commit: &Sha) -> VcsResult<String>;

    async fn update_ref(&self, name: &str, sha: &Sha) -> VcsResult<()>;
    async fn delete_ref(&self, name: &str) -> VcsResult<()>;

    /// Refs under a prefix, as `(full name, target)`
    async fn list_refs(&self, prefix: &str) -> VcsResult<Vec<(String, Sha)>>;

    /// Move the current branch, index and working tree to `sha`
    async fn reset_hard(&self, sha: &Sha) -> VcsResult<()>;

    /// Move HEAD and the index to `sha`, keeping the working tree
    async fn reset_mixed(&self, sha: &Sha) -> VcsResult<()>;

    /// Three-way merge of `theirs` into HEAD
    async fn merge(&self, theirs: &Sha, policy: MergePolicy, message: &str) -> VcsResult<MergeOutcome>;
    async fn merge_in_progress(&self) -> VcsResult<bool>;
    async fn abort_merge(&self) -> VcsResult<()>;

    /// Make `paths` in the working tree and index match `from`; paths absent
    /// from `from` are removed
    async fn restore_paths(&self, from: &Sha, paths: &[String]) -> VcsResult<()>;

    /// Remove untracked, non-ignored files and directories
    async fn clean_untracked(&self) -> VcsResult<()>;

    async fn config_get(&self, key: &str) -> VcsResult<Option<String>>;
    async fn config_set(&self, key: &str, value: &str) -> VcsResult<()>;
}
