//! `Vcs` implementation driving the `git` executable

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{MergeOutcome, MergePolicy, Sha, Vcs, VcsError, VcsResult};

/// Git adapter bound to one working directory
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    /// Open the repository containing `path`
    pub async fn open(path: impl AsRef<Path>) -> VcsResult<Self> {
        let path = path.as_ref();
        debug!(?path, "GitCli::open: called");

        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .await?;

        if !output.status.success() {
            debug!("GitCli::open: not inside a work tree");
            return Err(VcsError::NotARepository(path.to_path_buf()));
        }

        let root = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        debug!(?root, "GitCli::open: resolved root");
        Ok(Self { root })
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.root).env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    /// Run git and return the raw output, whatever the exit status
    async fn output(&self, args: &[&str]) -> VcsResult<Output> {
        debug!(?args, "GitCli::output: called");
        Ok(self.command(args).output().await?)
    }

    /// Run git, failing on a non-zero exit status
    async fn run(&self, args: &[&str]) -> VcsResult<String> {
        let output = self.output(args).await?;
        check(args, output)
    }

    async fn run_with_env(&self, args: &[&str], key: &str, value: &OsStr) -> VcsResult<String> {
        debug!(?args, %key, "GitCli::run_with_env: called");
        let output = self.command(args).env(key, value).output().await?;
        check(args, output)
    }

    /// Run git, mapping exit status 0/1 to true/false
    async fn probe(&self, args: &[&str]) -> VcsResult<bool> {
        let output = self.output(args).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            code => Err(VcsError::CommandFailed {
                args: args.join(" "),
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    async fn untracked(&self) -> VcsResult<Vec<String>> {
        let out = self.run(&["ls-files", "--others", "--exclude-standard", "-z"]).await?;
        Ok(split_nul(&out))
    }

    async fn conflicted_paths(&self) -> VcsResult<Vec<String>> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U", "-z"]).await?;
        Ok(split_nul(&out))
    }
}

fn check(args: &[&str], output: Output) -> VcsResult<String> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(?args, %stderr, "git command failed");
        Err(VcsError::CommandFailed {
            args: args.join(" "),
            code: output.status.code(),
            stderr,
        })
    }
}

fn split_nul(out: &str) -> Vec<String> {
    out.split('\0').filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn parse_sha(out: &str) -> VcsResult<Sha> {
    let sha = out.trim();
    if sha.is_empty() || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(VcsError::InvalidOutput(sha.to_string()));
    }
    Ok(Sha::new(sha))
}

#[async_trait]
impl Vcs for GitCli {
    fn repo_root(&self) -> &Path {
        &self.root
    }

    async fn git_dir(&self) -> VcsResult<PathBuf> {
        let out = self.run(&["rev-parse", "--absolute-git-dir"]).await?;
        Ok(PathBuf::from(out.trim()))
    }

    async fn current_branch(&self) -> VcsResult<Option<String>> {
        debug!("GitCli::current_branch: called");
        let output = self.output(&["symbolic-ref", "-q", "--short", "HEAD"]).await?;
        if !output.status.success() {
            debug!("GitCli::current_branch: detached");
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(name))
    }

    async fn head(&self) -> VcsResult<Option<Sha>> {
        self.rev_parse("HEAD").await
    }

    async fn rev_parse(&self, rev: &str) -> VcsResult<Option<Sha>> {
        debug!(%rev, "GitCli::rev_parse: called");
        let spec = format!("{rev}^{{commit}}");
        let output = self.output(&["rev-parse", "-q", "--verify", &spec]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        parse_sha(&String::from_utf8_lossy(&output.stdout)).map(Some)
    }

    async fn branch_exists(&self, name: &str) -> VcsResult<bool> {
        let full = format!("refs/heads/{name}");
        self.probe(&["show-ref", "--verify", "--quiet", &full]).await
    }

    async fn create_branch(&self, name: &str, from: &Sha) -> VcsResult<()> {
        debug!(%name, %from, "GitCli::create_branch: called");
        self.run(&["branch", name, from.as_str()]).await.map(drop)
    }

    async fn checkout(&self, branch: &str) -> VcsResult<()> {
        debug!(%branch, "GitCli::checkout: called");
        self.run(&["checkout", "-q", branch]).await.map(drop)
    }

    async fn force_checkout(&self, branch: &str) -> VcsResult<()> {
        debug!(%branch, "GitCli::force_checkout: called");
        self.run(&["checkout", "-q", "-f", branch]).await.map(drop)
    }

    async fn detach(&self) -> VcsResult<()> {
        self.run(&["checkout", "-q", "--detach"]).await.map(drop)
    }

    async fn delete_branch(&self, name: &str) -> VcsResult<()> {
        debug!(%name, "GitCli::delete_branch: called");
        self.run(&["branch", "-q", "-D", name]).await.map(drop)
    }

    async fn stage_all(&self) -> VcsResult<()> {
        self.run(&["add", "-A"]).await.map(drop)
    }

    async fn stage_paths(&self, paths: &[String]) -> VcsResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "-A", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).await.map(drop)
    }

    async fn unstage_all(&self) -> VcsResult<()> {
        self.run(&["reset", "-q"]).await.map(drop)
    }

    async fn is_dirty(&self) -> VcsResult<bool> {
        let out = self.run(&["status", "--porcelain"]).await?;
        Ok(!out.trim().is_empty())
    }

    async fn has_unstaged_changes(&self) -> VcsResult<bool> {
        let clean = self.probe(&["diff", "--quiet"]).await?;
        if !clean {
            return Ok(true);
        }
        Ok(!self.untracked().await?.is_empty())
    }

    async fn changed_paths_worktree(&self) -> VcsResult<Vec<String>> {
        debug!("GitCli::changed_paths_worktree: called");
        let out = self.run(&["diff", "--name-only", "-z"]).await?;
        let mut paths: BTreeSet<String> = split_nul(&out).into_iter().collect();
        paths.extend(self.untracked().await?);
        Ok(paths.into_iter().collect())
    }

    async fn changed_paths_from(&self, base: &Sha) -> VcsResult<Vec<String>> {
        debug!(%base, "GitCli::changed_paths_from: called");
        let out = self.run(&["diff", "--name-only", "-z", base.as_str()]).await?;
        let mut paths: BTreeSet<String> = split_nul(&out).into_iter().collect();
        paths.extend(self.untracked().await?);
        Ok(paths.into_iter().collect())
    }

    async fn changed_paths_between(&self, from: &Sha, to: &Sha) -> VcsResult<Vec<String>> {
        let out = self
            .run(&["diff", "--name-only", "-z", from.as_str(), to.as_str()])
            .await?;
        Ok(split_nul(&out))
    }

    async fn stash_unstaged(&self) -> VcsResult<bool> {
        debug!("GitCli::stash_unstaged: called");
        if !self.has_unstaged_changes().await? {
            debug!("GitCli::stash_unstaged: nothing to stash");
            return Ok(false);
        }
        self.run(&[
            "stash",
            "push",
            "-q",
            "--keep-index",
            "--include-untracked",
            "-m",
            "git-draft: unstaged changes",
        ])
        .await?;
        Ok(true)
    }

    async fn stash_pop(&self) -> VcsResult<()> {
        debug!("GitCli::stash_pop: called");
        self.run(&["stash", "pop", "-q"]).await.map(drop)
    }

    async fn write_tree(&self) -> VcsResult<Sha> {
        let out = self.run(&["write-tree"]).await?;
        parse_sha(&out)
    }

    async fn tree_of(&self, commit: &Sha) -> VcsResult<Sha> {
        let spec = format!("{commit}^{{tree}}");
        let out = self.run(&["rev-parse", &spec]).await?;
        parse_sha(&out)
    }

    async fn build_tree(&self, base: &Sha, paths: &[String]) -> VcsResult<Sha> {
        debug!(%base, ?paths, "GitCli::build_tree: called");
        let index = self
            .git_dir()
            .await?
            .join(format!("draft-index-{}", uuid::Uuid::new_v4().simple()));
        let key = "GIT_INDEX_FILE";

        let result = async {
            self.run_with_env(&["read-tree", base.as_str()], key, index.as_os_str())
                .await?;
            if !paths.is_empty() {
                let mut args = vec!["update-index", "--add", "--remove", "--"];
                args.extend(paths.iter().map(String::as_str));
                self.run_with_env(&args, key, index.as_os_str()).await?;
            }
            let out = self.run_with_env(&["write-tree"], key, index.as_os_str()).await?;
            parse_sha(&out)
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&index).await {
            warn!(?index, %e, "Failed to remove temporary index");
        }
        result
    }

    async fn commit_tree(&self, tree: &Sha, parents: &[Sha], message: &str) -> VcsResult<Sha> {
        debug!(%tree, ?parents, "GitCli::commit_tree: called");
        let mut args = vec!["commit-tree", tree.as_str()];
        for parent in parents {
            args.push("-p");
            args.push(parent.as_str());
        }
        args.push("-m");
        args.push(message);
        let out = self.run(&args).await?;
        parse_sha(&out)
    }

    async fn commit_message(&self, commit: &Sha) -> VcsResult<String> {
        let out = self.run(&["log", "-1", "--format=%B", commit.as_str()]).await?;
        Ok(out.trim_end().to_string())
    }

    async fn update_ref(&self, name: &str, sha: &Sha) -> VcsResult<()> {
        debug!(%name, %sha, "GitCli::update_ref: called");
        self.run(&["update-ref", name, sha.as_str()]).await.map(drop)
    }

    async fn delete_ref(&self, name: &str) -> VcsResult<()> {
        debug!(%name, "GitCli::delete_ref: called");
        self.run(&["update-ref", "-d", name]).await.map(drop)
    }

    async fn list_refs(&self, prefix: &str) -> VcsResult<Vec<(String, Sha)>> {
        let out = self
            .run(&["for-each-ref", "--format=%(refname) %(objectname)", prefix])
            .await?;
        out.lines()
            .filter(|l| !l.is_empty())
            .map(|line| match line.split_once(' ') {
                Some((name, sha)) => Ok((name.to_string(), parse_sha(sha)?)),
                None => Err(VcsError::InvalidOutput(line.to_string())),
            })
            .collect()
    }

    async fn reset_hard(&self, sha: &Sha) -> VcsResult<()> {
        debug!(%sha, "GitCli::reset_hard: called");
        self.run(&["reset", "-q", "--hard", sha.as_str()]).await.map(drop)
    }

    async fn reset_mixed(&self, sha: &Sha) -> VcsResult<()> {
        debug!(%sha, "GitCli::reset_mixed: called");
        self.run(&["reset", "-q", "--mixed", "-N", sha.as_str()]).await.map(drop)
    }

    async fn merge(&self, theirs: &Sha, policy: MergePolicy, message: &str) -> VcsResult<MergeOutcome> {
        debug!(%theirs, ?policy, "GitCli::merge: called");
        let mut args = vec!["merge", "-q", "--no-ff", "--no-verify", "--no-edit"];
        if policy == MergePolicy::PreferTheirs {
            args.extend(["-X", "theirs"]);
        }
        args.extend(["-m", message, theirs.as_str()]);

        let output = self.output(&args).await?;
        if !output.status.success() {
            let conflicts = self.conflicted_paths().await?;
            if conflicts.is_empty() {
                debug!("GitCli::merge: failed without conflicts");
                check(&args, output)?;
            }
            match policy {
                MergePolicy::Conservative => {
                    debug!(?conflicts, "GitCli::merge: leaving conflicts");
                    return Ok(MergeOutcome::Conflicted(conflicts));
                }
                MergePolicy::PreferTheirs => {
                    debug!(?conflicts, "GitCli::merge: resolving to theirs");
                    for path in &conflicts {
                        let taken = self.output(&["checkout", "--theirs", "--", path]).await?;
                        if taken.status.success() {
                            self.run(&["add", "--", path]).await?;
                        } else {
                            self.run(&["rm", "-q", "-f", "--", path]).await?;
                        }
                    }
                    self.run(&["commit", "-q", "--no-verify", "--no-edit"]).await?;
                }
            }
        }

        match self.head().await? {
            Some(sha) => Ok(MergeOutcome::Merged(sha)),
            None => Err(VcsError::InvalidOutput("HEAD missing after merge".to_string())),
        }
    }

    async fn merge_in_progress(&self) -> VcsResult<bool> {
        Ok(self.git_dir().await?.join("MERGE_HEAD").exists())
    }

    async fn abort_merge(&self) -> VcsResult<()> {
        debug!("GitCli::abort_merge: called");
        self.run(&["merge", "--abort"]).await.map(drop)
    }

    async fn restore_paths(&self, from: &Sha, paths: &[String]) -> VcsResult<()> {
        debug!(%from, ?paths, "GitCli::restore_paths: called");
        for path in paths {
            let object = format!("{from}:{path}");
            if self.output(&["cat-file", "-e", &object]).await?.status.success() {
                self.run(&["checkout", from.as_str(), "--", path]).await?;
            } else {
                let file = self.root.join(path);
                if file.exists() {
                    tokio::fs::remove_file(&file).await?;
                }
                self.run(&["rm", "-q", "--cached", "--ignore-unmatch", "--", path])
                    .await?;
            }
        }
        Ok(())
    }

    async fn clean_untracked(&self) -> VcsResult<()> {
        self.run(&["clean", "-q", "-f", "-d"]).await.map(drop)
    }

    async fn config_get(&self, key: &str) -> VcsResult<Option<String>> {
        let output = self.output(&["config", "--get", key]).await?;
        match output.status.code() {
            Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string())),
            Some(1) => Ok(None),
            code => Err(VcsError::CommandFailed {
                args: format!("config --get {key}"),
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    async fn config_set(&self, key: &str, value: &str) -> VcsResult<()> {
        debug!(%key, %value, "GitCli::config_set: called");
        self.run(&["config", key, value]).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    async fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git").args(args).current_dir(dir).output().await.unwrap();
        assert!(output.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&output.stderr));
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    async fn setup_git_repo() -> (TempDir, GitCli) {
        let dir = tempdir().unwrap();
        git(dir.path(), &["init", "-q", "-b", "main"]).await;
        git(dir.path(), &["config", "user.email", "test@test.com"]).await;
        git(dir.path(), &["config", "user.name", "Test"]).await;
        git(dir.path(), &["commit", "-q", "--allow-empty", "-m", "initial"]).await;
        let vcs = GitCli::open(dir.path()).await.unwrap();
        (dir, vcs)
    }

    fn write(dir: &Path, path: &str, contents: &str) {
        let file = dir.join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file, contents).unwrap();
    }

    #[test]
    fn test_split_nul() {
        assert_eq!(split_nul("a\0b c\0\0"), vec!["a".to_string(), "b c".to_string()]);
        assert!(split_nul("").is_empty());
    }

    #[test]
    fn test_parse_sha_rejects_garbage() {
        assert!(parse_sha("fatal: bad revision").is_err());
        assert_eq!(parse_sha("abc123\n").unwrap().as_str(), "abc123");
    }

    #[tokio::test]
    async fn test_open_outside_repository() {
        let dir = tempdir().unwrap();
        let result = GitCli::open(dir.path()).await;
        assert!(matches!(result, Err(VcsError::NotARepository(_))));
    }

    #[tokio::test]
    async fn test_branch_and_head() {
        let (_dir, vcs) = setup_git_repo().await;

        assert_eq!(vcs.current_branch().await.unwrap().as_deref(), Some("main"));
        let head = vcs.head().await.unwrap().unwrap();

        vcs.create_branch("draft/abc", &head).await.unwrap();
        assert!(vcs.branch_exists("draft/abc").await.unwrap());
        assert!(!vcs.branch_exists("draft/zzz").await.unwrap());

        vcs.checkout("draft/abc").await.unwrap();
        assert_eq!(vcs.current_branch().await.unwrap().as_deref(), Some("draft/abc"));

        vcs.detach().await.unwrap();
        assert!(vcs.current_branch().await.unwrap().is_none());
        assert!(vcs.rev_parse("no-such-rev").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_tree_and_refs() {
        let (dir, vcs) = setup_git_repo().await;
        let head = vcs.head().await.unwrap().unwrap();

        write(dir.path(), "a.txt", "hello\n");
        vcs.stage_all().await.unwrap();
        let tree = vcs.write_tree().await.unwrap();
        assert_ne!(tree, vcs.tree_of(&head).await.unwrap());

        let commit = vcs.commit_tree(&tree, &[head.clone()], "draft! sync").await.unwrap();
        assert_eq!(vcs.commit_message(&commit).await.unwrap(), "draft! sync");

        vcs.update_ref("refs/drafts/abc/1", &commit).await.unwrap();
        vcs.update_ref("refs/drafts/abc/2", &head).await.unwrap();
        let refs = vcs.list_refs("refs/drafts/abc/").await.unwrap();
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&("refs/drafts/abc/1".to_string(), commit)));

        vcs.delete_ref("refs/drafts/abc/2").await.unwrap();
        assert_eq!(vcs.list_refs("refs/drafts/abc/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_worktree_changes() {
        let (dir, vcs) = setup_git_repo().await;
        assert!(!vcs.is_dirty().await.unwrap());

        write(dir.path(), "tracked.txt", "one\n");
        vcs.stage_all().await.unwrap();
        assert!(vcs.is_dirty().await.unwrap());
        assert!(!vcs.has_unstaged_changes().await.unwrap());

        write(dir.path(), "tracked.txt", "two\n");
        write(dir.path(), "new.txt", "new\n");
        assert!(vcs.has_unstaged_changes().await.unwrap());
        assert_eq!(
            vcs.changed_paths_worktree().await.unwrap(),
            vec!["new.txt".to_string(), "tracked.txt".to_string()]
        );

        vcs.unstage_all().await.unwrap();
        let head = vcs.head().await.unwrap().unwrap();
        assert_eq!(vcs.write_tree().await.unwrap(), vcs.tree_of(&head).await.unwrap());
        assert_eq!(std::fs::read_to_string(dir.path().join("tracked.txt")).unwrap(), "two\n");
    }

    #[tokio::test]
    async fn test_stash_unstaged_keeps_index() {
        let (dir, vcs) = setup_git_repo().await;

        write(dir.path(), "staged.txt", "staged\n");
        vcs.stage_all().await.unwrap();
        write(dir.path(), "loose.txt", "loose\n");

        assert!(vcs.stash_unstaged().await.unwrap());
        assert!(dir.path().join("staged.txt").exists());
        assert!(!dir.path().join("loose.txt").exists());

        vcs.stash_pop().await.unwrap();
        assert!(dir.path().join("loose.txt").exists());

        vcs.stage_all().await.unwrap();
        assert!(!vcs.stash_unstaged().await.unwrap());
    }

    #[tokio::test]
    async fn test_build_tree_leaves_index_alone() {
        let (dir, vcs) = setup_git_repo().await;
        let head = vcs.head().await.unwrap().unwrap();

        write(dir.path(), "a.txt", "a\n");
        write(dir.path(), "b.txt", "b\n");
        let tree = vcs.build_tree(&head, &["a.txt".to_string()]).await.unwrap();

        let listing = git(dir.path(), &["ls-tree", "--name-only", tree.as_str()]).await;
        assert_eq!(listing.trim(), "a.txt");
        // real index untouched
        assert_eq!(vcs.write_tree().await.unwrap(), vcs.tree_of(&head).await.unwrap());
    }

    #[tokio::test]
    async fn test_merge_conflict_policies() {
        let (dir, vcs) = setup_git_repo().await;
        write(dir.path(), "f.txt", "base\n");
        git(dir.path(), &["add", "-A"]).await;
        git(dir.path(), &["commit", "-q", "-m", "base"]).await;
        let base = vcs.head().await.unwrap().unwrap();

        write(dir.path(), "f.txt", "theirs\n");
        vcs.stage_all().await.unwrap();
        let tree = vcs.write_tree().await.unwrap();
        let theirs = vcs.commit_tree(&tree, &[base.clone()], "theirs").await.unwrap();
        vcs.reset_hard(&base).await.unwrap();

        write(dir.path(), "f.txt", "ours\n");
        git(dir.path(), &["commit", "-q", "-am", "ours"]).await;
        let ours = vcs.head().await.unwrap().unwrap();

        let outcome = vcs.merge(&theirs, MergePolicy::Conservative, "merge").await.unwrap();
        assert_eq!(outcome, MergeOutcome::Conflicted(vec!["f.txt".to_string()]));
        assert!(vcs.merge_in_progress().await.unwrap());
        vcs.abort_merge().await.unwrap();
        assert!(!vcs.merge_in_progress().await.unwrap());

        vcs.reset_hard(&ours).await.unwrap();
        let outcome = vcs.merge(&theirs, MergePolicy::PreferTheirs, "merge").await.unwrap();
        assert!(matches!(outcome, MergeOutcome::Merged(_)));
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "theirs\n");
    }

    #[tokio::test]
    async fn test_restore_paths() {
        let (dir, vcs) = setup_git_repo().await;
        write(dir.path(), "keep.txt", "v1\n");
        git(dir.path(), &["add", "-A"]).await;
        git(dir.path(), &["commit", "-q", "-m", "v1"]).await;
        let v1 = vcs.head().await.unwrap().unwrap();

        write(dir.path(), "keep.txt", "v2\n");
        write(dir.path(), "gone.txt", "x\n");
        vcs.stage_all().await.unwrap();

        vcs.restore_paths(&v1, &["keep.txt".to_string(), "gone.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("keep.txt")).unwrap(), "v1\n");
        assert!(!dir.path().join("gone.txt").exists());
        assert!(!vcs.is_dirty().await.unwrap());
    }

    #[tokio::test]
    async fn test_config_roundtrip() {
        let (_dir, vcs) = setup_git_repo().await;
        assert!(vcs.config_get("draft.repouuid").await.unwrap().is_none());
        vcs.config_set("branch.draft/abc.draftorigin", "main").await.unwrap();
        assert_eq!(
            vcs.config_get("branch.draft/abc.draftorigin").await.unwrap().as_deref(),
            Some("main")
        );
    }
}
