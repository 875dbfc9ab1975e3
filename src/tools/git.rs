// src/tools/git.rs

//! git plumbing
//!
//! Two consumers: the history walker (repo detection, manifest history,
//! show-at-revision) and the git backend (clone/fetch/tag/push). Both go
//! through the shared tool runner; nothing here parses porcelain output.

use super::Tool;
use crate::error::Result;
use std::path::Path;
use std::time::Duration;

/// Default timeout for git operations (2 minutes)
pub const GIT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct GitClient {
    timeout: Duration,
}

impl Default for GitClient {
    fn default() -> Self {
        Self { timeout: GIT_TIMEOUT }
    }
}

impl GitClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn git(&self, cwd: &Path) -> Tool {
        Tool::new("git").current_dir(cwd).timeout(self.timeout)
    }

    /// Whether `dir` lives inside a git work tree.
    pub fn is_work_tree(&self, dir: &Path) -> bool {
        self.git(dir)
            .args(["rev-parse", "--is-inside-work-tree"])
            .try_run()
            .map(|out| out.success && out.stdout.trim() == "true")
            .unwrap_or(false)
    }

    /// Full hashes of the commits that touched `path`, newest first.
    pub fn history_of(&self, dir: &Path, path: &str) -> Result<Vec<String>> {
        let output = self.git(dir).args(["log", "--format=%H", "--", path]).run()?;
        Ok(output
            .stdout
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Contents of `path` at `revision`, or None if the file does not exist
    /// there (untracked lockfiles are the common case).
    pub fn show_at(&self, dir: &Path, revision: &str, path: &str) -> Result<Option<String>> {
        let output = self
            .git(dir)
            .args(["show", &format!("{revision}:{path}")])
            .try_run()?;
        if output.success {
            Ok(Some(output.stdout))
        } else {
            Ok(None)
        }
    }

    /// `git clone --depth 1 --branch <tag> <repo> <dest>`, reporting whether
    /// the clone succeeded. A missing tag and an unreachable remote are not
    /// distinguishable from the exit status alone, so the caller decides
    /// what a failure means.
    pub fn clone_tag(&self, repo: &str, tag: &str, dest: &Path) -> Result<bool> {
        let output = Tool::new("git")
            .args(["clone", "--depth", "1", "--branch", tag])
            .arg(repo)
            .arg(dest.display().to_string())
            .timeout(self.timeout)
            .try_run()?;
        Ok(output.success)
    }

    /// Tag names present on the remote.
    pub fn remote_tags(&self, cwd: &Path, repo: &str) -> Result<Vec<String>> {
        let output = self
            .git(cwd)
            .args(["ls-remote", "--tags", repo])
            .run()?;
        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.split("refs/tags/").nth(1))
            .map(|tag| tag.trim_end_matches("^{}").to_string())
            .collect())
    }

    /// Initialize an empty repository with `origin` pointing at `repo`.
    pub fn init_with_origin(&self, dir: &Path, repo: &str) -> Result<()> {
        self.git(dir).args(["init", "--quiet"]).run()?;
        self.git(dir).args(["remote", "add", "origin", repo]).run()?;
        Ok(())
    }

    /// Commit everything staged-able in `dir` as a fresh root commit.
    pub fn commit_all(&self, dir: &Path, message: &str) -> Result<()> {
        self.git(dir).args(["add", "--all"]).run()?;
        self.git(dir)
            .args([
                "-c",
                "user.name=stockpile",
                "-c",
                "user.email=stockpile@localhost",
                "commit",
                "--quiet",
                "-m",
                message,
            ])
            .run()?;
        Ok(())
    }

    pub fn tag(&self, dir: &Path, tag: &str) -> Result<()> {
        self.git(dir).args(["tag", tag]).run()?;
        Ok(())
    }

    /// Push a single tag, reporting whether the remote accepted it. A
    /// rejected push is how a concurrent writer shows up.
    pub fn push_tag(&self, dir: &Path, tag: &str) -> Result<bool> {
        let output = self.git(dir).args(["push", "origin", tag]).try_run()?;
        Ok(output.success)
    }
}
