// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::errors::SubcommandErrors;
use crate::scm::Scm;
use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct GitScm {
    project_dir: PathBuf,
}

impl GitScm {
    #[must_use]
    pub fn new(project_dir: PathBuf) -> Self {
        Self { project_dir }
    }

    #[must_use]
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let command = format!("git {}", args.join(" "));
        debug!("running {command} in {}", self.project_dir.display());
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.project_dir)
            .output()
            .map_err(|e| SubcommandErrors::UnableToStart {
                command: command.clone(),
                error: e,
            })?;

        if !output.status.success() {
            return Err(SubcommandErrors::SubcommandFailed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

impl Scm for GitScm {
    fn checkout_branch(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", branch])?;
        Ok(())
    }

    fn branch_exists(&self, branch: &str) -> Result<bool> {
        let stdout = self.git(&["branch", "--list", branch])?;
        Ok(!stdout.trim().is_empty())
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        self.git(&["branch", "-D", branch])?;
        Ok(())
    }

    fn create_branch(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", "-b", branch])?;
        Ok(())
    }

    fn pull(&self, remote: &str, reference: &str) -> Result<()> {
        self.git(&["pull", "--no-rebase", "--no-edit", remote, reference])?;
        Ok(())
    }

    fn reset_hard(&self) -> Result<()> {
        // `reset --merge` aborts a conflicted merge; it fails harmlessly when there's nothing to abort.
        if let Err(e) = self.git(&["reset", "--merge"]) {
            debug!("reset --merge: {e:#}");
        }
        self.git(&["reset", "--hard", "HEAD"])?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{fs, path::Path, process::Command};

    use anyhow::Result;

    pub(crate) fn git(dir: &Path, args: &[&str]) -> Result<()> {
        let status = Command::new("git")
            .args([
                "-c",
                "user.name=Presubmit Test",
                "-c",
                "user.email=presubmit@example.com",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .current_dir(dir)
            .status()?;
        anyhow::ensure!(status.success(), "git {args:?} failed");
        Ok(())
    }

    pub(crate) fn commit_file(dir: &Path, name: &str, content: &str, message: &str) -> Result<()> {
        fs::write(dir.join(name), content)?;
        git(dir, &["add", name])?;
        git(dir, &["commit", "-q", "-m", message])
    }

    /// An "upstream" repository with a change published at `refs/changes/00/1000/1`, and a clone of it.
    pub(crate) fn upstream_and_clone(upstream: &Path, clone: &Path, change_content: &str) -> Result<()> {
        git(upstream, &["init", "-q", "-b", "master"])?;
        commit_file(upstream, "README", "base\n", "base")?;
        git(upstream, &["checkout", "-q", "-b", "change"])?;
        commit_file(upstream, "README", change_content, "the change")?;
        git(upstream, &["update-ref", "refs/changes/00/1000/1", "HEAD"])?;
        git(upstream, &["checkout", "-q", "master"])?;

        let clone_str = clone.to_str().expect("utf-8 temp path");
        let upstream_str = upstream.to_str().expect("utf-8 temp path");
        git(upstream, &["clone", "-q", upstream_str, clone_str])?;
        git(clone, &["config", "user.name", "Presubmit Test"])?;
        git(clone, &["config", "user.email", "presubmit@example.com"])?;
        git(clone, &["config", "commit.gpgsign", "false"])
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;

    use crate::scm::{PrepareOutcome, Scm as _, cleanup_branch, prepare_branch};

    use super::{
        GitScm,
        test_support::{commit_file, upstream_and_clone},
    };

    #[test]
    fn prepare_pulls_change_and_cleanup_restores() -> Result<()> {
        let tmp_dir = tempfile::Builder::new().prefix("presubmit-test").tempdir()?;
        let upstream = tmp_dir.path().join("upstream");
        let clone = tmp_dir.path().join("clone");
        fs::create_dir(&upstream)?;
        upstream_and_clone(&upstream, &clone, "changed\n")?;

        let scm = GitScm::new(clone.clone());
        let outcome = prepare_branch(
            &scm,
            "master",
            "presubmit",
            "origin",
            &["refs/changes/00/1000/1"],
        )?;
        assert_eq!(outcome, PrepareOutcome::Ready);
        assert!(scm.branch_exists("presubmit")?);
        assert_eq!(fs::read_to_string(clone.join("README"))?, "changed\n");

        // A second run replaces the stale branch rather than failing on it.
        let outcome = prepare_branch(&scm, "master", "presubmit", "origin", &[])?;
        assert_eq!(outcome, PrepareOutcome::Ready);
        assert_eq!(fs::read_to_string(clone.join("README"))?, "base\n");

        cleanup_branch(&scm, "master", "presubmit")?;
        assert!(!scm.branch_exists("presubmit")?);
        Ok(())
    }

    #[test]
    fn conflicting_change_is_reported() -> Result<()> {
        let tmp_dir = tempfile::Builder::new().prefix("presubmit-test").tempdir()?;
        let upstream = tmp_dir.path().join("upstream");
        let clone = tmp_dir.path().join("clone");
        fs::create_dir(&upstream)?;
        upstream_and_clone(&upstream, &clone, "theirs\n")?;
        commit_file(&clone, "README", "ours\n", "local divergence")?;

        let scm = GitScm::new(clone.clone());
        let outcome = prepare_branch(
            &scm,
            "master",
            "presubmit",
            "origin",
            &["refs/changes/00/1000/1"],
        )?;
        assert_eq!(
            outcome,
            PrepareOutcome::MergeConflict {
                reference: String::from("refs/changes/00/1000/1")
            }
        );
        // The conflicted merge was rolled back.
        assert_eq!(fs::read_to_string(clone.join("README"))?, "ours\n");
        cleanup_branch(&scm, "master", "presubmit")?;
        Ok(())
    }

    #[test]
    fn missing_directory_fails_to_start() {
        let scm = GitScm::new("/nonexistent/presubmit/checkout".into());
        assert!(scm.checkout_branch("master").is_err());
    }
}
