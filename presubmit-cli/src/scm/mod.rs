// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::Result;
use log::{info, warn};

pub mod git;

/// Version-control operations needed to stage changes under test on a throwaway branch.
pub trait Scm {
    fn checkout_branch(&self, branch: &str) -> Result<()>;
    fn branch_exists(&self, branch: &str) -> Result<bool>;
    /// Force-deletes `branch`, which must not be checked out.
    fn delete_branch(&self, branch: &str) -> Result<()>;
    /// Creates `branch` at the current commit and checks it out.
    fn create_branch(&self, branch: &str) -> Result<()>;
    /// Merges `reference` from `remote` into the checked-out branch.
    fn pull(&self, remote: &str, reference: &str) -> Result<()>;
    /// Discards working-tree and index changes, including an in-progress merge.
    fn reset_hard(&self) -> Result<()>;
}

impl<T: Scm + ?Sized> Scm for &T {
    fn checkout_branch(&self, branch: &str) -> Result<()> {
        (**self).checkout_branch(branch)
    }

    fn branch_exists(&self, branch: &str) -> Result<bool> {
        (**self).branch_exists(branch)
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        (**self).delete_branch(branch)
    }

    fn create_branch(&self, branch: &str) -> Result<()> {
        (**self).create_branch(branch)
    }

    fn pull(&self, remote: &str, reference: &str) -> Result<()> {
        (**self).pull(remote, reference)
    }

    fn reset_hard(&self) -> Result<()> {
        (**self).reset_hard()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareOutcome {
    Ready,
    /// `reference` couldn't be merged onto the base branch.
    MergeConflict { reference: String },
}

/// Puts `scm` on a fresh `branch` cut from `base` with every ref in `references` pulled in, in order.
///
/// A failed pull is reported as [`PrepareOutcome::MergeConflict`] rather than an error; the checkout is reset so that
/// the caller can still run [`cleanup_branch`].  Errors are reserved for failures of the branch manipulation itself.
pub fn prepare_branch<S: Scm + ?Sized>(
    scm: &S,
    base: &str,
    branch: &str,
    remote: &str,
    references: &[&str],
) -> Result<PrepareOutcome> {
    scm.reset_hard()?;
    scm.checkout_branch(base)?;
    if scm.branch_exists(branch)? {
        info!("deleting stale branch {branch}");
        scm.delete_branch(branch)?;
    }
    scm.create_branch(branch)?;

    for reference in references {
        if let Err(e) = scm.pull(remote, reference) {
            warn!("pulling {reference} failed: {e:#}");
            scm.reset_hard()?;
            return Ok(PrepareOutcome::MergeConflict {
                reference: String::from(*reference),
            });
        }
    }
    Ok(PrepareOutcome::Ready)
}

/// Returns the checkout to `base` and removes `branch`.  Safe to call whether or not [`prepare_branch`] finished.
pub fn cleanup_branch<S: Scm + ?Sized>(scm: &S, base: &str, branch: &str) -> Result<()> {
    scm.reset_hard()?;
    scm.checkout_branch(base)?;
    if scm.branch_exists(branch)? {
        scm.delete_branch(branch)?;
    }
    Ok(())
}
