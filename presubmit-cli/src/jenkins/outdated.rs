// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use log::{debug, trace};

use crate::cl::{ChangeRef, ClNumberToPatchsetMap};

use super::model::{BuildListing, QueueListing, REFS_PARAMETER};

/// How a build's patchset compares to the known patchset before the build counts as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchsetBoundary {
    /// Stale only if at least one shared change has a strictly newer known patchset.
    StrictlyGreater,
    /// Stale as soon as the known patchsets are equal or newer; a build for exactly the patchsets being dispatched
    /// again is replaced.
    GreaterOrEqual,
}

pub const OUTDATED_BOUNDARY: PatchsetBoundary = PatchsetBoundary::GreaterOrEqual;

/// Decides whether a build launched against `build_refs` (colon-separated) is superseded by `cl_patchsets`.
///
/// Only change numbers present on both sides are compared.  If any of them has a known patchset older than the
/// build's, the build is newer than what we know and is kept.  If none are shared, the build is unrelated and kept.
/// Unparseable refs within the build are ignored.
#[must_use]
pub fn is_build_outdated(
    build_refs: &str,
    cl_patchsets: &ClNumberToPatchsetMap,
    boundary: PatchsetBoundary,
) -> bool {
    let mut any_shared = false;
    let mut any_newer = false;

    for reference in build_refs.split(':').filter(|r| !r.is_empty()) {
        let change_ref = match ChangeRef::parse(reference) {
            Ok(change_ref) => change_ref,
            Err(e) => {
                trace!("ignoring build ref: {e}");
                continue;
            }
        };
        let Some(&known) = cl_patchsets.get(&change_ref.change_number) else {
            continue;
        };
        any_shared = true;
        if known < change_ref.patchset {
            return false;
        }
        if known > change_ref.patchset {
            any_newer = true;
        }
    }

    match boundary {
        PatchsetBoundary::StrictlyGreater => any_newer,
        PatchsetBoundary::GreaterOrEqual => any_shared,
    }
}

/// Queue items of `job` made stale by `cl_patchsets`, by queue id.
#[must_use]
pub fn queued_outdated_builds(
    queue: &QueueListing,
    job: &str,
    cl_patchsets: &ClNumberToPatchsetMap,
    boundary: PatchsetBoundary,
) -> Vec<u64> {
    queue
        .items
        .iter()
        .filter(|item| item.task_name() == Some(job))
        .filter(|item| {
            item.parameter(REFS_PARAMETER)
                .is_some_and(|refs| is_build_outdated(&refs, cl_patchsets, boundary))
        })
        .inspect(|item| debug!("queued item {} of {job} is outdated", item.id))
        .map(|item| item.id)
        .collect()
}

/// The running build made stale by `cl_patchsets`, if there is one.  A build of an older patchset is preferred over
/// one that merely matches the known patchsets.
#[must_use]
pub fn ongoing_outdated_build(
    builds: &BuildListing,
    cl_patchsets: &ClNumberToPatchsetMap,
    boundary: PatchsetBoundary,
) -> Option<u64> {
    let outdated: Vec<(u64, String)> = builds
        .builds
        .iter()
        .filter(|build| build.building)
        .filter_map(|build| Some((build.number, build.parameter(REFS_PARAMETER)?)))
        .filter(|(_, refs)| is_build_outdated(refs, cl_patchsets, boundary))
        .collect();
    outdated
        .iter()
        .find(|(_, refs)| is_build_outdated(refs, cl_patchsets, PatchsetBoundary::StrictlyGreater))
        .or_else(|| outdated.first())
        .map(|(number, _)| *number)
}
