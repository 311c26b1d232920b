// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use log::debug;

use super::{Change, ClList, LabelState, multipart::group_by_topic};

pub const CODE_REVIEW_LABEL: &str = "Code-Review";
pub const VERIFIED_LABEL: &str = "Verified";

/// Whether a single change may be auto-submitted: it asked for auto-submit, Code-Review is approved, and Verified is
/// approved if the project has that label at all.
#[must_use]
pub fn is_submittable(change: &Change) -> bool {
    if !change.auto_submit {
        return false;
    }
    if change.label(CODE_REVIEW_LABEL) != Some(LabelState::Approved) {
        return false;
    }
    match change.label(VERIFIED_LABEL) {
        None | Some(LabelState::Approved) => true,
        Some(LabelState::Rejected | LabelState::Neutral) => false,
    }
}

/// Finds the groups of open changes that can be submitted right now.
///
/// Standalone changes are judged on their own.  A multi-part group is only submittable when it is complete and every
/// part is submittable; one disqualified part disqualifies the whole group.  Standalone changes come first in input
/// order, followed by groups in the order their topics were first seen.
#[must_use]
pub fn get_submittable_cls(changes: &[Change]) -> Vec<ClList> {
    let mut result: Vec<ClList> = changes
        .iter()
        .filter(|change| change.multi_part.is_none() && is_submittable(change))
        .map(|change| vec![change.clone()])
        .collect();

    for (topic, set) in group_by_topic(changes) {
        if !set.complete() {
            debug!("multi-part topic {topic:?} incomplete; not submittable");
            continue;
        }
        if let Some(blocker) = set.parts().find(|part| !is_submittable(part)) {
            debug!(
                "multi-part topic {topic:?} blocked by {}",
                blocker.display_name()
            );
            continue;
        }
        result.push(set.cls());
    }
    result
}
