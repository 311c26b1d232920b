// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use log::debug;

use super::{Change, ClList, ClRefMap, multipart::group_by_topic};

/// Computes the units of work that appeared since the previous poll.
///
/// Single changes whose ref was not seen before are emitted as singleton lists, in the order they appear in
/// `current`.  Multi-part changes are grouped by topic, and a group is emitted (ordered by part index) once it is
/// complete and at least one of its parts is new; groups are emitted after all singletons, in the order their topics
/// were first encountered.  Incomplete groups are dropped silently and reconsidered on the next poll.
#[must_use]
pub fn new_open_cls(previous: &ClRefMap, current: &[Change]) -> Vec<ClList> {
    let mut result: Vec<ClList> = current
        .iter()
        .filter(|change| change.multi_part.is_none() && !previous.contains_key(&change.reference))
        .map(|change| vec![change.clone()])
        .collect();

    for (topic, set) in group_by_topic(current) {
        if !set.complete() {
            debug!(
                "multi-part topic {topic:?} incomplete ({} of {} parts)",
                set.parts().count(),
                set.expected_total()
            );
            continue;
        }
        if set
            .parts()
            .all(|part| previous.contains_key(&part.reference))
        {
            debug!("multi-part topic {topic:?} already reported");
            continue;
        }
        result.push(set.cls());
    }
    result
}
