// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::errors::MultiPartError;

use super::{Change, ClList};

const TOTAL_UNSET: i32 = -1;

/// Accumulates the parts of one topic's multi-part change until every part has been seen.
///
/// Parts must agree on topic and declared total, and each part index may only be filled once.  Every check happens
/// before the set is touched, so a rejected [`MultiPartClSet::add_cl`] leaves the set exactly as it was.
#[derive(Debug, Clone)]
pub struct MultiPartClSet {
    topic: Option<String>,
    expected_total: i32,
    parts: BTreeMap<i32, Change>,
}

impl Default for MultiPartClSet {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiPartClSet {
    #[must_use]
    pub fn new() -> Self {
        MultiPartClSet {
            topic: None,
            expected_total: TOTAL_UNSET,
            parts: BTreeMap::new(),
        }
    }

    pub fn add_cl(&mut self, change: Change) -> Result<(), MultiPartError> {
        let Some(multi_part) = &change.multi_part else {
            return Err(MultiPartError::NotMultiPart {
                reference: change.reference,
            });
        };

        if multi_part.total <= 0 || multi_part.index < 1 || multi_part.index > multi_part.total {
            return Err(MultiPartError::InvalidDescriptor {
                reference: change.reference.clone(),
                index: multi_part.index,
                total: multi_part.total,
            });
        }

        if let Some(topic) = &self.topic {
            if *topic != multi_part.topic {
                return Err(MultiPartError::TopicMismatch {
                    reference: change.reference.clone(),
                    expected: topic.clone(),
                    actual: multi_part.topic.clone(),
                });
            }
        }

        if self.expected_total != TOTAL_UNSET && multi_part.total != self.expected_total {
            return Err(MultiPartError::TotalMismatch {
                reference: change.reference.clone(),
                expected: self.expected_total,
                actual: multi_part.total,
            });
        }

        if let Some(existing) = self.parts.get(&multi_part.index) {
            return Err(MultiPartError::DuplicateIndex {
                reference: change.reference.clone(),
                index: multi_part.index,
                existing: existing.reference.clone(),
            });
        }

        let index = multi_part.index;
        if self.expected_total == TOTAL_UNSET {
            self.expected_total = multi_part.total;
            self.topic = Some(multi_part.topic.clone());
        }
        self.parts.insert(index, change);
        Ok(())
    }

    #[must_use]
    pub fn complete(&self) -> bool {
        self.expected_total > 0 && usize::try_from(self.expected_total) == Ok(self.parts.len())
    }

    /// The parts ordered by ascending part index.  Only meaningful once [`MultiPartClSet::complete`] holds.
    #[must_use]
    pub fn cls(&self) -> ClList {
        self.parts.values().cloned().collect()
    }

    pub fn parts(&self) -> impl Iterator<Item = &Change> {
        self.parts.values()
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn expected_total(&self) -> i32 {
        self.expected_total
    }
}

/// Collects the multi-part changes among `changes` into one set per topic, in the order topics are first seen.
/// Changes without a multi-part descriptor are passed over, and parts a set rejects are logged and dropped.
pub(crate) fn group_by_topic<'a>(changes: impl IntoIterator<Item = &'a Change>) -> Vec<(String, MultiPartClSet)> {
    let mut topics: Vec<(String, MultiPartClSet)> = Vec::new();
    let mut topic_index: HashMap<&str, usize> = HashMap::new();

    for change in changes {
        let Some(multi_part) = &change.multi_part else {
            continue;
        };
        let idx = *topic_index.entry(multi_part.topic.as_str()).or_insert_with(|| {
            topics.push((multi_part.topic.clone(), MultiPartClSet::new()));
            topics.len() - 1
        });
        if let Err(e) = topics[idx].1.add_cl(change.clone()) {
            warn!("skipping multi-part change: {e}");
        }
    }
    topics
}
