// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::RefParseError;

mod diff;
mod multipart;
mod reference;
mod submit;

pub use diff::new_open_cls;
pub use multipart::MultiPartClSet;
pub use reference::ChangeRef;
pub use submit::{CODE_REVIEW_LABEL, VERIFIED_LABEL, get_submittable_cls, is_submittable};

/// One atomic unit of dispatchable work: a single change, or a complete multi-part group ordered by part index.
pub type ClList = Vec<Change>;

/// Changes seen by the previous poll, keyed by their ref string.
pub type ClRefMap = BTreeMap<String, Change>;

/// Highest known patchset for each change number.
pub type ClNumberToPatchsetMap = BTreeMap<u64, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelState {
    Approved,
    Rejected,
    Neutral,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresubmitTestType {
    #[default]
    All,
    /// The change opted out of presubmit testing entirely.
    None,
}

/// Links a change to the other parts of a topic that must be tested and submitted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiPart {
    pub topic: String,
    /// 1-based.
    pub index: i32,
    pub total: i32,
}

/// A Gerrit change at a specific patchset, as observed by one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Change {
    #[serde(rename = "ref")]
    pub reference: String,
    pub project: String,
    pub owner_email: String,
    /// Commit sha of the current patchset.
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub labels: BTreeMap<String, LabelState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_part: Option<MultiPart>,
    #[serde(default)]
    pub auto_submit: bool,
    #[serde(default)]
    pub presubmit: PresubmitTestType,
}

impl Change {
    pub fn change_ref(&self) -> Result<ChangeRef, RefParseError> {
        ChangeRef::parse(&self.reference)
    }

    #[must_use]
    pub fn label(&self, name: &str) -> Option<LabelState> {
        self.labels.get(name).copied()
    }

    /// Short human-readable form, `<change>/<patchset>`, falling back to the raw ref.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.change_ref() {
            Ok(change_ref) => change_ref.to_string(),
            Err(_) => self.reference.clone(),
        }
    }
}

#[must_use]
pub fn cl_list_display(cls: &[Change]) -> String {
    cls.iter()
        .map(Change::display_name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds the change-number to patchset map for a group, keeping the highest patchset seen for each change.  Changes
/// with unparseable refs are left out.
#[must_use]
pub fn patchset_map<'a>(cls: impl IntoIterator<Item = &'a Change>) -> ClNumberToPatchsetMap {
    let mut map = ClNumberToPatchsetMap::new();
    for change in cls {
        if let Ok(change_ref) = change.change_ref() {
            let entry = map.entry(change_ref.change_number).or_insert(0);
            *entry = (*entry).max(change_ref.patchset);
        }
    }
    map
}
