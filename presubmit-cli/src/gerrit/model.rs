// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{collections::BTreeMap, sync::LazyLock};

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    cl::{Change, LabelState, MultiPart, PresubmitTestType},
    errors::ChangeRecordError,
};

/// Every JSON response from Gerrit is prefixed with this line to defeat cross-site script inclusion.
pub const XSSI_PREFIX: &str = ")]}'";

static MULTI_PART_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^MultiPart:\s*(?<index>-?\d+)\s*/\s*(?<total>-?\d+)\s*$")
        .expect("MultiPart pattern")
});
static AUTO_SUBMIT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^AutoSubmit\s*$").expect("AutoSubmit pattern"));
static PRESUBMIT_NONE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^PresubmitTest:\s*none\s*$").expect("PresubmitTest pattern")
});

/// The subset of Gerrit's `ChangeInfo` entity used here.
#[derive(Debug, Deserialize)]
pub struct ChangeInfo {
    pub project: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(rename = "_number")]
    pub number: u64,
    #[serde(default)]
    pub owner: AccountInfo,
    #[serde(default)]
    pub labels: BTreeMap<String, LabelInfo>,
    #[serde(default)]
    pub current_revision: Option<String>,
    #[serde(default)]
    pub revisions: BTreeMap<String, RevisionInfo>,
    /// Set on the last record of a page when more results are available.
    #[serde(default, rename = "_more_changes")]
    pub more_changes: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct AccountInfo {
    #[serde(default)]
    pub email: Option<String>,
}

/// Gerrit reports the decisive votes on a label as the presence of `approved` / `rejected` account objects.
#[derive(Debug, Deserialize, Default)]
pub struct LabelInfo {
    #[serde(default)]
    pub approved: Option<Value>,
    #[serde(default)]
    pub rejected: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RevisionInfo {
    #[serde(rename = "_number")]
    pub number: u64,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub commit: Option<CommitInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CommitInfo {
    #[serde(default)]
    pub message: String,
}

/// Body of `POST /changes/<id>/revisions/<rev>/review`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReviewInput {
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, i8>,
}

impl LabelInfo {
    /// A rejection outweighs an approval.
    #[must_use]
    pub fn state(&self) -> LabelState {
        if self.rejected.is_some() {
            LabelState::Rejected
        } else if self.approved.is_some() {
            LabelState::Approved
        } else {
            LabelState::Neutral
        }
    }
}

/// Commit-message metadata recognized by presubmit.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommitFooter {
    pub multi_part: Option<(i32, i32)>,
    pub auto_submit: bool,
    pub presubmit: PresubmitTestType,
}

#[must_use]
pub fn parse_commit_message(message: &str) -> CommitFooter {
    let multi_part = MULTI_PART_LINE.captures(message).and_then(|captures| {
        let index = captures["index"].parse().ok()?;
        let total = captures["total"].parse().ok()?;
        Some((index, total))
    });
    CommitFooter {
        multi_part,
        auto_submit: AUTO_SUBMIT_LINE.is_match(message),
        presubmit: if PRESUBMIT_NONE_LINE.is_match(message) {
            PresubmitTestType::None
        } else {
            PresubmitTestType::All
        },
    }
}

impl ChangeInfo {
    /// Converts the record into a [`Change`] at its current patchset.
    ///
    /// A `MultiPart:` line on a change without a topic can't be grouped with anything; the descriptor is dropped and
    /// the change is treated as a single change.
    pub fn into_change(self) -> Result<Change, ChangeRecordError> {
        let missing = || ChangeRecordError::MissingCurrentRevision {
            change_number: self.number,
        };
        let revision = self.current_revision.clone().ok_or_else(missing)?;
        let current = self.revisions.get(&revision).ok_or_else(missing)?;
        let footer = current
            .commit
            .as_ref()
            .map(|commit| parse_commit_message(&commit.message))
            .unwrap_or_default();

        let topic = self.topic.filter(|t| !t.is_empty());
        let multi_part = match (footer.multi_part, topic) {
            (Some((index, total)), Some(topic)) => Some(MultiPart {
                topic,
                index,
                total,
            }),
            (Some((index, total)), None) => {
                warn!(
                    "change {} declares MultiPart {index}/{total} but has no topic; treating it as a single change",
                    self.number
                );
                None
            }
            (None, _) => None,
        };

        Ok(Change {
            reference: current.reference.clone(),
            project: self.project,
            owner_email: self.owner.email.unwrap_or_default(),
            revision,
            labels: self
                .labels
                .iter()
                .map(|(name, info)| (name.clone(), info.state()))
                .collect(),
            multi_part,
            auto_submit: footer.auto_submit,
            presubmit: footer.presubmit,
        })
    }
}

/// Strips the XSSI guard line, if present, and decodes the JSON that follows.
pub fn decode_gerrit_json<T: serde::de::DeserializeOwned>(body: &str) -> serde_json::Result<T> {
    let body = body.strip_prefix(XSSI_PREFIX).unwrap_or(body);
    serde_json::from_str(body.trim_start())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use crate::cl::{LabelState, PresubmitTestType};
    use crate::errors::ChangeRecordError;

    use super::{ChangeInfo, CommitFooter, decode_gerrit_json, parse_commit_message};

    const RECORD: &str = r#")]}'
[
  {
    "id": "release.go.core~master~I8473b95934b5732ac55d26311a706c9c2bde9940",
    "project": "release.go.core",
    "branch": "master",
    "topic": "big-refactor",
    "_number": 1012,
    "owner": {"_account_id": 1000096, "name": "Alice", "email": "alice@google.com"},
    "labels": {
      "Code-Review": {"approved": {"_account_id": 1000097}},
      "Verified": {"approved": {"_account_id": 1000098}, "rejected": {"_account_id": 1000099}},
      "Presubmit-Ready": {}
    },
    "current_revision": "184ebe53805e102605d11f6b143486d15c23a09c",
    "revisions": {
      "184ebe53805e102605d11f6b143486d15c23a09c": {
        "_number": 2,
        "ref": "refs/changes/12/1012/2",
        "commit": {"message": "core: split the parser\n\nMultiPart: 1/2\nAutoSubmit\n\nChange-Id: I8473b95934b5732ac55d26311a706c9c2bde9940\n"}
      }
    },
    "_more_changes": true
  }
]"#;

    #[test]
    fn record_to_change() -> Result<()> {
        let mut records: Vec<ChangeInfo> = decode_gerrit_json(RECORD)?;
        let record = records.remove(0);
        assert!(record.more_changes);
        let change = record.into_change()?;

        assert_eq!(change.reference, "refs/changes/12/1012/2");
        assert_eq!(change.project, "release.go.core");
        assert_eq!(change.owner_email, "alice@google.com");
        assert_eq!(change.label("Code-Review"), Some(LabelState::Approved));
        assert_eq!(change.label("Verified"), Some(LabelState::Rejected));
        assert_eq!(change.label("Presubmit-Ready"), Some(LabelState::Neutral));
        let multi_part = change.multi_part.expect("multi-part");
        assert_eq!(multi_part.topic, "big-refactor");
        assert_eq!((multi_part.index, multi_part.total), (1, 2));
        assert!(change.auto_submit);
        assert_eq!(change.presubmit, PresubmitTestType::All);
        Ok(())
    }

    #[test]
    fn multi_part_without_topic_is_single() -> Result<()> {
        let body = RECORD.replace(r#""topic": "big-refactor","#, "");
        let mut records: Vec<ChangeInfo> = decode_gerrit_json(&body)?;
        let change = records.remove(0).into_change()?;
        assert!(change.multi_part.is_none());
        Ok(())
    }

    #[test]
    fn missing_current_revision() -> Result<()> {
        let record: ChangeInfo =
            decode_gerrit_json(r#"{"project": "p", "_number": 5, "revisions": {}}"#)?;
        assert_eq!(
            record.into_change(),
            Err(ChangeRecordError::MissingCurrentRevision { change_number: 5 })
        );
        Ok(())
    }

    #[test]
    fn commit_footers() {
        assert_eq!(parse_commit_message("fix a typo\n"), CommitFooter::default());
        assert_eq!(
            parse_commit_message("docs\n\nPresubmitTest: NONE\n").presubmit,
            PresubmitTestType::None
        );
        // Footers only count on a line of their own.
        let footer = parse_commit_message("mention AutoSubmit inline\nsee MultiPart: 1/2 above\n");
        assert!(!footer.auto_submit);
        assert_eq!(footer.multi_part, None);
        assert_eq!(
            parse_commit_message("MultiPart: 0/3").multi_part,
            Some((0, 3))
        );
    }
}
