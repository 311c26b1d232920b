// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::Deserialize;
use serde_json::Value;

pub const REFS_PARAMETER: &str = "REFS";
pub const REPOS_PARAMETER: &str = "REPOS";
pub const TESTS_PARAMETER: &str = "TESTS";

/// Response of `/queue/api/json`.
#[derive(Debug, Deserialize, Default)]
pub struct QueueListing {
    #[serde(default)]
    pub items: Vec<QueueItem>,
}

#[derive(Debug, Deserialize)]
pub struct QueueItem {
    pub id: u64,
    /// Older Jenkins releases flatten build parameters into `"\nNAME=value\nNAME=value"`.
    #[serde(default)]
    pub params: Option<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub task: Option<Task>,
}

#[derive(Debug, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub name: String,
}

/// Response of `/job/<job>/api/json?tree=builds[number,building,actions[parameters[name,value]]]`.
#[derive(Debug, Deserialize, Default)]
pub struct BuildListing {
    #[serde(default)]
    pub builds: Vec<BuildItem>,
}

#[derive(Debug, Deserialize)]
pub struct BuildItem {
    pub number: u64,
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Most actions carry nothing we need; the ones with build parameters have a `parameters` array.
#[derive(Debug, Deserialize, Default)]
pub struct Action {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

fn parameter_from_actions(actions: &[Action], name: &str) -> Option<String> {
    actions
        .iter()
        .flat_map(|action| action.parameters.iter())
        .find(|p| p.name == name)
        .and_then(|p| p.value.as_str().map(String::from))
}

impl QueueItem {
    #[must_use]
    pub fn task_name(&self) -> Option<&str> {
        self.task.as_ref().map(|t| t.name.as_str())
    }

    /// Looks up a build parameter in either the flattened `params` string or the structured actions.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<String> {
        if let Some(params) = &self.params {
            let found = params.lines().find_map(|line| {
                let (key, value) = line.split_once('=')?;
                (key.trim() == name).then(|| String::from(value.trim()))
            });
            if found.is_some() {
                return found;
            }
        }
        parameter_from_actions(&self.actions, name)
    }
}

impl BuildItem {
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<String> {
        parameter_from_actions(&self.actions, name)
    }
}

/// Final state of a completed build, from `/job/<job>/<n>/api/json`.
#[derive(Debug, Deserialize)]
pub struct BuildStatus {
    pub number: u64,
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl BuildStatus {
    #[must_use]
    pub fn succeeded(&self) -> Option<bool> {
        match self.result.as_deref() {
            Some("SUCCESS") => Some(true),
            Some("FAILURE" | "UNSTABLE" | "ABORTED") => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::{BuildListing, BuildStatus, QueueListing, REFS_PARAMETER, REPOS_PARAMETER};

    #[test]
    fn queue_item_flattened_params() -> Result<()> {
        let listing: QueueListing = serde_json::from_str(
            r#"{"items": [{
                "id": 10,
                "params": "\nREFS=refs/changes/12/1012/2:refs/changes/13/1013/1\nREPOS=release.go.core",
                "task": {"name": "presubmit-test"}
            }]}"#,
        )?;
        let item = &listing.items[0];
        assert_eq!(item.task_name(), Some("presubmit-test"));
        assert_eq!(
            item.parameter(REFS_PARAMETER).as_deref(),
            Some("refs/changes/12/1012/2:refs/changes/13/1013/1")
        );
        assert_eq!(
            item.parameter(REPOS_PARAMETER).as_deref(),
            Some("release.go.core")
        );
        assert_eq!(item.parameter("MISSING"), None);
        Ok(())
    }

    #[test]
    fn queue_item_structured_parameters() -> Result<()> {
        let listing: QueueListing = serde_json::from_str(
            r#"{"items": [{
                "id": 11,
                "actions": [
                    {"_class": "hudson.model.CauseAction", "causes": []},
                    {"parameters": [
                        {"name": "DRY_RUN", "value": false},
                        {"name": "REFS", "value": "refs/changes/12/1012/2"}
                    ]}
                ],
                "task": {"name": "presubmit-test"}
            }]}"#,
        )?;
        assert_eq!(
            listing.items[0].parameter(REFS_PARAMETER).as_deref(),
            Some("refs/changes/12/1012/2")
        );
        assert_eq!(listing.items[0].parameter("DRY_RUN"), None);
        Ok(())
    }

    #[test]
    fn build_listing() -> Result<()> {
        let listing: BuildListing = serde_json::from_str(
            r#"{"builds": [
                {"number": 7, "building": true, "actions": [{"parameters": [{"name": "REFS", "value": "refs/changes/12/1012/2"}]}]},
                {"number": 6, "building": false, "actions": [{}]}
            ]}"#,
        )?;
        assert_eq!(listing.builds.len(), 2);
        assert!(listing.builds[0].building);
        assert_eq!(
            listing.builds[0].parameter(REFS_PARAMETER).as_deref(),
            Some("refs/changes/12/1012/2")
        );
        assert_eq!(listing.builds[1].parameter(REFS_PARAMETER), None);
        Ok(())
    }

    #[test]
    fn build_status_result() -> Result<()> {
        let status: BuildStatus =
            serde_json::from_str(r#"{"number": 3, "building": false, "result": "UNSTABLE"}"#)?;
        assert_eq!(status.succeeded(), Some(false));
        let status: BuildStatus = serde_json::from_str(r#"{"number": 4, "result": null}"#)?;
        assert_eq!(status.succeeded(), None);
        Ok(())
    }
}
