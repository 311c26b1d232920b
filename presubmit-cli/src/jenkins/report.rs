// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::Deserialize;

use crate::junit::{CaseStatus, TestCase};

/// Response of `/job/<job>/<n>/testReport/api/json`.
///
/// A freestyle build reports its suites directly; a matrix or multi-configuration build aggregates one report per
/// child build.  The two shapes are told apart once, here, and callers only ever see [`TestReport::cases`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TestReport {
    Suites {
        suites: Vec<Suite>,
    },
    #[serde(rename_all = "camelCase")]
    Aggregated {
        child_reports: Vec<ChildReport>,
    },
}

#[derive(Debug, Deserialize)]
pub struct ChildReport {
    #[serde(default)]
    pub child: Option<ChildBuild>,
    pub result: ChildResult,
}

#[derive(Debug, Deserialize)]
pub struct ChildBuild {
    pub number: u64,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChildResult {
    #[serde(default)]
    pub suites: Vec<Suite>,
}

#[derive(Debug, Deserialize)]
pub struct Suite {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    #[serde(default)]
    pub class_name: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub error_details: Option<String>,
}

impl Case {
    fn normalize(&self) -> TestCase {
        let status = match self.status.as_str() {
            "FAILED" | "REGRESSION" => CaseStatus::Failed,
            "SKIPPED" => CaseStatus::Skipped,
            // PASSED, FIXED
            _ => CaseStatus::Passed,
        };
        TestCase {
            class_name: self.class_name.clone(),
            name: self.name.clone(),
            status,
            message: self.error_details.clone(),
        }
    }
}

impl TestReport {
    /// Every case in the report, in report order, whichever shape the report has.
    #[must_use]
    pub fn cases(&self) -> Vec<TestCase> {
        let suites: Box<dyn Iterator<Item = &Suite>> = match self {
            TestReport::Suites { suites } => Box::new(suites.iter()),
            TestReport::Aggregated { child_reports } => Box::new(
                child_reports
                    .iter()
                    .flat_map(|child| child.result.suites.iter()),
            ),
        };
        suites
            .flat_map(|suite| suite.cases.iter())
            .map(Case::normalize)
            .collect()
    }

    /// Cases that failed or regressed.
    #[must_use]
    pub fn failed_cases(&self) -> Vec<TestCase> {
        self.cases()
            .into_iter()
            .filter(|case| case.status == CaseStatus::Failed)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use crate::junit::CaseStatus;

    use super::TestReport;

    #[test]
    fn direct_suites() -> Result<()> {
        let report: TestReport = serde_json::from_str(
            r#"{
                "duration": 1.5, "failCount": 1, "passCount": 2, "skipCount": 0,
                "suites": [{
                    "name": "v.io/x/ref",
                    "cases": [
                        {"className": "v.io/x/ref", "name": "TestA", "status": "PASSED"},
                        {"className": "v.io/x/ref", "name": "TestB", "status": "REGRESSION", "errorDetails": "boom"},
                        {"className": "v.io/x/ref", "name": "TestC", "status": "FIXED"}
                    ]
                }]
            }"#,
        )?;
        let cases = report.cases();
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[1].status, CaseStatus::Failed);
        assert_eq!(cases[1].message.as_deref(), Some("boom"));
        assert_eq!(cases[2].status, CaseStatus::Passed);

        let failed = report.failed_cases();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].full_name(), "v.io/x/ref.TestB");
        Ok(())
    }

    #[test]
    fn child_reports() -> Result<()> {
        let report: TestReport = serde_json::from_str(
            r#"{
                "childReports": [
                    {
                        "child": {"number": 41, "url": "https://jenkins.example.com/job/presubmit-test/OS=linux/41/"},
                        "result": {"suites": [{"cases": [
                            {"className": "a", "name": "TestOne", "status": "FAILED"}
                        ]}]}
                    },
                    {
                        "child": {"number": 41, "url": "https://jenkins.example.com/job/presubmit-test/OS=darwin/41/"},
                        "result": {"suites": [{"cases": [
                            {"className": "a", "name": "TestOne", "status": "FAILED"},
                            {"className": "a", "name": "TestTwo", "status": "SKIPPED"}
                        ]}]}
                    }
                ]
            }"#,
        )?;
        assert!(matches!(report, TestReport::Aggregated { .. }));
        let cases = report.cases();
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[2].status, CaseStatus::Skipped);
        assert_eq!(report.failed_cases().len(), 2);
        Ok(())
    }

    #[test]
    fn neither_shape_is_an_error() {
        assert!(serde_json::from_str::<TestReport>(r#"{"failCount": 0}"#).is_err());
    }
}
