// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

/// A single test case result, independent of which report format it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestCase {
    pub class_name: String,
    pub name: String,
    pub status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestCase {
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.class_name.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.class_name, self.name)
        }
    }
}

// A JUnit document is rooted either at <testsuites> (holding <testsuite> children) or directly at a single
// <testsuite> (holding <testcase> children).  Both deserialize into the same raw element; `RawReport::shape` tells
// them apart.
#[derive(Debug, Deserialize, Default)]
struct RawSuite {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "testsuite", default)]
    testsuite: Vec<RawSuite>,
    #[serde(rename = "testcase", default)]
    testcase: Vec<RawCase>,
}

#[derive(Debug, Deserialize)]
struct RawCase {
    #[serde(rename = "@classname", default)]
    classname: String,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "failure", default)]
    failure: Vec<RawProblem>,
    #[serde(rename = "error", default)]
    error: Vec<RawProblem>,
    #[serde(rename = "skipped", default)]
    skipped: Vec<RawProblem>,
}

#[derive(Debug, Deserialize, Default)]
struct RawProblem {
    #[serde(rename = "@message", default)]
    message: Option<String>,
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

impl RawProblem {
    fn into_message(self) -> Option<String> {
        let non_empty = |s: String| {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| String::from(trimmed))
        };
        self.message
            .and_then(non_empty)
            .or_else(|| self.text.and_then(non_empty))
    }
}

enum ReportShape {
    Suites(Vec<RawSuite>),
    SingleSuite(RawSuite),
}

impl RawSuite {
    fn shape(self) -> ReportShape {
        if self.testcase.is_empty() && !self.testsuite.is_empty() {
            ReportShape::Suites(self.testsuite)
        } else {
            ReportShape::SingleSuite(self)
        }
    }

    fn collect_cases(self, out: &mut Vec<TestCase>) {
        for case in self.testcase {
            out.push(case.normalize());
        }
        for child in self.testsuite {
            child.collect_cases(out);
        }
    }
}

impl RawCase {
    fn normalize(self) -> TestCase {
        let (status, problem) = if let Some(problem) = self
            .failure
            .into_iter()
            .chain(self.error)
            .next()
        {
            (CaseStatus::Failed, Some(problem))
        } else if let Some(problem) = self.skipped.into_iter().next() {
            (CaseStatus::Skipped, Some(problem))
        } else {
            (CaseStatus::Passed, None)
        };
        TestCase {
            class_name: self.classname,
            name: self.name,
            status,
            message: problem.and_then(RawProblem::into_message),
        }
    }
}

/// Parses a JUnit/xUnit XML report into its test cases, in document order.
pub fn parse_junit(xml: &str) -> Result<Vec<TestCase>, quick_xml::DeError> {
    let root: RawSuite = quick_xml::de::from_str(xml)?;
    let mut cases = Vec::new();
    match root.shape() {
        ReportShape::Suites(suites) => {
            for suite in suites {
                log::trace!("junit suite {:?}", suite.name);
                suite.collect_cases(&mut cases);
            }
        }
        ReportShape::SingleSuite(suite) => suite.collect_cases(&mut cases),
    }
    Ok(cases)
}
