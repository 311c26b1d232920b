// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Write as _,
};

use crate::test_status::{StatusFile, TestResult, TestStatus};

const PASS_GLYPH: &str = "✔";
const FAIL_GLYPH: &str = "✖";
const UNKNOWN_GLYPH: &str = "?";

/// Everything that goes into the summary posted on each change of a presubmit run.
pub struct ResultSummary<'a> {
    pub refs: &'a [String],
    pub results: &'a StatusFile,
    /// Whether each test passed on its last completed build; absent or `None` when unknown.
    pub before: &'a BTreeMap<String, Option<bool>>,
    /// Failing test case names, in report order; repeats are allowed.
    pub failed_cases: &'a [String],
    pub details_url: Option<&'a str>,
}

fn before_glyph(passed: Option<bool>) -> &'static str {
    match passed {
        Some(true) => PASS_GLYPH,
        Some(false) => FAIL_GLYPH,
        None => UNKNOWN_GLYPH,
    }
}

fn after_glyph(result: &TestResult) -> &'static str {
    match result.status {
        TestStatus::Passed => PASS_GLYPH,
        TestStatus::Failed | TestStatus::TimedOut => FAIL_GLYPH,
        TestStatus::MergeConflict | TestStatus::ToolsBuildFailure | TestStatus::Skipped => {
            UNKNOWN_GLYPH
        }
    }
}

/// Gives the second and later occurrences of a name a `(n)` suffix, counting in first-seen order.  A suffixed name
/// that is already taken, including by a name that literally carries that suffix, moves on to the next number.
#[must_use]
pub fn number_repeats(names: &[String]) -> Vec<String> {
    let mut next: HashMap<&str, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    names
        .iter()
        .map(|name| {
            let n = next.entry(name.as_str()).or_insert(1);
            let mut numbered = if *n == 1 {
                name.clone()
            } else {
                format!("{name} ({n})")
            };
            while taken.contains(&numbered) {
                *n += 1;
                numbered = format!("{name} ({n})");
            }
            *n += 1;
            taken.insert(numbered.clone());
            numbered
        })
        .collect()
}

/// The Verified vote for a run: +1 only when every test passed.
#[must_use]
pub fn verified_vote(results: &StatusFile) -> i8 {
    if !results.is_empty() && results.values().all(|r| r.status.is_pass()) {
        1
    } else {
        -1
    }
}

#[must_use]
pub fn compose_message(summary: &ResultSummary<'_>) -> String {
    let mut out = format!("Test results for \"{}\":\n\n", summary.refs.join(", "));

    if let Some(reference) = summary
        .results
        .values()
        .find_map(|r| r.merge_conflict_cl.as_deref())
    {
        let _ = writeln!(
            out,
            "Possible merge conflict detected in {reference}.\nPresubmit tests will be executed after a new patchset that resolves the conflicts is submitted."
        );
        return out;
    }
    if summary
        .results
        .values()
        .any(|r| r.status == TestStatus::ToolsBuildFailure)
    {
        let _ = writeln!(
            out,
            "Failed to build required tools.\nThis is likely caused by your changes; check the build log for details."
        );
        append_details(&mut out, summary.details_url);
        return out;
    }

    for (test, result) in summary.results {
        let before = before_glyph(summary.before.get(test).copied().flatten());
        let _ = write!(out, "[ {before} ➔ {} ] {test}", after_glyph(result));
        if let (TestStatus::TimedOut, Some(timeout)) = (result.status, result.timeout_value) {
            let _ = write!(out, " [TIMED OUT after {}s]", timeout.as_secs());
        }
        out.push('\n');
    }

    if !summary.failed_cases.is_empty() {
        out.push_str("\nFailed test cases:\n");
        for name in number_repeats(summary.failed_cases) {
            let _ = writeln!(out, "- {name}");
        }
    }
    append_details(&mut out, summary.details_url);
    out
}

fn append_details(out: &mut String, details_url: Option<&str>) {
    if let Some(url) = details_url {
        let _ = write!(out, "\nMore details at: {url}\n");
    }
}
