// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{collections::BTreeMap, fs, io::Write as _, path::Path, time::Duration};

use anyhow::{Context as _, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::util::{duration_to_seconds, seconds_to_duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Passed,
    Failed,
    TimedOut,
    MergeConflict,
    ToolsBuildFailure,
    Skipped,
}

impl TestStatus {
    #[must_use]
    pub fn is_pass(self) -> bool {
        matches!(self, TestStatus::Passed | TestStatus::Skipped)
    }
}

/// Outcome of one test in one presubmit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestResult {
    pub status: TestStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_seconds"
    )]
    pub timeout_value: Option<Duration>,
    /// Ref that failed to merge; only set for [`TestStatus::MergeConflict`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_conflict_cl: Option<String>,
    #[serde(
        default,
        serialize_with = "duration_to_seconds",
        deserialize_with = "seconds_to_duration"
    )]
    pub duration: Duration,
    /// Full names of the failing test cases, in report order.
    #[serde(default)]
    pub failed_cases: Vec<String>,
}

impl TestResult {
    #[must_use]
    pub fn new(status: TestStatus, duration: Duration) -> Self {
        TestResult {
            status,
            timeout_value: None,
            merge_conflict_cl: None,
            duration,
            failed_cases: Vec::new(),
        }
    }

    #[must_use]
    pub fn timed_out(timeout: Duration, duration: Duration) -> Self {
        TestResult {
            timeout_value: Some(timeout),
            ..TestResult::new(TestStatus::TimedOut, duration)
        }
    }

    #[must_use]
    pub fn merge_conflict(reference: &str) -> Self {
        TestResult {
            merge_conflict_cl: Some(String::from(reference)),
            ..TestResult::new(TestStatus::MergeConflict, Duration::ZERO)
        }
    }
}

/// Results keyed by test name; the map keeps the file's keys sorted.
pub type StatusFile = BTreeMap<String, TestResult>;

pub fn read_status_file(path: &Path) -> Result<StatusFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let status: StatusFile =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    debug!("read {} test results from {}", status.len(), path.display());
    Ok(status)
}

pub fn write_status_file(path: &Path, status: &StatusFile) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary status file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, status).context("serializing test status")?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

mod optional_seconds {
    use std::time::Duration;

    use serde::{Deserialize as _, Deserializer, Serializer};

    use crate::util::duration_to_seconds;

    #[allow(clippy::ref_option)] // signature required by serde's `with`
    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => duration_to_seconds(duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = Option::<f64>::deserialize(deserializer)?;
        seconds
            .map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
