// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::Result;
use log::{debug, info, warn};

use crate::{
    cl::{Change, ClNumberToPatchsetMap},
    dispatch::{OutdatedBuildRemover, PresubmitBuildAdder},
};

pub mod client;
pub mod model;
pub mod outdated;
pub mod report;

pub use client::JenkinsClient;
pub use model::{REFS_PARAMETER, REPOS_PARAMETER, TESTS_PARAMETER};
pub use outdated::{
    OUTDATED_BOUNDARY, PatchsetBoundary, is_build_outdated, ongoing_outdated_build,
    queued_outdated_builds,
};
pub use report::TestReport;

/// Multi-valued build parameters are passed to Jenkins colon-separated.
#[must_use]
pub fn join_parameter<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(":")
}

#[must_use]
pub fn split_parameter(value: &str) -> Vec<String> {
    value
        .split(':')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// Cancels queued and running presubmit builds superseded by newer patchsets.
pub struct JenkinsBuildRemover<'a> {
    client: &'a JenkinsClient,
    job: &'a str,
}

impl<'a> JenkinsBuildRemover<'a> {
    #[must_use]
    pub fn new(client: &'a JenkinsClient, job: &'a str) -> Self {
        JenkinsBuildRemover { client, job }
    }
}

impl OutdatedBuildRemover for JenkinsBuildRemover<'_> {
    async fn remove_outdated_builds(&self, cl_patchsets: &ClNumberToPatchsetMap) -> Result<()> {
        let queue = self.client.queued_items().await?;
        for id in queued_outdated_builds(&queue, self.job, cl_patchsets, OUTDATED_BOUNDARY) {
            info!("cancelling outdated queued build {id}");
            // One stubborn item shouldn't keep the rest of the stale queue alive.
            if let Err(e) = self.client.cancel_queued_item(id).await {
                warn!("cancelling queued build {id} failed: {e}");
            }
        }

        let builds = self.client.ongoing_builds(self.job).await?;
        if let Some(number) = ongoing_outdated_build(&builds, cl_patchsets, OUTDATED_BOUNDARY) {
            info!("stopping outdated build {} #{number}", self.job);
            self.client.stop_build(self.job, number).await?;
        }
        Ok(())
    }
}

/// Queues one presubmit build per unit of work.
pub struct JenkinsBuildAdder<'a> {
    client: &'a JenkinsClient,
    job: &'a str,
}

impl<'a> JenkinsBuildAdder<'a> {
    #[must_use]
    pub fn new(client: &'a JenkinsClient, job: &'a str) -> Self {
        JenkinsBuildAdder { client, job }
    }
}

impl PresubmitBuildAdder for JenkinsBuildAdder<'_> {
    async fn add_presubmit_test_build(
        &self,
        cls: &[Change],
        projects: &[String],
        tests: &[String],
    ) -> Result<()> {
        // REPOS runs parallel to REFS so that the test run knows which checkout each ref belongs in.
        let refs: Vec<&str> = cls.iter().map(|c| c.reference.as_str()).collect();
        let repos: Vec<&str> = cls.iter().map(|c| c.project.as_str()).collect();
        debug!("queueing {} for projects {projects:?}", refs.join(", "));
        let refs = join_parameter(&refs);
        let repos = join_parameter(&repos);
        let tests = join_parameter(tests);
        self.client
            .build_with_parameters(
                self.job,
                &[
                    (REFS_PARAMETER, refs.as_str()),
                    (REPOS_PARAMETER, repos.as_str()),
                    (TESTS_PARAMETER, tests.as_str()),
                ],
            )
            .await?;
        Ok(())
    }
}
