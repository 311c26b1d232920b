// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use log::{error, info};

use crate::{
    cl::{Change, ClRefMap, new_open_cls},
    config::Config,
    dispatch::{ClsSender, DispatchReport, MessagePoster, OutdatedBuildRemover, PresubmitBuildAdder},
    gerrit::GerritClient,
    jenkins::{JenkinsBuildAdder, JenkinsBuildRemover, JenkinsClient},
    snapshot::{read_snapshot, write_snapshot},
};

#[allow(clippy::print_stdout)]
pub async fn cli(config: &Config) -> ExitCode {
    match poll(config).await {
        Ok(report) => {
            println!("{} new CL set(s) queued for presubmit testing", report.dispatched);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("poll cycle failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// One complete poll cycle against the live Gerrit and Jenkins servers.
pub async fn poll(config: &Config) -> Result<DispatchReport> {
    // Read first: an unreadable snapshot must fail the cycle before anything is dispatched.
    let previous = read_snapshot(&config.snapshot_path)?;

    let gerrit = GerritClient::new(config.gerrit_url.clone(), config.gerrit_credentials())?;
    let jenkins = JenkinsClient::new(config.jenkins_url.clone(), config.jenkins_credentials())?;
    let current = gerrit
        .query_open_changes()
        .await
        .context("querying open changes")?;

    let report = run_cycle(
        config,
        &previous,
        &current,
        JenkinsBuildRemover::new(&jenkins, &config.presubmit_job),
        JenkinsBuildAdder::new(&jenkins, &config.presubmit_job),
        &gerrit,
    )
    .await;

    write_snapshot(&config.snapshot_path, &current)?;
    Ok(report)
}

/// Dispatches the units of work that are new in `current` relative to `previous`.
pub async fn run_cycle<R, A, P>(
    config: &Config,
    previous: &ClRefMap,
    current: &[Change],
    remover: R,
    adder: A,
    poster: P,
) -> DispatchReport
where
    R: OutdatedBuildRemover,
    A: PresubmitBuildAdder,
    P: MessagePoster,
{
    let new_cls = new_open_cls(previous, current);
    info!(
        "{} open changes, {} previously seen, {} new CL set(s)",
        current.len(),
        previous.len(),
        new_cls.len()
    );
    ClsSender::new(config, remover, adder, poster)
        .send_cls(&new_cls)
        .await
}
