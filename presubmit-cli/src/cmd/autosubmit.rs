// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use log::{error, info, warn};

use crate::{
    cl::{Change, ClList, cl_list_display, get_submittable_cls},
    config::Config,
    gerrit::GerritClient,
};

#[allow(async_fn_in_trait)]
pub trait Submitter {
    async fn submit(&self, change: &Change) -> Result<()>;
}

impl Submitter for &GerritClient {
    async fn submit(&self, change: &Change) -> Result<()> {
        GerritClient::submit(*self, change).await?;
        Ok(())
    }
}

/// Submits each group's changes in order.  A failed submission abandons the rest of its group but not the other
/// groups.  Returns the number of groups submitted completely.
pub async fn submit_cls<S: Submitter>(submitter: &S, groups: &[ClList]) -> usize {
    let mut submitted = 0;
    'groups: for group in groups {
        for change in group {
            if let Err(e) = submitter.submit(change).await {
                warn!(
                    "submitting {} failed, leaving the rest of [{}]: {e:#}",
                    change.display_name(),
                    cl_list_display(group)
                );
                continue 'groups;
            }
        }
        info!("submitted [{}]", cl_list_display(group));
        submitted += 1;
    }
    submitted
}

async fn run(config: &Config) -> Result<usize> {
    let gerrit = GerritClient::new(config.gerrit_url.clone(), config.gerrit_credentials())?;
    let open = gerrit
        .query_open_changes()
        .await
        .context("querying open changes")?;
    let groups = get_submittable_cls(&open);
    info!(
        "{} of {} open changes form {} submittable group(s)",
        groups.iter().map(Vec::len).sum::<usize>(),
        open.len(),
        groups.len()
    );
    Ok(submit_cls(&&gerrit, &groups).await)
}

#[allow(clippy::print_stdout)]
pub async fn cli(config: &Config) -> ExitCode {
    match run(config).await {
        Ok(submitted) => {
            println!("{submitted} CL set(s) submitted");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("auto-submit failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
