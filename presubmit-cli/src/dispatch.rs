// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::Result;
use log::{info, warn};

use crate::{
    cl::{Change, ClList, ClNumberToPatchsetMap, PresubmitTestType, cl_list_display, patchset_map},
    config::Config,
    errors::DispatchError,
};

/// Cancels CI builds made stale by the patchsets in a new unit of work.
#[allow(async_fn_in_trait)] // should be fine to the extent that this is only used internally to this project
pub trait OutdatedBuildRemover {
    async fn remove_outdated_builds(&self, cl_patchsets: &ClNumberToPatchsetMap) -> Result<()>;
}

/// Triggers a presubmit build for one unit of work.
#[allow(async_fn_in_trait)]
pub trait PresubmitBuildAdder {
    async fn add_presubmit_test_build(
        &self,
        cls: &[Change],
        projects: &[String],
        tests: &[String],
    ) -> Result<()>;
}

/// Posts a comment on a change's review thread.
#[allow(async_fn_in_trait)]
pub trait MessagePoster {
    async fn post_message(&self, change: &Change, message: &str) -> Result<()>;
}

/// Outcome of one dispatch cycle: the audit lines, in the order they were produced, and how many units of work were
/// handed to CI.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub lines: Vec<String>,
    pub dispatched: usize,
}

impl DispatchReport {
    fn line(&mut self, line: String) {
        info!("{line}");
        self.lines.push(line);
    }
}

/// Sends new units of work to presubmit testing, one at a time and in order.
///
/// A failure on one unit never prevents the following units from being processed.
pub struct ClsSender<'a, R, A, P> {
    config: &'a Config,
    remover: R,
    adder: A,
    poster: P,
}

impl<'a, R, A, P> ClsSender<'a, R, A, P>
where
    R: OutdatedBuildRemover,
    A: PresubmitBuildAdder,
    P: MessagePoster,
{
    pub fn new(config: &'a Config, remover: R, adder: A, poster: P) -> Self {
        ClsSender {
            config,
            remover,
            adder,
            poster,
        }
    }

    pub async fn send_cls(&self, cl_lists: &[ClList]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for cls in cl_lists {
            self.send_cl_list(cls, &mut report).await;
        }
        info!(
            "dispatched {} of {} new CL sets",
            report.dispatched,
            cl_lists.len()
        );
        report
    }

    async fn send_cl_list(&self, cls: &[Change], report: &mut DispatchReport) {
        let names = cl_list_display(cls);

        if cls.iter().any(|c| c.presubmit == PresubmitTestType::None) {
            report.line(format!("SKIP: Add {names} (presubmit=none)"));
            return;
        }
        if cls.iter().any(|c| !self.config.owner_allowed(&c.owner_email)) {
            report.line(format!("SKIP: Add {names} (non-google owner)"));
            return;
        }

        let mut resolved = Vec::with_capacity(cls.len());
        for change in cls {
            if self.project_known(change) {
                resolved.push(change.clone());
            } else {
                report.line(
                    DispatchError::ProjectNotFound {
                        project: change.project.clone(),
                        reference: change.reference.clone(),
                    }
                    .to_string(),
                );
            }
        }
        if resolved.is_empty() {
            report.line(String::from("SKIP: Empty CL set"));
            return;
        }
        let names = cl_list_display(&resolved);

        if let Err(e) = self
            .remover
            .remove_outdated_builds(&patchset_map(&resolved))
            .await
        {
            warn!("removeOutdatedBuilds failed for {names}: {e:#}");
        }

        let mut projects: Vec<String> = Vec::new();
        for change in &resolved {
            if !projects.contains(&change.project) {
                projects.push(change.project.clone());
            }
        }
        let tests = self
            .config
            .tests_for_projects(projects.iter().map(String::as_str));
        if tests.is_empty() {
            warn!("no tests configured for projects {projects:?}");
        }

        match self
            .adder
            .add_presubmit_test_build(&resolved, &projects, &tests)
            .await
        {
            Ok(()) => {
                report.line(format!("PASS: Add {names}"));
                report.dispatched += 1;
                let message = format!("Presubmit tests queued: {}", tests.join(", "));
                for change in &resolved {
                    if let Err(e) = self.poster.post_message(change, &message).await {
                        warn!("posting to {} failed: {e:#}", change.reference);
                    }
                }
            }
            Err(e) => {
                report.line(format!("FAIL: Add {names}"));
                report.line(DispatchError::DispatchFailure(format!("{e:#}")).to_string());
            }
        }
    }

    fn project_known(&self, change: &Change) -> bool {
        self.config.project_checkout(&change.project).is_some()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{cell::RefCell, collections::VecDeque};

    use anyhow::{Result, anyhow};

    use crate::cl::{Change, ClNumberToPatchsetMap, cl_list_display};

    use super::{MessagePoster, OutdatedBuildRemover, PresubmitBuildAdder};

    #[derive(Default)]
    pub struct RecordingRemover {
        pub calls: RefCell<Vec<ClNumberToPatchsetMap>>,
        pub fail: bool,
    }

    impl OutdatedBuildRemover for &RecordingRemover {
        async fn remove_outdated_builds(&self, cl_patchsets: &ClNumberToPatchsetMap) -> Result<()> {
            self.calls.borrow_mut().push(cl_patchsets.clone());
            if self.fail {
                Err(anyhow!("jenkins unavailable"))
            } else {
                Ok(())
            }
        }
    }

    /// Pops one outcome per call; succeeds once the queue is empty.
    #[derive(Default)]
    pub struct ScriptedAdder {
        pub outcomes: RefCell<VecDeque<Result<()>>>,
        pub calls: RefCell<Vec<(String, Vec<String>, Vec<String>)>>,
    }

    impl ScriptedAdder {
        pub fn failing_first() -> Self {
            let adder = ScriptedAdder::default();
            adder
                .outcomes
                .borrow_mut()
                .push_back(Err(anyhow!("HTTP 500")));
            adder
        }
    }

    impl PresubmitBuildAdder for &ScriptedAdder {
        async fn add_presubmit_test_build(
            &self,
            cls: &[Change],
            projects: &[String],
            tests: &[String],
        ) -> Result<()> {
            self.calls.borrow_mut().push((
                cl_list_display(cls),
                projects.to_vec(),
                tests.to_vec(),
            ));
            self.outcomes.borrow_mut().pop_front().unwrap_or(Ok(()))
        }
    }

    #[derive(Default)]
    pub struct RecordingPoster {
        pub messages: RefCell<Vec<(String, String)>>,
    }

    impl MessagePoster for &RecordingPoster {
        async fn post_message(&self, change: &Change, message: &str) -> Result<()> {
            self.messages
                .borrow_mut()
                .push((change.display_name(), String::from(message)));
            Ok(())
        }
    }
}
