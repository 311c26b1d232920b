// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{collections::BTreeMap, process::ExitCode};

use anyhow::{Context as _, Result};
use log::{debug, error, info, warn};

use crate::{
    cl::ChangeRef,
    config::Config,
    errors::PresubmitErrors,
    gerrit::GerritClient,
    jenkins::{JenkinsClient, split_parameter},
    message::{ResultSummary, compose_message, verified_vote},
    test_status::{StatusFile, read_status_file},
};

use super::cli::ResultOptions;

/// How each test fared on its own most recent completed build, before the changes under test.
async fn previous_outcomes(jenkins: &JenkinsClient, results: &StatusFile) -> BTreeMap<String, Option<bool>> {
    let mut before = BTreeMap::new();
    for test in results.keys() {
        let outcome = match jenkins.last_completed_build(test).await {
            Ok(build) => build.and_then(|b| b.succeeded()),
            Err(e) => {
                debug!("no previous outcome for {test}: {e}");
                None
            }
        };
        before.insert(test.clone(), outcome);
    }
    before
}

/// Failing test cases from the presubmit build's own test report, or from the status file when Jenkins has none.
async fn failed_cases(
    jenkins: &JenkinsClient,
    job: &str,
    build_number: Option<u64>,
    results: &StatusFile,
) -> Vec<String> {
    if let Some(number) = build_number {
        match jenkins.test_report(job, number).await {
            Ok(report) => {
                return report
                    .failed_cases()
                    .iter()
                    .map(|case| case.full_name())
                    .collect();
            }
            Err(e) => warn!("test report for {job} #{number} unavailable: {e}"),
        }
    }
    results
        .values()
        .flat_map(|result| result.failed_cases.iter().cloned())
        .collect()
}

/// Composes the summary of one presubmit run and posts it, with its Verified vote, on every ref of the run.  Returns
/// the number of refs that could not be updated.
pub async fn report_results(
    config: &Config,
    refs: &[String],
    results: &StatusFile,
    build_number: Option<u64>,
    jenkins: &JenkinsClient,
    gerrit: &GerritClient,
) -> Result<usize> {
    let change_refs = refs
        .iter()
        .map(|r| ChangeRef::parse(r))
        .collect::<Result<Vec<_>, _>>()?;

    let before = previous_outcomes(jenkins, results).await;
    let failed = failed_cases(jenkins, &config.presubmit_job, build_number, results).await;
    let details_url = match build_number {
        Some(number) => Some(jenkins.build_url(&config.presubmit_job, number)?.to_string()),
        None => None,
    };

    let message = compose_message(&ResultSummary {
        refs,
        results,
        before: &before,
        failed_cases: &failed,
        details_url: details_url.as_deref(),
    });
    let vote = verified_vote(results);
    info!("posting results with Verified {vote:+} on {}", refs.join(", "));

    let mut failures = 0;
    for change_ref in &change_refs {
        if let Err(e) = gerrit
            .post_review_on_patchset(change_ref, &message, Some(vote))
            .await
        {
            error!("failed to post results on {change_ref}: {e}");
            failures += 1;
        }
    }
    Ok(failures)
}

async fn run(config: &Config, options: &ResultOptions) -> Result<usize> {
    let refs = split_parameter(&options.run.refs);
    if refs.is_empty() {
        return Err(PresubmitErrors::MissingParameter("REFS").into());
    }
    let results = read_status_file(&options.run.status_file)
        .context("presubmit test results are unavailable")?;
    let jenkins = JenkinsClient::new(config.jenkins_url.clone(), config.jenkins_credentials())?;
    let gerrit = GerritClient::new(config.gerrit_url.clone(), config.gerrit_credentials())?;
    report_results(config, &refs, &results, options.build_number, &jenkins, &gerrit).await
}

pub async fn cli(config: &Config, options: &ResultOptions) -> ExitCode {
    match run(config, options).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            error!("{failures} change(s) could not be updated");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("reporting presubmit results failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use actix_test::TestServer;
    use actix_web::{App, HttpRequest, HttpResponse, Responder, web};
    use anyhow::Result;
    use url::Url;

    use crate::{
        config::test_support::sample,
        gerrit::GerritClient,
        jenkins::JenkinsClient,
        test_status::{StatusFile, TestResult, TestStatus},
    };

    use super::report_results;

    #[derive(Default)]
    struct Recorded(Mutex<Vec<(String, serde_json::Value)>>);

    async fn go_vet_last() -> impl Responder {
        HttpResponse::Ok().json(serde_json::json!({"number": 40, "result": "SUCCESS"}))
    }

    async fn go_core_last() -> impl Responder {
        HttpResponse::Ok().json(serde_json::json!({"number": 7, "result": "FAILURE"}))
    }

    async fn report() -> impl Responder {
        HttpResponse::Ok().json(serde_json::json!({
            "suites": [{
                "name": "pkg",
                "cases": [
                    {"className": "pkg", "name": "TestFoo", "status": "FAILED"},
                    {"className": "pkg", "name": "TestOk", "status": "PASSED"},
                    {"className": "pkg", "name": "TestFoo", "status": "REGRESSION"}
                ]
            }]
        }))
    }

    async fn review(data: web::Data<Recorded>, req: HttpRequest, body: String) -> impl Responder {
        let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
        data.0
            .lock()
            .unwrap()
            .push((req.path().to_string(), json));
        HttpResponse::Ok().body(")]}'\n{}")
    }

    // One server plays both Jenkins and Gerrit; unknown Jenkins jobs fall through to a 404.
    fn create_test_server(data: web::Data<Recorded>) -> TestServer {
        actix_test::start(move || {
            App::new()
                .app_data(data.clone())
                .route(
                    "/job/go-vet/lastCompletedBuild/api/json",
                    web::get().to(go_vet_last),
                )
                .route(
                    "/job/go-core-test/lastCompletedBuild/api/json",
                    web::get().to(go_core_last),
                )
                .route(
                    "/job/presubmit-test/12/testReport/api/json",
                    web::get().to(report),
                )
                .route(
                    "/changes/{number}/revisions/{revision}/review",
                    web::post().to(review),
                )
        })
    }

    fn results() -> StatusFile {
        let mut results = StatusFile::new();
        results.insert(
            String::from("go-core-test"),
            TestResult {
                failed_cases: vec![String::from("from.StatusFile")],
                ..TestResult::new(TestStatus::Failed, Duration::from_secs(3))
            },
        );
        results.insert(
            String::from("go-vet"),
            TestResult::new(TestStatus::Passed, Duration::from_secs(1)),
        );
        results.insert(
            String::from("js-core-test"),
            TestResult::new(TestStatus::Passed, Duration::from_secs(1)),
        );
        results
    }

    fn refs() -> Vec<String> {
        vec![
            String::from("refs/changes/00/1000/2"),
            String::from("refs/changes/01/1001/1"),
        ]
    }

    #[tokio::test]
    async fn posts_summary_on_every_ref() -> Result<()> {
        let data = web::Data::new(Recorded::default());
        let srv = create_test_server(data.clone());
        let base = Url::parse(&srv.url("/"))?;
        let jenkins = JenkinsClient::new(base.clone(), None)?;
        let gerrit = GerritClient::new(base.clone(), None)?;

        let failures =
            report_results(&sample(), &refs(), &results(), Some(12), &jenkins, &gerrit).await?;
        assert_eq!(failures, 0);

        let posted = data.0.lock().unwrap();
        let paths: Vec<&str> = posted.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/changes/1000/revisions/2/review",
                "/changes/1001/revisions/1/review"
            ]
        );
        let expected_message = format!(
            "Test results for \"refs/changes/00/1000/2, refs/changes/01/1001/1\":\n\
             \n\
             [ ✖ ➔ ✖ ] go-core-test\n\
             [ ✔ ➔ ✔ ] go-vet\n\
             [ ? ➔ ✔ ] js-core-test\n\
             \n\
             Failed test cases:\n\
             - pkg.TestFoo\n\
             - pkg.TestFoo (2)\n\
             \n\
             More details at: {base}job/presubmit-test/12/\n"
        );
        for (_, body) in posted.iter() {
            assert_eq!(body["message"], serde_json::Value::from(expected_message.as_str()));
            assert_eq!(body["labels"]["Verified"], serde_json::Value::from(-1));
        }
        Ok(())
    }

    #[tokio::test]
    async fn falls_back_to_status_file_cases() -> Result<()> {
        let data = web::Data::new(Recorded::default());
        let srv = create_test_server(data.clone());
        let base = Url::parse(&srv.url("/"))?;
        let jenkins = JenkinsClient::new(base.clone(), None)?;
        let gerrit = GerritClient::new(base, None)?;

        report_results(&sample(), &refs()[..1], &results(), None, &jenkins, &gerrit).await?;

        let posted = data.0.lock().unwrap();
        assert_eq!(posted.len(), 1);
        let message = posted[0].1["message"].as_str().unwrap_or_default();
        assert!(message.contains("- from.StatusFile\n"), "{message}");
        assert!(!message.contains("More details at"), "{message}");
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_gerrit_counts_failures() -> Result<()> {
        let data = web::Data::new(Recorded::default());
        let srv = create_test_server(data.clone());
        let jenkins = JenkinsClient::new(Url::parse(&srv.url("/"))?, None)?;
        // Nothing is routed under /gerrit/, so every review is rejected.
        let gerrit = GerritClient::new(Url::parse(&srv.url("/gerrit/"))?, None)?;

        let failures =
            report_results(&sample(), &refs(), &results(), Some(12), &jenkins, &gerrit).await?;
        assert_eq!(failures, 2);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_ref_is_an_error() -> Result<()> {
        let data = web::Data::new(Recorded::default());
        let srv = create_test_server(data.clone());
        let base = Url::parse(&srv.url("/"))?;
        let jenkins = JenkinsClient::new(base.clone(), None)?;
        let gerrit = GerritClient::new(base, None)?;

        let result = report_results(
            &sample(),
            &[String::from("refs/heads/master")],
            &results(),
            None,
            &jenkins,
            &gerrit,
        )
        .await;
        assert!(result.is_err());
        assert!(data.0.lock().unwrap().is_empty());
        Ok(())
    }
}
