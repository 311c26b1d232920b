// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;

use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{
    ApiDetailedError, ApiError, Credentials, ResultWithContext as _, build_client, expect_success,
    join_segments, with_auth,
};

use super::{
    model::{BuildListing, BuildStatus, QueueListing},
    report::TestReport,
};

const BUILD_LISTING_TREE: &str = "builds[number,building,actions[parameters[name,value]]]";

/// Thin client over the handful of Jenkins remote API endpoints presubmit needs.
pub struct JenkinsClient {
    base_url: Url,
    credentials: Option<Credentials>,
    client: Client,
}

impl JenkinsClient {
    pub fn new(base_url: Url, credentials: Option<Credentials>) -> Result<Self, ApiError> {
        Ok(JenkinsClient {
            base_url,
            credentials,
            client: build_client(Duration::from_secs(30))?,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiDetailedError> {
        join_segments(&self.base_url, segments)
    }

    /// Browser URL of build `number` of `job`.
    pub fn build_url(&self, job: &str, number: u64) -> Result<Url, ApiDetailedError> {
        let mut url = self.url(&["job", job, &number.to_string()])?;
        // Jenkins links builds with a trailing slash.
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidConfiguration(String::from("cannot-be-a-base URL")))?
            .push("");
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, ApiDetailedError> {
        debug!("HTTP request GET {url}");
        let request = with_auth(self.client.get(url), self.credentials.as_ref())
            .build()
            .context(&format!("building request for {what}"))?;
        let response = self
            .client
            .execute(request)
            .await
            .context(&format!("sending request for {what}"))?;
        debug!("HTTP response: {response:?}");
        let response = expect_success(response).context(&format!("reading response for {what}"))?;
        let body = response
            .text()
            .await
            .context(&format!("reading response body for {what}"))?;
        serde_json::from_str(&body).context(&format!("parsing response body for {what}"))
    }

    async fn post(
        &self,
        url: Url,
        form: &[(&str, &str)],
        what: &str,
    ) -> Result<reqwest::Response, ApiDetailedError> {
        debug!("HTTP request POST {url}");
        let request = with_auth(self.client.post(url), self.credentials.as_ref())
            .form(form)
            .build()
            .context(&format!("building request for {what}"))?;
        let response = self
            .client
            .execute(request)
            .await
            .context(&format!("sending request for {what}"))?;
        debug!("HTTP response: {response:?}");
        Ok(response)
    }

    pub async fn queued_items(&self) -> Result<QueueListing, ApiDetailedError> {
        let url = self.url(&["queue", "api", "json"])?;
        self.get_json(url, "queue listing").await
    }

    pub async fn ongoing_builds(&self, job: &str) -> Result<BuildListing, ApiDetailedError> {
        let mut url = self.url(&["job", job, "api", "json"])?;
        url.query_pairs_mut().append_pair("tree", BUILD_LISTING_TREE);
        self.get_json(url, "build listing").await
    }

    pub async fn cancel_queued_item(&self, id: u64) -> Result<(), ApiDetailedError> {
        let mut url = self.url(&["queue", "cancelItem"])?;
        url.query_pairs_mut().append_pair("id", &id.to_string());
        let response = self.post(url, &[], "cancelling queue item").await?;
        // Older releases answer a successful cancel with a 404 redirect target.
        if response.status() == StatusCode::NOT_FOUND {
            debug!("queue item {id} already gone");
            return Ok(());
        }
        expect_success(response).context("cancelling queue item")?;
        Ok(())
    }

    pub async fn stop_build(&self, job: &str, number: u64) -> Result<(), ApiDetailedError> {
        let url = self.url(&["job", job, &number.to_string(), "stop"])?;
        let response = self.post(url, &[], "stopping build").await?;
        expect_success(response).context("stopping build")?;
        Ok(())
    }

    /// Queues a parameterized build of `job`.
    pub async fn build_with_parameters(
        &self,
        job: &str,
        parameters: &[(&str, &str)],
    ) -> Result<(), ApiDetailedError> {
        let url = self.url(&["job", job, "buildWithParameters"])?;
        let response = self.post(url, parameters, "triggering build").await?;
        expect_success(response).context("triggering build")?;
        Ok(())
    }

    pub async fn last_completed_build(&self, job: &str) -> Result<Option<BuildStatus>, ApiDetailedError> {
        let url = self.url(&["job", job, "lastCompletedBuild", "api", "json"])?;
        match self.get_json(url, "last completed build").await {
            Ok(status) => Ok(Some(status)),
            // A job that never completed a build has no lastCompletedBuild.
            Err(ApiDetailedError {
                error: ApiError::UnexpectedStatus(status),
                ..
            }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn test_report(&self, job: &str, number: u64) -> Result<TestReport, ApiDetailedError> {
        let url = self.url(&["job", job, &number.to_string(), "testReport", "api", "json"])?;
        self.get_json(url, "test report").await
    }
}
