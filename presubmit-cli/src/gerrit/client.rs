// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{collections::BTreeMap, time::Duration};

use anyhow::Result;
use log::{debug, warn};
use reqwest::Client;
use url::Url;

use crate::{
    api::{
        ApiDetailedError, ApiError, Credentials, ResultWithContext as _, build_client,
        expect_success, join_segments, with_auth,
    },
    cl::{Change, ChangeRef, VERIFIED_LABEL},
    dispatch::MessagePoster,
};

use super::model::{ChangeInfo, ReviewInput, decode_gerrit_json};

const OPEN_CHANGES_QUERY: &str = "status:open";
const QUERY_OPTIONS: [&str; 4] = [
    "CURRENT_REVISION",
    "CURRENT_COMMIT",
    "LABELS",
    "DETAILED_ACCOUNTS",
];

/// The revision sha Gerrit knows the change by, or `current` when it is unknown.
fn revision_of(change: &Change) -> &str {
    if change.revision.is_empty() {
        "current"
    } else {
        change.revision.as_str()
    }
}

pub struct GerritClient {
    base_url: Url,
    credentials: Option<Credentials>,
    client: Client,
}

impl GerritClient {
    pub fn new(base_url: Url, credentials: Option<Credentials>) -> Result<Self, ApiError> {
        Ok(GerritClient {
            base_url,
            credentials,
            client: build_client(Duration::from_secs(30))?,
        })
    }

    /// Authenticated REST calls live under `/a/`.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiDetailedError> {
        if self.credentials.is_some() {
            let mut all = Vec::with_capacity(segments.len() + 1);
            all.push("a");
            all.extend_from_slice(segments);
            join_segments(&self.base_url, &all)
        } else {
            join_segments(&self.base_url, segments)
        }
    }

    /// Every open change, at its current patchset, in the order Gerrit returns them.  Records that can't be converted
    /// are logged and left out.
    pub async fn query_open_changes(&self) -> Result<Vec<Change>, ApiDetailedError> {
        let mut changes = Vec::new();
        let mut start = 0;
        loop {
            let mut url = self.url(&["changes", ""])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("q", OPEN_CHANGES_QUERY);
                for option in QUERY_OPTIONS {
                    query.append_pair("o", option);
                }
                if start > 0 {
                    query.append_pair("S", &start.to_string());
                }
            }

            let records: Vec<ChangeInfo> = self.get_json(url, "open changes query").await?;
            let more = records.last().is_some_and(|r| r.more_changes);
            start += records.len();
            for record in records {
                let number = record.number;
                match record.into_change() {
                    Ok(change) => changes.push(change),
                    Err(e) => warn!("skipping change {number}: {e}"),
                }
            }
            if !more {
                break;
            }
        }
        debug!("query returned {} open changes", changes.len());
        Ok(changes)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        what: &str,
    ) -> Result<T, ApiDetailedError> {
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
        decode_gerrit_json(&body).context(&format!("parsing response body for {what}"))
    }

    async fn post_json<B: serde::Serialize>(
        &self,
        url: Url,
        body: &B,
        what: &str,
    ) -> Result<(), ApiDetailedError> {
        debug!("HTTP request POST {url}");
        let request = with_auth(self.client.post(url), self.credentials.as_ref())
            .json(body)
            .build()
            .context(&format!("building request for {what}"))?;
        let response = self
            .client
            .execute(request)
            .await
            .context(&format!("sending request for {what}"))?;
        debug!("HTTP response: {response:?}");
        expect_success(response).context(&format!("reading response for {what}"))?;
        Ok(())
    }

    /// Posts `message` on the current patchset of `change`, optionally voting on the Verified label.
    pub async fn post_review(
        &self,
        change: &Change,
        message: &str,
        verified: Option<i8>,
    ) -> Result<(), ApiDetailedError> {
        let change_ref = change.change_ref().map_err(|e| {
            ApiDetailedError::from(ApiError::InvalidConfiguration(e.to_string()))
        })?;
        self.review(change_ref.change_number, revision_of(change), message, verified)
            .await
    }

    /// Posts `message` on the patchset named by `change_ref`, which need not be the change's current one.
    pub async fn post_review_on_patchset(
        &self,
        change_ref: &ChangeRef,
        message: &str,
        verified: Option<i8>,
    ) -> Result<(), ApiDetailedError> {
        self.review(
            change_ref.change_number,
            &change_ref.patchset.to_string(),
            message,
            verified,
        )
        .await
    }

    async fn review(
        &self,
        change_number: u64,
        revision: &str,
        message: &str,
        verified: Option<i8>,
    ) -> Result<(), ApiDetailedError> {
        let url = self.url(&[
            "changes",
            &change_number.to_string(),
            "revisions",
            revision,
            "review",
        ])?;
        let mut labels = BTreeMap::new();
        if let Some(vote) = verified {
            labels.insert(String::from(VERIFIED_LABEL), vote);
        }
        let input = ReviewInput {
            message: String::from(message),
            labels,
        };
        self.post_json(url, &input, "posting review").await
    }

    /// Submits the revision that was evaluated, so a patchset uploaded since then is not submitted unreviewed.
    pub async fn submit(&self, change: &Change) -> Result<(), ApiDetailedError> {
        let change_ref = change.change_ref().map_err(|e| {
            ApiDetailedError::from(ApiError::InvalidConfiguration(e.to_string()))
        })?;
        let url = self.url(&[
            "changes",
            &change_ref.change_number.to_string(),
            "revisions",
            revision_of(change),
            "submit",
        ])?;
        self.post_json(url, &serde_json::json!({}), "submitting change")
            .await
    }
}

impl MessagePoster for &GerritClient {
    async fn post_message(&self, change: &Change, message: &str) -> Result<()> {
        self.post_review(change, message, None).await?;
        Ok(())
    }
}
