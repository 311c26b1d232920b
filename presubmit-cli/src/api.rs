// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{fmt, time::Duration};

use reqwest::{Client, RequestBuilder, StatusCode};
use thiserror::Error;
use url::Url;

/// Username and password for HTTP basic authentication against Gerrit or Jenkins.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request error: `{0}`")]
    RequestError(String),
    #[error("remote server returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("JSON deserialize error: `{0}`")]
    DeserializeError(#[from] serde_json::Error),
    #[error("invalid configuration: `{0}`")]
    InvalidConfiguration(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        ApiError::RequestError(value.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(value: url::ParseError) -> Self {
        ApiError::InvalidConfiguration(value.to_string())
    }
}

#[derive(Error, Debug)]
pub struct ApiDetailedError {
    pub error: ApiError,
    pub context: Option<String>,
}

impl fmt::Display for ApiDetailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.error, context),
            None => write!(f, "{}", self.error),
        }
    }
}

impl ApiDetailedError {
    fn context(self, context: &str) -> ApiDetailedError {
        ApiDetailedError {
            error: self.error,
            context: Some(String::from(context)),
        }
    }
}

impl From<ApiError> for ApiDetailedError {
    fn from(value: ApiError) -> Self {
        ApiDetailedError {
            error: value,
            context: None,
        }
    }
}

impl From<serde_json::Error> for ApiDetailedError {
    fn from(value: serde_json::Error) -> Self {
        ApiDetailedError {
            error: ApiError::DeserializeError(value),
            context: None,
        }
    }
}

pub(crate) trait ResultWithContext<T> {
    fn context(self, context: &str) -> Result<T, ApiDetailedError>;
}

impl<T> ResultWithContext<T> for Result<T, ApiDetailedError> {
    fn context(self, context: &str) -> Result<T, ApiDetailedError> {
        self.map_err(|e| e.context(context))
    }
}

impl<Res, Err> ResultWithContext<Res> for Result<Res, Err>
where
    Err: Into<ApiError>,
{
    fn context(self, context: &str) -> Result<Res, ApiDetailedError> {
        self.map_err(|e| ApiDetailedError {
            error: e.into(),
            context: Some(String::from(context)),
        })
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, ApiError> {
    Ok(reqwest::ClientBuilder::new()
        .gzip(true)
        .user_agent(format!("presubmit ({})", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?)
}

/// Appends path segments to `base`, tolerating a trailing slash on the base URL.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, ApiDetailedError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| {
            ApiError::InvalidConfiguration(format!("URL {base} cannot have path segments appended"))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn with_auth(request: RequestBuilder, credentials: Option<&Credentials>) -> RequestBuilder {
    match credentials {
        Some(credentials) => {
            request.basic_auth(&credentials.username, Some(&credentials.password))
        }
        None => request,
    }
}

/// Fails with [`ApiError::UnexpectedStatus`] unless the response status is 2xx.
pub(crate) fn expect_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ApiError::UnexpectedStatus(response.status()))
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{ApiError, ResultWithContext as _, join_segments};

    #[test]
    fn join_with_and_without_trailing_slash() {
        let base = Url::parse("http://jenkins.example.com/").unwrap();
        assert_eq!(
            join_segments(&base, &["queue", "api", "json"])
                .unwrap()
                .as_str(),
            "http://jenkins.example.com/queue/api/json"
        );
        let base = Url::parse("http://example.com/jenkins").unwrap();
        assert_eq!(
            join_segments(&base, &["job", "presubmit-test"])
                .unwrap()
                .as_str(),
            "http://example.com/jenkins/job/presubmit-test"
        );
    }

    #[test]
    fn join_encodes_slashes_within_a_segment() {
        let base = Url::parse("http://example.com/").unwrap();
        assert_eq!(
            join_segments(&base, &["changes", "a/b"]).unwrap().as_str(),
            "http://example.com/changes/a%2Fb"
        );
    }

    #[test]
    fn error_context_display() {
        let result: Result<(), ApiError> = Err(ApiError::RequestError(String::from("boom")));
        let err = result.context("sending request").unwrap_err();
        assert_eq!(
            format!("{err}"),
            "request error: `boom` (sending request)"
        );
    }
}
