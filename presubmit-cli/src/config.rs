// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Result;
use serde::Deserialize;
use url::Url;

use crate::{api::Credentials, errors::PresubmitErrors};

pub const DEFAULT_CONFIG_PATH: &str = ".config/presubmit.toml";

/// Everything the presubmit commands need to know about the deployment, read once at startup and passed down
/// explicitly.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub gerrit_url: Url,
    pub jenkins_url: Url,
    #[serde(default = "default_presubmit_job")]
    pub presubmit_job: String,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default = "default_allowed_owner_domains")]
    pub allowed_owner_domains: Vec<String>,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_presubmit_branch")]
    pub presubmit_branch: String,
    #[serde(default = "default_test_timeout_secs")]
    pub default_test_timeout_secs: u64,
    #[serde(default)]
    pub tools_build_command: Option<Vec<String>>,
    #[serde(default, rename = "project")]
    pub projects: Vec<ProjectConfig>,
    #[serde(default, rename = "test")]
    pub tests: Vec<TestDefinition>,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    pub name: String,
    /// Local checkout of the project.
    pub checkout: PathBuf,
    /// Remote that Gerrit change refs are pulled from.
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub tests: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TestDefinition {
    pub name: String,
    /// argv of the test; the first element is the program.
    pub command: Vec<String>,
    /// Project whose checkout the command runs in; defaults to the first project of the run.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// JUnit XML report written by the command, relative to its working directory.
    #[serde(default)]
    pub junit_report: Option<PathBuf>,
}

/// Secrets are never stored in the config file; only the names of the environment variables that hold them.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub gerrit_password_env: Option<String>,
    #[serde(default)]
    pub jenkins_password_env: Option<String>,
}

fn default_presubmit_job() -> String {
    String::from("presubmit-test")
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(".presubmit/open-cls.json")
}

fn default_allowed_owner_domains() -> Vec<String> {
    vec![String::from("google.com")]
}

fn default_remote() -> String {
    String::from("origin")
}

fn default_base_branch() -> String {
    String::from("master")
}

fn default_presubmit_branch() -> String {
    String::from("presubmit")
}

fn default_test_timeout_secs() -> u64 {
    30 * 60
}

impl Config {
    pub fn parse(content: &str) -> Result<Config> {
        Ok(toml::from_str(content)?)
    }

    #[must_use]
    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn project_checkout(&self, name: &str) -> Option<&Path> {
        self.project(name).map(|p| p.checkout.as_path())
    }

    /// The union of the tests configured for `projects`, in configuration order, without duplicates.  Unknown
    /// projects contribute nothing.
    #[must_use]
    pub fn tests_for_projects<'a>(&self, projects: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tests = Vec::new();
        for project in projects {
            if let Some(project) = self.project(project) {
                for test in &project.tests {
                    if seen.insert(test.as_str()) {
                        tests.push(test.clone());
                    }
                }
            }
        }
        tests
    }

    #[must_use]
    pub fn test_definition(&self, name: &str) -> Option<&TestDefinition> {
        self.tests.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn test_timeout(&self, test: &TestDefinition) -> Duration {
        Duration::from_secs(test.timeout_secs.unwrap_or(self.default_test_timeout_secs))
    }

    /// Whether `email` belongs to one of the organizational domains allowed to trigger presubmit builds.
    #[must_use]
    pub fn owner_allowed(&self, email: &str) -> bool {
        let Some((_, domain)) = email.rsplit_once('@') else {
            return false;
        };
        self.allowed_owner_domains
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(domain))
    }

    #[must_use]
    pub fn gerrit_credentials(&self) -> Option<Credentials> {
        self.credentials(self.credentials.gerrit_password_env.as_deref())
    }

    #[must_use]
    pub fn jenkins_credentials(&self) -> Option<Credentials> {
        self.credentials(self.credentials.jenkins_password_env.as_deref())
    }

    fn credentials(&self, password_env: Option<&str>) -> Option<Credentials> {
        let username = self.credentials.username.as_ref()?;
        let password = env::var(password_env?).ok()?;
        Some(Credentials {
            username: username.clone(),
            password,
        })
    }
}

pub fn get_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| PresubmitErrors::ConfigUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Config::parse(&content).map_err(|e| {
        PresubmitErrors::ConfigUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}
