// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RefParseError {
    #[error("malformed change reference {reference:?}: {reason}")]
    MalformedRef { reference: String, reason: String },
}

/// Rejected insertion into a [`crate::cl::MultiPartClSet`].  A rejected insertion never modifies the set.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MultiPartError {
    #[error("change {reference} is not a multi-part change")]
    NotMultiPart { reference: String },

    #[error("change {reference} has an invalid multi-part descriptor {index}/{total}")]
    InvalidDescriptor {
        reference: String,
        index: i32,
        total: i32,
    },

    #[error("change {reference} has topic {actual:?}, but the set is for topic {expected:?}")]
    TopicMismatch {
        reference: String,
        expected: String,
        actual: String,
    },

    #[error("change {reference} declares {actual} parts, but the set expects {expected}")]
    TotalMismatch {
        reference: String,
        expected: i32,
        actual: i32,
    },

    #[error("change {reference} duplicates part {index} (already held by {existing})")]
    DuplicateIndex {
        reference: String,
        index: i32,
        existing: String,
    },
}

/// A Gerrit change record that can't be turned into a [`crate::cl::Change`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChangeRecordError {
    #[error("change {change_number} has no current revision")]
    MissingCurrentRevision { change_number: u64 },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("project={project:?} ({reference}) not found. Skipped.")]
    ProjectNotFound { project: String, reference: String },

    #[error("addPresubmitTestBuild failed: {0}")]
    DispatchFailure(String),
}

/// Conditions that invalidate an entire poll cycle or command invocation.
#[derive(Error, Debug)]
pub enum PresubmitErrors {
    #[error("configuration {path:?} could not be read: {reason}")]
    ConfigUnreadable { path: PathBuf, reason: String },

    #[error("previous snapshot {path:?} could not be read: {reason}")]
    SnapshotUnreadable { path: PathBuf, reason: String },

    #[error("required parameter {0} was not provided")]
    MissingParameter(&'static str),

    #[error("{refs} refs were given with {projects} projects; each ref needs exactly one project")]
    MismatchedParameters { refs: usize, projects: usize },

    #[error("project {0:?} is not configured")]
    UnknownProject(String),
}

#[derive(Error, Debug)]
pub enum SubcommandErrors {
    #[error("sub-command '{command:?}' could not be started: {error:?}")]
    UnableToStart {
        command: String,
        error: std::io::Error,
    },

    #[error("sub-command '{command:?}' failed with exit code {status:?} and stderr {stderr:?})")]
    SubcommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}
