// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;

use crate::errors::RefParseError;

/// The (change-number, patchset-number) identity carried by a Gerrit ref such as `refs/changes/12/3412/2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeRef {
    pub change_number: u64,
    pub patchset: u64,
}

impl ChangeRef {
    /// Parses the trailing `changes/<shard>/<change>/<patchset>` segments of a ref; whatever precedes them is ignored.
    pub fn parse(reference: &str) -> Result<ChangeRef, RefParseError> {
        let malformed = |reason: &str| RefParseError::MalformedRef {
            reference: String::from(reference),
            reason: String::from(reason),
        };

        let segments = reference.split('/').collect::<Vec<_>>();
        let [.., changes, shard, change_number, patchset] = segments.as_slice() else {
            return Err(malformed("expected at least 4 path segments"));
        };
        if *changes != "changes" {
            return Err(malformed("missing `changes` path segment"));
        }
        if shard.is_empty() {
            return Err(malformed("empty shard segment"));
        }

        let change_number = change_number
            .parse::<u64>()
            .map_err(|e| malformed(&format!("change number: {e}")))?;
        let patchset = patchset
            .parse::<u64>()
            .map_err(|e| malformed(&format!("patchset number: {e}")))?;

        Ok(ChangeRef {
            change_number,
            patchset,
        })
    }
}

impl fmt::Display for ChangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.change_number, self.patchset)
    }
}
