// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{fs, io::Write as _, path::Path};

use anyhow::{Context as _, Result};
use log::{debug, info};

use crate::{
    cl::{Change, ClRefMap},
    errors::PresubmitErrors,
};

/// Reads the changes recorded by the previous poll.  A missing file is a first run and yields an empty snapshot; a file
/// that exists but can't be read or decoded invalidates the poll cycle.
pub fn read_snapshot(path: &Path) -> Result<ClRefMap, PresubmitErrors> {
    let unreadable = |reason: String| PresubmitErrors::SnapshotUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let exists = fs::exists(path).map_err(|e| unreadable(e.to_string()))?;
    if !exists {
        info!("no previous snapshot at {}; treating every open change as new", path.display());
        return Ok(ClRefMap::new());
    }

    let content = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let snapshot: ClRefMap =
        serde_json::from_str(&content).map_err(|e| unreadable(e.to_string()))?;
    debug!("read {} changes from {}", snapshot.len(), path.display());
    Ok(snapshot)
}

/// Replaces the persisted snapshot with `current`.  The file is written beside the target and renamed into place so a
/// crash never leaves a truncated snapshot behind.
pub fn write_snapshot(path: &Path, current: &[Change]) -> Result<()> {
    let snapshot = snapshot_of(current);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary snapshot in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, &snapshot).context("serializing snapshot")?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("replacing snapshot {}", path.display()))?;
    debug!("wrote {} changes to {}", snapshot.len(), path.display());
    Ok(())
}

#[must_use]
pub fn snapshot_of(current: &[Change]) -> ClRefMap {
    current
        .iter()
        .map(|change| (change.reference.clone(), change.clone()))
        .collect()
}
