// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod client;
pub mod model;

pub use client::GerritClient;
pub use model::{ChangeInfo, parse_commit_message};
