// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod autosubmit;
pub mod cli;
pub mod query;
pub mod result;
