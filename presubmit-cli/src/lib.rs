// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)] // maybe should warn on it, but currently use this pattern and like it
#![allow(clippy::too_many_lines)] // probably the right thing to warn on, but somewhat arbitrary
#![warn(clippy::print_stderr)]
#![warn(clippy::print_stdout)]
#![warn(clippy::string_slice)]

pub mod api;
pub mod cl;
pub mod cmd;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod gerrit;
pub mod jenkins;
pub mod junit;
pub mod message;
pub mod scm;
pub mod snapshot;
pub mod test_status;
mod util;
