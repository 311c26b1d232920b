// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use log::error;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::{path::PathBuf, process::ExitCode};

use crate::config::{Config as PresubmitConfig, DEFAULT_CONFIG_PATH, get_config};

use super::{autosubmit, query, result, test};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
pub struct CommonOptions {
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,

    /// Presubmit configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll Gerrit for new changes and queue a presubmit build for each new unit of work
    Query,

    /// Run presubmit tests for a set of changes; normally invoked by the presubmit CI job
    Test(TestOptions),

    /// Post the results of a presubmit run back to each of its changes
    Result(ResultOptions),

    /// Submit every open change (or complete multi-part group) whose review labels allow it
    Autosubmit,
}

#[derive(Args, Debug)]
pub struct TestOptions {
    #[command(flatten)]
    pub run: RunParameters,

    /// Projects, colon-separated, one per ref in --refs
    #[arg(long, env = "REPOS")]
    pub projects: String,

    /// Names of the tests to run, colon-separated; defaults to the tests configured for the projects
    #[arg(long, env = "TESTS", default_value = "")]
    pub tests: String,
}

#[derive(Args, Debug)]
pub struct ResultOptions {
    #[command(flatten)]
    pub run: RunParameters,

    /// Number of the presubmit build whose results are being reported
    #[arg(long, env = "BUILD_NUMBER")]
    pub build_number: Option<u64>,
}

#[derive(Args, Debug)]
pub struct RunParameters {
    /// Gerrit change refs under test, colon-separated
    #[arg(long, env = "REFS")]
    pub refs: String,

    /// Where test results are written by `test` and read by `result`
    #[arg(long, default_value = "presubmit-status.json")]
    pub status_file: PathBuf,
}

fn load_config(common: &CommonOptions) -> Option<PresubmitConfig> {
    match get_config(&common.config) {
        Ok(config) => Some(config),
        Err(e) => {
            error!("{e:#}");
            None
        }
    }
}

pub async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    if TermLogger::init(
        cli.common.verbose.log_level_filter(),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .is_err()
    {
        return ExitCode::FAILURE;
    }

    // Configuration problems are fatal to every command.
    let Some(config) = load_config(&cli.common) else {
        return ExitCode::FAILURE;
    };

    match &cli.command {
        Commands::Query => query::cli(&config).await,
        Commands::Test(options) => test::cli(&config, options).await,
        Commands::Result(options) => result::cli(&config, options).await,
        Commands::Autosubmit => autosubmit::cli(&config).await,
    }
}
