// Copyright © 2024 Bassline. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Bassline CLI
//!
//! This is the main entry point for the Bassline command-line interface.
//! It initializes the logger, runs the selected subcommand and turns its
//! outcome into the process exit status.

use anyhow::Context;
use bassline::{cli, BasslineError};
use clap::ArgMatches;
use env_logger::Env;
use log::{debug, LevelFilter};
use std::path::PathBuf;
use std::process;

/// Initializes logging. `RUST_LOG` wins when set; otherwise each `-v`
/// raises the level from `warn`.
fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_env(
        Env::default().default_filter_or(level.as_str()),
    )
    .init();
}

/// Runs the selected subcommand, returning the exit status to finish with.
///
/// # Errors
///
/// Any library error is returned with the site root attached as context.
fn run(matches: &ArgMatches) -> Result<i32, anyhow::Error> {
    let root = matches
        .get_one::<PathBuf>("root")
        .cloned()
        .unwrap_or_default();
    debug!("Site root is {:?}", root);

    cli::run(matches)
        .with_context(|| format!("bassline failed in {}", root.display()))
}

/// The main entry point for the Bassline CLI.
fn main() {
    let matches = cli::build().get_matches();
    init_logger(matches.get_count("verbose"));

    match run(&matches) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err
                .downcast_ref::<BasslineError>()
                .map_or(1, BasslineError::exit_code);
            process::exit(code);
        }
    }
}
