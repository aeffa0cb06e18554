// Copyright © 2024 Bassline. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-line interface for Bassline
//!
//! This module builds the `bassline` command tree and dispatches each
//! subcommand to the library. Page output goes to standard output (or a
//! file); logging goes to standard error.
//!
//! # Examples
//!
//! Parsing a `compose` command:
//!
//! ```
//! use bassline::cli;
//! use std::path::PathBuf;
//!
//! let matches = cli::build().get_matches_from(vec![
//!     "bassline",
//!     "compose",
//!     "markdown/index.md.in",
//!     "--output",
//!     "html/index.html",
//! ]);
//!
//! let compose = matches.subcommand_matches("compose").unwrap();
//! assert_eq!(
//!     compose.get_one::<PathBuf>("path").unwrap(),
//!     &PathBuf::from("markdown/index.md.in")
//! );
//! ```

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command as Process, Stdio};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::core::config::{BuildConfig, ConfigStore, CONFIG_FILE};
use crate::core::error::{BasslineError, Result};
use crate::Site;

/// The current version of Bassline, as defined in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Makefile driving full site builds, relative to the site root.
pub const MAKEFILE: &str = ".Makefile";

/// Builds and configures the Bassline command-line interface.
pub fn build() -> Command {
    debug!("Building CLI command structure");

    Command::new("bassline")
        .author("Bassline Contributors")
        .about("Composes markdown documents into static site pages through pandoc.")
        .version(VERSION)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .help("Site root containing config.toml")
                .value_parser(value_parser!(PathBuf))
                .default_value(".")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log more (-v, -vv)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("compose")
                .about("Compose a page from a page specification")
                .arg(
                    Arg::new("path")
                        .help("Page specification, below the source directory")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Write the page here instead of standard output")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("preprocess")
                .about("Print a document with its markers expanded")
                .arg(
                    Arg::new("path")
                        .help("Source document")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("postprocess")
                .about("Apply HTML fixups from standard input to standard output"),
        )
        .subcommand(
            Command::new("make")
                .about("Build the site with make")
                .arg(
                    Arg::new("targets")
                        .help("Make targets")
                        .num_args(0..)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("rebuild")
                        .short('B')
                        .long("rebuild")
                        .help("Rebuild every target")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("test")
                .about("Check that make and the renderer can be run"),
        )
        .after_help(
            "\x1b[1;4mLicense:\x1b[0m\n  The project is licensed under the terms of \
             both the MIT license and the Apache License (Version 2.0).",
        )
}

/// Runs the subcommand selected in `matches`, returning the exit status
/// to finish with.
pub fn run(matches: &ArgMatches) -> Result<i32> {
    let root = matches
        .get_one::<PathBuf>("root")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));

    match matches.subcommand() {
        Some(("compose", sub)) => {
            let path = required_path(sub, "path")?;
            let site = Site::open(&root)?;
            match sub.get_one::<PathBuf>("output") {
                Some(output) => compose_to_file(&site, path, output)?,
                None => compose_to_stdout(&site, path)?,
            }
            Ok(0)
        }
        Some(("preprocess", sub)) => {
            let path = required_path(sub, "path")?;
            let site = Site::open(&root)?;
            let mut out = BufWriter::new(io::stdout().lock());
            site.preprocess(path, &mut out)?;
            out.flush()?;
            Ok(0)
        }
        Some(("postprocess", _)) => {
            let site = Site::open(&root)?;
            let html = io::read_to_string(io::stdin())?;
            let mut out = io::stdout().lock();
            out.write_all(site.postprocess(&html)?.as_bytes())?;
            out.flush()?;
            Ok(0)
        }
        Some(("make", sub)) => {
            let targets: Vec<&String> = sub
                .get_many::<String>("targets")
                .map(Iterator::collect)
                .unwrap_or_default();
            run_make(&root, &targets, sub.get_flag("rebuild"))
        }
        Some(("test", _)) => Ok(check_tools(&root)),
        _ => Err(BasslineError::config_error("Unknown command", None)),
    }
}

fn required_path<'m>(matches: &'m ArgMatches, name: &str) -> Result<&'m Path> {
    matches
        .get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .ok_or_else(|| {
            BasslineError::config_error(format!("missing <{}>", name), None)
        })
}

fn compose_to_stdout(site: &Site, spec: &Path) -> Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    let entries = site.compose(spec, &mut out)?;
    out.flush()?;
    debug!("Wrote {} entries to standard output", entries);
    Ok(())
}

/// Streams the page into a temporary file beside `output` and moves it into
/// place once composition has succeeded.
fn compose_to_file(site: &Site, spec: &Path, output: &Path) -> Result<()> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file = NamedTempFile::new_in(dir)
        .map_err(|e| BasslineError::io_error(dir, e))?;

    let mut out = BufWriter::new(file);
    let entries = site.compose(spec, &mut out)?;
    let file = out
        .into_inner()
        .map_err(|e| BasslineError::io_error(output, e.into_error()))?;
    _ = file
        .persist(output)
        .map_err(|e| BasslineError::io_error(output, e.error))?;

    info!("Wrote {:?} with {} entries", output, entries);
    Ok(())
}

/// Runs `make -f .Makefile` in `root`, returning make's exit status.
fn run_make(root: &Path, targets: &[&String], rebuild: bool) -> Result<i32> {
    let makefile = root.join(MAKEFILE);
    if !makefile.is_file() {
        return Err(BasslineError::config_error(
            "no .Makefile in the site root",
            Some(makefile),
        ));
    }

    let mut command = Process::new("make");
    _ = command.arg("-f").arg(MAKEFILE).current_dir(root);
    if rebuild {
        _ = command.arg("-B");
    }
    _ = command.args(targets);

    info!("Running make {:?} in {:?}", targets, root);
    let status = command
        .status()
        .map_err(|e| BasslineError::io_error(&makefile, e))?;
    Ok(status.code().unwrap_or(1))
}

/// Probes each external tool with `--version`, printing one status line per
/// tool. Returns 1 when any tool cannot be run.
fn check_tools(root: &Path) -> i32 {
    let renderer = match ConfigStore::new(root.join(CONFIG_FILE)).load() {
        Ok(config) => config.build.renderer.clone(),
        Err(err) => {
            warn!("Using the default renderer: {}", err);
            BuildConfig::default().renderer
        }
    };

    let mut failed = false;
    for tool in ["make", renderer.as_str()] {
        if probe(tool) {
            println!("{}: OK", tool);
        } else {
            eprintln!("{}: FAILED", tool);
            failed = true;
        }
    }
    i32::from(failed)
}

fn probe(program: &str) -> bool {
    Process::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn get_matches(args: Vec<&str>) -> ArgMatches {
        build().get_matches_from(args)
    }

    #[test]
    fn test_compose_command() {
        let matches = get_matches(vec![
            "bassline",
            "-v",
            "--root",
            "site",
            "compose",
            "markdown/index.md.in",
        ]);
        assert_eq!(matches.get_count("verbose"), 1);
        assert_eq!(
            matches.get_one::<PathBuf>("root").unwrap(),
            &PathBuf::from("site")
        );

        let compose = matches.subcommand_matches("compose").unwrap();
        assert_eq!(
            compose.get_one::<PathBuf>("path").unwrap(),
            &PathBuf::from("markdown/index.md.in")
        );
        assert!(compose.get_one::<PathBuf>("output").is_none());
    }

    #[test]
    fn test_make_command() {
        let matches =
            get_matches(vec!["bassline", "make", "-B", "html", "feeds"]);
        let make = matches.subcommand_matches("make").unwrap();
        let targets: Vec<&String> =
            make.get_many::<String>("targets").unwrap().collect();
        assert_eq!(targets, vec!["html", "feeds"]);
        assert!(make.get_flag("rebuild"));

        let matches = get_matches(vec!["bassline", "make"]);
        let make = matches.subcommand_matches("make").unwrap();
        assert!(make.get_many::<String>("targets").is_none());
        assert!(!make.get_flag("rebuild"));
    }

    #[test]
    fn test_root_defaults_to_current_dir() {
        let matches = get_matches(vec!["bassline", "postprocess"]);
        assert_eq!(
            matches.get_one::<PathBuf>("root").unwrap(),
            &PathBuf::from(".")
        );
        assert!(matches.subcommand_matches("postprocess").is_some());
    }

    #[test]
    fn test_make_requires_makefile() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_str().unwrap();
        let matches = get_matches(vec!["bassline", "--root", root, "make"]);

        let err = run(&matches).unwrap_err();
        assert!(matches!(err, BasslineError::ConfigError { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_failed_compose_leaves_no_output() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "title = \"Site\"\n")
            .unwrap();
        let root = temp_dir.path().to_str().unwrap();
        let output = temp_dir.path().join("index.html");
        let matches = get_matches(vec![
            "bassline",
            "--root",
            root,
            "compose",
            "pages/index.md.in",
            "--output",
            output.to_str().unwrap(),
        ]);

        let err = run(&matches).unwrap_err();
        assert!(matches!(err, BasslineError::PathError { .. }));
        assert!(!output.exists());
        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(CONFIG_FILE)]);
    }
}
