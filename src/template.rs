//! # Template Rendering Module
//!
//! Drives the external document converter. [`Pandoc`] implements the
//! [`Renderer`] seam by running the converter on a prepared entry with the
//! entry template and copying its standard output straight into the page
//! being composed.
//!
//! The converter is invoked as:
//!
//! ```text
//! pandoc <input> -s -t html5 --email-obfuscation=none \
//!        --template=<template> -V permalink=<url> -V quoted-permalink=<quoted>
//! ```
//!
//! from the site root, so template paths resolve the same way they do for
//! the build tool.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::core::error::{BasslineError, Result};
use crate::core::traits::{RenderJob, Renderer};

/// Renderer backed by the `pandoc` command line tool.
#[derive(Debug, Clone)]
pub struct Pandoc {
    program: String,
    root: PathBuf,
}

impl Pandoc {
    /// Creates a renderer running `program` from the site `root`.
    pub fn new<S: Into<String>, P: AsRef<Path>>(program: S, root: P) -> Self {
        Self {
            program: program.into(),
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Program the renderer runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command line arguments for `job`.
    pub fn args(&self, job: &RenderJob) -> Vec<OsString> {
        let mut template = OsString::from("--template=");
        template.push(&job.template);

        vec![
            job.input.clone().into_os_string(),
            "-s".into(),
            "-t".into(),
            "html5".into(),
            "--email-obfuscation=none".into(),
            template,
            "-V".into(),
            format!("permalink={}", job.permalink).into(),
            "-V".into(),
            format!("quoted-permalink={}", job.quoted_permalink).into(),
        ]
    }
}

impl Renderer for Pandoc {
    fn render(&self, job: &RenderJob, sink: &mut dyn Write) -> Result<()> {
        debug!(
            "Running {} on {:?} for entry {}",
            self.program, job.source, job.ordinal
        );

        let mut child = Command::new(&self.program)
            .args(self.args(job))
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BasslineError::render_error(
                    format!("failed to start {}: {}", self.program, e),
                    &job.source,
                    None,
                )
            })?;

        let copied = match child.stdout.take() {
            Some(mut stdout) => io::copy(&mut stdout, sink),
            None => Ok(0),
        };
        let status = child.wait()?;

        if !status.success() {
            let message = match status.code() {
                Some(code) => {
                    format!("{} exited with status {}", self.program, code)
                }
                None => format!("{} was terminated by a signal", self.program),
            };
            return Err(BasslineError::render_error(
                message,
                &job.source,
                status.code(),
            ));
        }

        let bytes = copied.map_err(|e| BasslineError::io_error(&job.source, e))?;
        debug!("{} wrote {} bytes for {:?}", self.program, bytes, job.source);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job(input: PathBuf) -> RenderJob {
        RenderJob {
            source: PathBuf::from("markdown/blog/post.md"),
            input,
            template: PathBuf::from("templates/entry.html5"),
            permalink: "https://example.org/blog/post.html".to_string(),
            quoted_permalink: "https%3A%2F%2Fexample.org%2Fblog%2Fpost.html"
                .to_string(),
            ordinal: 2,
        }
    }

    #[test]
    fn test_args() {
        let pandoc = Pandoc::new("pandoc", ".");
        let args = pandoc.args(&job(PathBuf::from("/tmp/entry.md")));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "/tmp/entry.md",
                "-s",
                "-t",
                "html5",
                "--email-obfuscation=none",
                "--template=templates/entry.html5",
                "-V",
                "permalink=https://example.org/blog/post.html",
                "-V",
                "quoted-permalink=https%3A%2F%2Fexample.org%2Fblog%2Fpost.html",
            ]
        );
    }

    #[test]
    fn test_missing_program_is_render_error() {
        let temp_dir = TempDir::new().unwrap();
        let pandoc = Pandoc::new("bassline-no-such-renderer", temp_dir.path());
        let mut out = Vec::new();
        let err = pandoc
            .render(&job(temp_dir.path().join("in.md")), &mut out)
            .unwrap_err();
        assert!(matches!(err, BasslineError::RenderError { code: None, .. }));
        assert!(err.to_string().contains("markdown/blog/post.md"));
    }

    // `sh` treats the input document as a script, which stands in for a
    // converter without needing one installed.
    #[cfg(unix)]
    #[test]
    fn test_output_is_streamed_to_sink() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.md");
        std::fs::write(&input, "printf '<p>entry</p>\\n'\n").unwrap();

        let mut out = Vec::new();
        Pandoc::new("sh", temp_dir.path())
            .render(&job(input), &mut out)
            .unwrap();
        assert_eq!(out, b"<p>entry</p>\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_render_error() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.md");
        std::fs::write(&input, "exit 3\n").unwrap();

        let mut out = Vec::new();
        let err = Pandoc::new("sh", temp_dir.path())
            .render(&job(input), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            BasslineError::RenderError { code: Some(3), .. }
        ));
        assert_eq!(err.exit_code(), 6);
    }
}
