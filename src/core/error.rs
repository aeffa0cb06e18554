//! # Error Handling for Bassline
//!
//! This module defines the error taxonomy of the composition pipeline. The
//! `thiserror` crate is used to derive the display and source plumbing so
//! every failure reaches the command line as a single readable message.
//!
//! None of these errors are recovered locally: each one aborts the page
//! being composed and is surfaced to the caller, which maps it to a fixed
//! process exit code through [`BasslineError::exit_code`].

use std::path::PathBuf;
use thiserror::Error;

/// A unified result type for the Bassline library.
pub type Result<T> = std::result::Result<T, BasslineError>;

/// The main error type for Bassline.
#[derive(Error, Debug)]
pub enum BasslineError {
    /// The site configuration file is missing or cannot be parsed.
    #[error("Configuration error: {message}.")]
    ConfigError {
        /// Detailed description of the configuration error.
        message: String,
        /// Path of the configuration file, when known.
        path: Option<PathBuf>,
    },

    /// A front-matter block is malformed or unterminated, or a derived
    /// field cannot be computed.
    #[error("Metadata error in `{}`: {message}.", .path.display())]
    MetadataError {
        /// Description of the metadata problem.
        message: String,
        /// The document whose metadata failed to load.
        path: PathBuf,
    },

    /// A metadata invariant was violated.
    #[error("Validation error in `{}`: {message}.", .path.display())]
    ValidationError {
        /// Description of the violated invariant.
        message: String,
        /// The document (or config file) carrying the bad value.
        path: PathBuf,
    },

    /// A page or document path breaks the source-root or extension rules.
    #[error("Path error: {message} (`{}`).", .path.display())]
    PathError {
        /// Description of the path problem.
        message: String,
        /// The offending path.
        path: PathBuf,
    },

    /// The external renderer failed while rendering an entry.
    #[error("Render error for `{}`: {message}.", .path.display())]
    RenderError {
        /// What went wrong, including the exit status when there is one.
        message: String,
        /// The source document being rendered.
        path: PathBuf,
        /// Exit code of the renderer, if it ran to completion.
        code: Option<i32>,
    },

    /// IO error encountered during file operations.
    #[error("File IO error at `{path:?}`: {source}")]
    IOError {
        /// Path associated with the IO error.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for BasslineError {
    /// Converts a standard IO error into a `BasslineError::IOError` with
    /// an empty path.
    fn from(source: std::io::Error) -> Self {
        BasslineError::IOError {
            path: PathBuf::new(),
            source,
        }
    }
}

impl BasslineError {
    /// Creates a `ConfigError` with a specific message.
    pub fn config_error<S: Into<String>>(
        message: S,
        path: Option<PathBuf>,
    ) -> Self {
        BasslineError::ConfigError {
            message: message.into(),
            path,
        }
    }

    /// Creates a `MetadataError` for the document at `path`.
    pub fn metadata_error<S: Into<String>>(
        message: S,
        path: impl Into<PathBuf>,
    ) -> Self {
        BasslineError::MetadataError {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Creates a `ValidationError` for the document at `path`.
    pub fn validation_error<S: Into<String>>(
        message: S,
        path: impl Into<PathBuf>,
    ) -> Self {
        BasslineError::ValidationError {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Creates a `PathError` for `path`.
    pub fn path_error<S: Into<String>>(
        message: S,
        path: impl Into<PathBuf>,
    ) -> Self {
        BasslineError::PathError {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Creates a `RenderError` for the source document at `path`.
    ///
    /// # Parameters
    /// - `message`: A description of the failure.
    /// - `path`: The source document (not the temporary file) being rendered.
    /// - `code`: The renderer's exit code, or `None` when it never ran or
    ///   was killed by a signal.
    pub fn render_error<S: Into<String>>(
        message: S,
        path: impl Into<PathBuf>,
        code: Option<i32>,
    ) -> Self {
        BasslineError::RenderError {
            message: message.into(),
            path: path.into(),
            code,
        }
    }

    /// Wraps an IO error as an `IOError` variant with the specified path.
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BasslineError::IOError {
            path: path.into(),
            source,
        }
    }

    /// Process exit code associated with this kind of failure.
    ///
    /// | kind       | code |
    /// |------------|------|
    /// | IO         | 1    |
    /// | Config     | 2    |
    /// | Metadata   | 3    |
    /// | Validation | 4    |
    /// | Path       | 5    |
    /// | Render     | 6    |
    pub fn exit_code(&self) -> i32 {
        match self {
            BasslineError::IOError { .. } => 1,
            BasslineError::ConfigError { .. } => 2,
            BasslineError::MetadataError { .. } => 3,
            BasslineError::ValidationError { .. } => 4,
            BasslineError::PathError { .. } => 5,
            BasslineError::RenderError { .. } => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            BasslineError::from(std::io::Error::other("boom")),
            BasslineError::config_error("missing", None),
            BasslineError::metadata_error("block not found", "a.md"),
            BasslineError::validation_error("bad image", "a.md"),
            BasslineError::path_error("outside root", "a.md"),
            BasslineError::render_error("exit 2", "a.md", Some(2)),
        ];
        let mut codes: Vec<i32> =
            errors.iter().map(BasslineError::exit_code).collect();
        codes.dedup();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_render_error_names_source() {
        let err = BasslineError::render_error(
            "renderer exited with status 3",
            "markdown/blog/second.md",
            Some(3),
        );
        let message = err.to_string();
        assert!(message.contains("markdown/blog/second.md"));
        assert!(message.contains("status 3"));
    }
}
