//! # Core Traits Module
//!
//! Defines the seam between the composition pipeline and the external
//! document converter. The pipeline prepares a [`RenderJob`] for each
//! entry and hands it to a [`Renderer`], which writes the converted HTML
//! straight into the page output.
//!
//! Production code uses [`crate::template::Pandoc`]; tests substitute a
//! recording implementation so composition can be exercised without the
//! converter installed.

use std::fmt::Debug;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::Result;

/// Everything the converter needs to render one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    /// The source document the entry was produced from. Errors name this
    /// path, never the temporary input.
    pub source: PathBuf,
    /// The temporary markdown document holding metadata and body.
    pub input: PathBuf,
    /// Template selected for the entry.
    pub template: PathBuf,
    /// Absolute URL of the entry.
    pub permalink: String,
    /// `permalink`, percent-encoded for embedding in query strings.
    pub quoted_permalink: String,
    /// Position of the entry within its page.
    pub ordinal: usize,
}

impl RenderJob {
    /// Returns the source document path.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Converts one prepared entry to HTML.
///
/// Implementations stream their output into `sink` as it is produced and
/// return only once conversion has finished. A failed conversion is
/// reported as a `RenderError` naming [`RenderJob::source`].
pub trait Renderer: Debug {
    /// Renders `job`, writing HTML into `sink`.
    fn render(&self, job: &RenderJob, sink: &mut dyn Write) -> Result<()>;

    /// Short name used in log messages.
    fn name(&self) -> &str;
}
