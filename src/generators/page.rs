//! # Page Composition
//!
//! Assembles a composed page from a page specification such as
//! `markdown/index.md.in`:
//!
//! ```text
//! ---
//! title: "Field Notes"
//! showrss: true
//! ...
//! <h2>Latest</h2>
//! markdown/blog/third.md
//! markdown/blog/second.md
//! ```
//!
//! The page's own metadata is written first. Each body line naming an
//! existing content file becomes an entry, numbered from 0 in the order
//! listed; every other line is copied through unchanged.

use std::io::Write;
use std::path::Path;

use log::{debug, info};

use crate::core::error::{BasslineError, Result};
use crate::core::url::{relative_url, rss_url};
use crate::generators::entry::EntryRenderer;
use crate::processors::metadata::write_front_matter;
use crate::Site;

/// Composes pages from page specifications.
#[derive(Debug, Clone, Copy)]
pub struct PageComposer<'a> {
    site: &'a Site,
}

impl<'a> PageComposer<'a> {
    /// Creates a page composer for `site`.
    pub fn new(site: &'a Site) -> Self {
        Self { site }
    }

    /// Composes the page specified at `spec` into `out`, returning the
    /// number of entries rendered.
    ///
    /// # Errors
    ///
    /// Fails with a `PathError` before writing anything when `spec` is not
    /// below the source directory. Any entry failure stops composition.
    pub fn compose(&self, spec: &Path, out: &mut dyn Write) -> Result<usize> {
        let config = self.site.config()?;
        if !spec.starts_with(&config.build.source_dir) {
            return Err(BasslineError::path_error(
                format!(
                    "page must be inside the source directory '{}'",
                    config.build.source_dir.display()
                ),
                spec,
            ));
        }

        let mut meta = (*self.site.metadata(spec)?).clone();
        if meta.showrss == Some(true) {
            meta.rssurl = Some(rss_url(&relative_url(spec)?));
        }
        write_front_matter(&meta, out, true)?;

        let entries = EntryRenderer::new(self.site);
        let mut ordinal = 0;
        for line in self.site.content(spec)? {
            if self.is_include(&line, &config.build.extension) {
                entries.render(Path::new(&line), ordinal, out)?;
                ordinal += 1;
            } else {
                writeln!(out, "{}", line)?;
            }
        }

        info!("Composed {:?} from {} entries", spec, ordinal);
        Ok(ordinal)
    }

    /// Whether a page line names a content file to include.
    pub fn is_include(&self, line: &str, extension: &str) -> bool {
        let include = line
            .strip_suffix(extension)
            .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
            && self.site.root().join(line).is_file();
        if !include && line.ends_with(&format!(".{}", extension)) {
            debug!("Copying {:?} through: no such file", line);
        }
        include
    }
}
