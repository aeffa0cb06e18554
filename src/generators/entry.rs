//! # Entry Rendering
//!
//! Renders one source document as an entry of a composed page.
//!
//! The entry's metadata and namespaced body are written to a temporary
//! markdown document, the renderer converts it with the entry template, and
//! its output is wrapped in a numbered container:
//!
//! ```html
//! <div class="entry" id="entry-1">
//! ...renderer output...
//! </div> <!-- class="entry" -->
//! ```
//!
//! Entries after the first are preceded by a horizontal rule. The temporary
//! document is removed when rendering ends, whether or not it succeeded.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::{Builder, NamedTempFile};

use crate::core::config::SiteConfig;
use crate::core::error::{BasslineError, Result};
use crate::core::traits::RenderJob;
use crate::core::url::{absolute_url, quote, relative_url};
use crate::processors::metadata::{write_front_matter, Metadata};
use crate::processors::namespace;
use crate::Site;

/// Separator written before every entry but the first.
pub const ENTRY_SEPARATOR: &str = "\n<hr />\n";

/// Closing tag of an entry container.
pub const ENTRY_CLOSE: &str = "</div> <!-- class=\"entry\" -->";

/// Opening tag of the container for entry `ordinal`.
pub fn entry_open(ordinal: usize) -> String {
    format!("<div class=\"entry\" id=\"entry-{}\">", ordinal)
}

/// Renders source documents as page entries.
#[derive(Debug, Clone, Copy)]
pub struct EntryRenderer<'a> {
    site: &'a Site,
}

impl<'a> EntryRenderer<'a> {
    /// Creates an entry renderer for `site`.
    pub fn new(site: &'a Site) -> Self {
        Self { site }
    }

    /// Renders the document at `path` as entry `ordinal`, writing to `sink`.
    ///
    /// # Errors
    ///
    /// Fails with the loader's errors for bad metadata, and with a
    /// `RenderError` naming `path` when the renderer fails. Output written
    /// before a failure stays in `sink`.
    pub fn render(
        &self,
        path: &Path,
        ordinal: usize,
        sink: &mut dyn Write,
    ) -> Result<()> {
        if ordinal > 0 {
            writeln!(sink, "{}", ENTRY_SEPARATOR)?;
        }

        let config = self.site.config()?;
        let cached = self.site.metadata(path)?;
        let meta = entry_metadata(&config, &cached, path, ordinal)?;
        let content = self.site.content(path)?;
        let body = namespace::process(&content, &meta, ordinal);

        let document = write_document(&config, &meta, &body)?;
        let job = RenderJob {
            source: path.to_path_buf(),
            input: document.path().to_path_buf(),
            template: config.build.entry_template.clone(),
            permalink: meta.permalink.clone().unwrap_or_default(),
            quoted_permalink: meta
                .quoted_permalink
                .clone()
                .unwrap_or_default(),
            ordinal,
        };

        debug!(
            "Rendering entry {} from {:?} via {}",
            ordinal,
            path,
            self.site.renderer().name()
        );
        writeln!(sink, "{}", entry_open(ordinal))?;
        self.site.renderer().render(&job, sink)?;
        writeln!(sink, "{}", ENTRY_CLOSE)?;

        document
            .close()
            .map_err(|e| BasslineError::io_error(&job.input, e))
    }
}

/// Copies the cached metadata of `path` and sets the per-entry fields.
fn entry_metadata(
    config: &SiteConfig,
    cached: &Metadata,
    path: &Path,
    ordinal: usize,
) -> Result<Metadata> {
    let mut meta = cached.clone();
    let rellink = relative_url(path)?;
    let permalink = match config.site_url() {
        Some(site_url) => absolute_url(path, site_url)?,
        None => rellink.clone(),
    };
    meta.quoted_permalink = Some(quote(&permalink));
    meta.permalink = Some(permalink);
    meta.rellink = Some(rellink);
    meta.first_entry = Some(ordinal == 0);
    Ok(meta)
}

/// Writes the temporary markdown document for one entry.
fn write_document(
    config: &SiteConfig,
    meta: &Metadata,
    body: &[String],
) -> Result<NamedTempFile> {
    let dir = temp_dir(config);
    let file = Builder::new()
        .prefix("bassline-entry-")
        .suffix(".md")
        .tempfile_in(&dir)
        .map_err(|e| BasslineError::io_error(&dir, e))?;

    let mut writer = BufWriter::new(file.as_file());
    write_front_matter(meta, &mut writer, true)
        .and_then(|()| {
            for line in body {
                writeln!(writer, "{}", line)?;
            }
            writer.flush()
        })
        .map_err(|e| BasslineError::io_error(file.path(), e))?;
    drop(writer);

    Ok(file)
}

fn temp_dir(config: &SiteConfig) -> PathBuf {
    match &config.build.temp_dir {
        Some(dir) => config.root.join(dir),
        None => std::env::temp_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_metadata() {
        let config = SiteConfig::parse(
            "site-url = \"https://example.org/\"\n",
            Path::new("config.toml"),
        )
        .unwrap();
        let cached = Metadata {
            title: Some("Post".to_string()),
            first_entry: Some(true),
            ..Metadata::default()
        };

        let meta =
            entry_metadata(&config, &cached, Path::new("markdown/a/b.md"), 2)
                .unwrap();
        assert_eq!(
            meta.permalink.as_deref(),
            Some("https://example.org/a/b.html")
        );
        assert_eq!(meta.rellink.as_deref(), Some("/a/b.html"));
        assert_eq!(
            meta.quoted_permalink.as_deref(),
            Some("https%3A%2F%2Fexample.org%2Fa%2Fb.html")
        );
        assert_eq!(meta.first_entry, Some(false));
        assert_eq!(meta.title.as_deref(), Some("Post"));
    }

    #[test]
    fn test_container_tags() {
        assert_eq!(entry_open(0), "<div class=\"entry\" id=\"entry-0\">");
        assert!(ENTRY_CLOSE.starts_with("</div>"));
    }
}
