// Copyright © 2024 Bassline. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Bassline Library
//!
//! Bassline composes static site pages out of markdown documents. A page
//! specification lists source documents; each one is namespaced, handed to
//! an external converter (pandoc by default) and stitched into a single
//! page, one numbered entry per document.
//!
//! The [`Site`] context object owns the configuration store, the metadata
//! cache and the renderer, and is the entry point for every operation.

#![doc = include_str!("../README.md")]
#![doc(html_root_url = "https://docs.rs/bassline")]
#![crate_name = "bassline"]
#![crate_type = "lib"]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::content::ContentExtractor;
use crate::core::config::{ConfigStore, SiteConfig, CONFIG_FILE};
use crate::core::traits::Renderer;
use crate::generators::html::Postprocessor;
use crate::generators::page::PageComposer;
use crate::processors::metadata::{Metadata, MetadataLoader};
use crate::template::Pandoc;

pub use crate::core::error::{BasslineError, Result};

/// Module containing core utilities, such as configuration and error handling.
pub mod core {
    /// Site configuration loading and caching.
    pub mod config;
    /// Contains error types and handling for Bassline.
    pub mod error;
    /// The renderer seam.
    pub mod traits;
    /// Path to URL mapping and URL quoting.
    pub mod url;
}

/// Provides command-line interface utilities.
pub mod cli;

/// Provides front-matter splitting and body extraction.
pub mod content;

/// Provides page output generation: entries, pages and HTML fixups.
pub mod generators {
    /// Renders one document as a page entry.
    pub mod entry;
    /// HTML postprocessing.
    pub mod html;
    /// Composes pages from page specifications.
    pub mod page;
}

/// Provides markdown preprocessing for single pages.
pub mod process;

/// Provides metadata and reference processing.
pub mod processors;

/// Provides the pandoc renderer.
pub mod template;

/// A site being built: its root directory plus the process-lifetime caches
/// and the renderer every page is composed with.
#[derive(Debug)]
pub struct Site {
    root: PathBuf,
    config: ConfigStore,
    metadata: MetadataLoader,
    content: ContentExtractor,
    renderer: Box<dyn Renderer>,
}

impl Site {
    /// Opens the site rooted at `root`, reading its `config.toml` and
    /// selecting the configured renderer.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the configuration is missing or invalid.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let config = ConfigStore::new(root.join(CONFIG_FILE));
        let renderer = Pandoc::new(config.load()?.build.renderer.clone(), &root);
        info!("Opened site at {:?} using {}", root, renderer.program());
        Ok(Self::with_renderer(root, config, Box::new(renderer)))
    }

    /// Creates a site from its parts.
    pub fn with_renderer<P: AsRef<Path>>(
        root: P,
        config: ConfigStore,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
            metadata: MetadataLoader::new(),
            content: ContentExtractor::new(),
            renderer,
        }
    }

    /// The site root. Document and page paths are relative to it.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The loaded site configuration.
    pub fn config(&self) -> Result<Arc<SiteConfig>> {
        self.config.load()
    }

    /// The configuration store.
    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    /// The cached metadata of the document at `path`.
    pub fn metadata(&self, path: &Path) -> Result<Arc<Metadata>> {
        let config = self.config()?;
        self.metadata.load(&config, path)
    }

    /// The body lines of the document at `path`, read fresh on every call.
    pub fn content(&self, path: &Path) -> Result<Vec<String>> {
        self.content.read(&self.root.join(path))
    }

    /// The renderer entries are converted with.
    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    /// Composes the page specified at `spec` into `out`, returning the
    /// number of entries.
    pub fn compose(&self, spec: &Path, out: &mut dyn Write) -> Result<usize> {
        PageComposer::new(self).compose(spec, out)
    }

    /// Writes the preprocessed form of the document at `path` into `out`.
    pub fn preprocess(&self, path: &Path, out: &mut dyn Write) -> Result<()> {
        let meta = self.metadata(path)?;
        let body = self.content(path)?;
        process::preprocess(&meta, body, out)
    }

    /// Applies the HTML fixups to converter output.
    pub fn postprocess(&self, html: &str) -> Result<String> {
        let config = self.config()?;
        Ok(Postprocessor::new(config.web_root()).process(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::RenderJob;
    use crate::generators::entry::{entry_open, ENTRY_CLOSE};
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Records each job and the temporary document it was given.
    #[derive(Debug, Clone, Default)]
    struct Recorder {
        jobs: Rc<RefCell<Vec<RenderJob>>>,
        inputs: Rc<RefCell<Vec<String>>>,
        fail_on: Option<usize>,
    }

    impl Renderer for Recorder {
        fn render(&self, job: &RenderJob, sink: &mut dyn Write) -> Result<()> {
            self.jobs.borrow_mut().push(job.clone());
            self.inputs
                .borrow_mut()
                .push(fs::read_to_string(&job.input)?);
            writeln!(sink, "<p>entry {}</p>", job.ordinal)?;
            if self.fail_on == Some(job.ordinal) {
                return Err(BasslineError::render_error(
                    "recorder exited with status 1",
                    &job.source,
                    Some(1),
                ));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    fn write(root: &Path, path: &str, text: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn fixture(recorder: &Recorder) -> (TempDir, Site) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("tmp")).unwrap();
        write(
            root,
            CONFIG_FILE,
            "site-url = \"https://example.org/notes/\"\n\n\
             [build]\ntemp-dir = \"tmp\"\n",
        );
        for (name, title) in
            [("first", "1. First"), ("second", "Second"), ("third", "Third")]
        {
            write(
                root,
                &format!("markdown/blog/{}.md", name),
                &format!(
                    "---\ntitle: \"{}\"\n...\nBody of {} with [a link][ref].\n\n\
                     [ref]: https://example.org/{}\n",
                    title, name, name
                ),
            );
        }
        write(
            root,
            "markdown/index.md.in",
            "---\ntitle: \"Notes\"\nshowrss: true\n...\n<h2>Latest</h2>\n\
             markdown/blog/first.md\nmarkdown/blog/second.md\n\
             markdown/blog/third.md\n",
        );

        let site = Site::with_renderer(
            root,
            ConfigStore::new(root.join(CONFIG_FILE)),
            Box::new(recorder.clone()),
        );
        (temp_dir, site)
    }

    fn compose(site: &Site, spec: &str) -> (Result<usize>, String) {
        let mut out = Vec::new();
        let result = site.compose(Path::new(spec), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_entries_render_in_order() {
        let recorder = Recorder::default();
        let (_temp_dir, site) = fixture(&recorder);

        let (result, page) = compose(&site, "markdown/index.md.in");
        assert_eq!(result.unwrap(), 3);

        let ordinals: Vec<usize> =
            recorder.jobs.borrow().iter().map(|job| job.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert_eq!(
            recorder.jobs.borrow()[1].source,
            PathBuf::from("markdown/blog/second.md")
        );

        let positions: Vec<usize> = (0..3)
            .map(|n| page.find(&entry_open(n)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(page.find("<h2>Latest</h2>").unwrap() < positions[0]);
        assert_eq!(page.matches("<hr />").count(), 2);
        assert!(!page[..positions[0]].contains("<hr />"));
        assert!(page[positions[0]..positions[1]].contains(ENTRY_CLOSE));
        assert!(page.starts_with("---\ntitle: \"Notes\"\n"));
        assert!(page.contains("rssurl: \"/index.xml\""));
    }

    #[test]
    fn test_entry_documents_are_namespaced() {
        let recorder = Recorder::default();
        let (_temp_dir, site) = fixture(&recorder);
        let (result, _) = compose(&site, "markdown/index.md.in");
        _ = result.unwrap();

        let inputs = recorder.inputs.borrow();
        assert!(inputs[0].contains("title: \"1// First\""));
        assert!(inputs[0].contains("first-entry: true"));
        assert!(!inputs[1].contains("first-entry"));
        assert!(inputs[1].contains("[a link][1:ref]"));
        assert!(inputs[1].contains("[1:ref]: https://example.org/second"));
        assert!(inputs[2].contains("[a link][2:ref]"));

        let jobs = recorder.jobs.borrow();
        assert_eq!(jobs[2].permalink, "https://example.org/notes/blog/third.html");
    }

    #[test]
    fn test_metadata_is_cached() {
        let recorder = Recorder::default();
        let (_temp_dir, site) = fixture(&recorder);
        let path = Path::new("markdown/blog/second.md");

        let before = site.metadata(path).unwrap();
        let (result, _) = compose(&site, "markdown/index.md.in");
        _ = result.unwrap();
        let after = site.metadata(path).unwrap();

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.title.as_deref(), Some("Second"));
    }

    #[test]
    fn test_relative_image_fails_before_rendering() {
        let recorder = Recorder::default();
        let (temp_dir, site) = fixture(&recorder);
        write(
            temp_dir.path(),
            "markdown/blog/bad.md",
            "---\nimage: \"images/photo.jpg\"\n...\nBody.\n",
        );
        write(
            temp_dir.path(),
            "markdown/bad.md.in",
            "markdown/blog/bad.md\n",
        );

        let (result, page) = compose(&site, "markdown/bad.md.in");
        let err = result.unwrap_err();
        assert!(matches!(err, BasslineError::ValidationError { .. }));
        assert_eq!(err.exit_code(), 4);
        assert!(recorder.jobs.borrow().is_empty());
        assert!(!page.contains(&entry_open(0)));
    }

    #[test]
    fn test_render_failure_stops_composition() {
        let recorder = Recorder {
            fail_on: Some(1),
            ..Recorder::default()
        };
        let (temp_dir, site) = fixture(&recorder);

        let (result, page) = compose(&site, "markdown/index.md.in");
        match result.unwrap_err() {
            BasslineError::RenderError { path, code, .. } => {
                assert_eq!(path, PathBuf::from("markdown/blog/second.md"));
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {}", other),
        }

        assert_eq!(recorder.jobs.borrow().len(), 2);
        assert!(!page.contains(&entry_open(2)));
        let leftovers = fs::read_dir(temp_dir.path().join("tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_page_outside_source_dir() {
        let recorder = Recorder::default();
        let (temp_dir, site) = fixture(&recorder);
        write(temp_dir.path(), "pages/index.md.in", "markdown/blog/first.md\n");

        let (result, page) = compose(&site, "pages/index.md.in");
        assert!(matches!(result, Err(BasslineError::PathError { .. })));
        assert!(page.is_empty());
        assert!(recorder.jobs.borrow().is_empty());
    }

    #[test]
    fn test_missing_include_is_copied_through() {
        let recorder = Recorder::default();
        let (temp_dir, site) = fixture(&recorder);
        write(
            temp_dir.path(),
            "markdown/drafts.md.in",
            "markdown/blog/missing.md\nmarkdown/blog/first.md\n",
        );

        let (result, page) = compose(&site, "markdown/drafts.md.in");
        assert_eq!(result.unwrap(), 1);
        assert!(page.contains("...\nmarkdown/blog/missing.md\n"));
    }

    #[test]
    fn test_preprocess_and_postprocess() {
        let recorder = Recorder::default();
        let (_temp_dir, site) = fixture(&recorder);

        let mut out = Vec::new();
        site.preprocess(Path::new("markdown/blog/first.md"), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("title: \"1// First\""));
        assert!(text.ends_with("[ref]: https://example.org/first\n"));

        let html = site
            .postprocess("<a href=\"/about.html\">About</a>")
            .unwrap();
        assert_eq!(html, "<a href=\"/notes/about.html\">About</a>\n");
        assert!(recorder.jobs.borrow().is_empty());
    }
}
