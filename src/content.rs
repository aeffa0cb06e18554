//! # Content Extraction Module
//!
//! Splits source documents into their front-matter block and body lines.
//!
//! A document may open with a metadata block delimited by a `---` line and
//! closed by a `...` line:
//!
//! ```text
//! ---
//! title: "First post"
//! image: /images/first.jpg
//! ...
//! Body text starts here.
//! ```
//!
//! Body lines keep their leading whitespace (indentation marks footnote
//! continuation) but lose trailing whitespace. Bodies are produced fresh on
//! every read; only metadata is cached.

use std::fs;
use std::path::Path;

use log::debug;

use crate::core::error::{BasslineError, Result};

/// Line that opens a front-matter block.
pub const BLOCK_OPENER: &str = "---";

/// Line that closes a front-matter block.
pub const BLOCK_TERMINATOR: &str = "...";

/// A source document split at its front-matter boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Raw text between the block delimiters, or `None` when the document
    /// has no front matter.
    pub front_matter: Option<String>,
    /// Body lines with trailing whitespace removed.
    pub body: Vec<String>,
}

impl Document {
    /// Splits `text`, read from `path`, into front matter and body.
    ///
    /// # Errors
    ///
    /// Returns a `MetadataError` when the opener is present but the
    /// terminator never follows.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut lines = text.lines();

        let mut front_matter = None;
        if lines.clone().next().map(str::trim_end) == Some(BLOCK_OPENER) {
            _ = lines.next();
            let mut block = String::new();
            let mut terminated = false;
            for line in lines.by_ref() {
                if line.trim_end() == BLOCK_TERMINATOR {
                    terminated = true;
                    break;
                }
                block.push_str(line);
                block.push('\n');
            }
            if !terminated {
                return Err(BasslineError::metadata_error(
                    "block not found",
                    path,
                ));
            }
            front_matter = Some(block);
        }

        let body = lines.map(|line| line.trim_end().to_string()).collect();
        Ok(Self { front_matter, body })
    }

    /// Reads and splits the document at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| BasslineError::io_error(path, e))?;
        Self::parse(&text, path)
    }
}

/// Produces the body lines of source documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    /// Creates a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Returns the body of the document at `path`, front matter removed.
    pub fn read(&self, path: &Path) -> Result<Vec<String>> {
        let document = Document::read(path)?;
        debug!("Extracted {} body lines from {:?}", document.body.len(), path);
        Ok(document.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_splits_front_matter() {
        let text = "---\ntitle: \"A\"\n...\nFirst line   \n    indented\n";
        let doc = Document::parse(text, Path::new("a.md")).unwrap();
        assert_eq!(doc.front_matter.as_deref(), Some("title: \"A\"\n"));
        assert_eq!(doc.body, vec!["First line", "    indented"]);
    }

    #[test]
    fn test_parse_without_front_matter_keeps_first_line() {
        let doc =
            Document::parse("Hello\n\nWorld\n", Path::new("a.md")).unwrap();
        assert!(doc.front_matter.is_none());
        assert_eq!(doc.body, vec!["Hello", "", "World"]);
    }

    #[test]
    fn test_unterminated_block_is_metadata_error() {
        let err = Document::parse("---\ntitle: x\nbody\n", Path::new("b.md"))
            .unwrap_err();
        assert!(matches!(err, BasslineError::MetadataError { .. }));
        assert!(err.to_string().contains("block not found"));
    }

    #[test]
    fn test_delimiters_ignore_trailing_whitespace() {
        let doc = Document::parse("---  \na: 1\n...\t\nx", Path::new("c.md"))
            .unwrap();
        assert_eq!(doc.front_matter.as_deref(), Some("a: 1\n"));
        assert_eq!(doc.body, vec!["x"]);
    }

    #[test]
    fn test_extractor_reads_fresh_each_time() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("post.md");
        fs::write(&path, "---\n...\none\n").unwrap();

        let extractor = ContentExtractor::new();
        assert_eq!(extractor.read(&path).unwrap(), vec!["one"]);

        fs::write(&path, "---\n...\ntwo\n").unwrap();
        assert_eq!(extractor.read(&path).unwrap(), vec!["two"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ContentExtractor::new()
            .read(Path::new("does/not/exist.md"))
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
