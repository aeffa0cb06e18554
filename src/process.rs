// Copyright © 2024 Bassline. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Markdown preprocessing for single pages.
//!
//! Writes a document back out with its merged metadata and a few markers
//! expanded, ready for the converter:
//!
//! - the lead `image` is inserted as a figure at the `<!-- image -->`
//!   marker, or after the first paragraph when there is no marker;
//! - `<!-- break -->` becomes a clearing line break;
//! - `<!-- vspace -->` becomes clearing vertical space.

use std::io::Write;

use crate::core::error::Result;
use crate::processors::metadata::{write_front_matter, Metadata};

/// Marks where the lead image goes.
pub const IMAGE_MARKER: &str = "<!-- image -->";

/// Replaced by [`CLEAR_BREAK`].
pub const BREAK_MARKER: &str = "<!-- break -->";

/// Replaced by [`CLEAR_SPACE`].
pub const VSPACE_MARKER: &str = "<!-- vspace -->";

/// A line break that clears floats.
pub const CLEAR_BREAK: &str = "<div style=\"clear: both; height: 0;\"></div>";

/// Vertical space that clears floats.
pub const CLEAR_SPACE: &str = "<div style=\"clear: both; height: 3rem;\"></div>";

/// Writes the preprocessed document: the metadata block (numbered titles
/// encoded) followed by the rewritten body.
pub fn preprocess(
    meta: &Metadata,
    mut body: Vec<String>,
    out: &mut dyn Write,
) -> Result<()> {
    write_front_matter(meta, out, true)?;

    if let Some(image) = &meta.image {
        insert_figure(
            &mut body,
            image,
            meta.caption.as_deref().unwrap_or_default(),
        );
    }
    expand_markers(&mut body);

    for line in &body {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Inserts `![caption](image)` surrounded by blank lines.
///
/// The figure replaces the first image marker. Without a marker it goes
/// after the blank line that ends the first paragraph, or at the end when
/// the document is a single paragraph.
pub fn insert_figure(lines: &mut Vec<String>, image: &str, caption: &str) {
    let at = match lines.iter().position(|line| line == IMAGE_MARKER) {
        Some(marker) => {
            _ = lines.remove(marker);
            marker
        }
        None => end_of_first_paragraph(lines),
    };

    let figure = [
        String::new(),
        format!("![{}]({})", caption, image),
        String::new(),
    ];
    _ = lines.splice(at..at, figure);
}

/// Replaces the break and vspace markers.
pub fn expand_markers(lines: &mut [String]) {
    for line in lines.iter_mut() {
        match line.as_str() {
            BREAK_MARKER => *line = CLEAR_BREAK.to_string(),
            VSPACE_MARKER => *line = CLEAR_SPACE.to_string(),
            _ => {}
        }
    }
}

fn end_of_first_paragraph(lines: &[String]) -> usize {
    let start = lines.iter().position(|line| !line.is_empty());
    let blank = start.and_then(|start| {
        lines[start..].iter().position(String::is_empty).map(|i| start + i)
    });
    match blank {
        Some(i) => i + 1,
        None => lines.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn test_figure_replaces_marker() {
        let mut body = lines("Intro.\n<!-- image -->\nRest.");
        insert_figure(&mut body, "/images/a.jpg", "A");
        assert_eq!(body, lines("Intro.\n\n![A](/images/a.jpg)\n\nRest."));
    }

    #[test]
    fn test_figure_after_first_paragraph() {
        let mut body = lines("\nFirst\nparagraph.\n\nSecond.");
        insert_figure(&mut body, "/i.png", "");
        assert_eq!(
            body,
            lines("\nFirst\nparagraph.\n\n\n![](/i.png)\n\nSecond.")
        );

        let mut single = lines("Only.");
        insert_figure(&mut single, "/i.png", "c");
        assert_eq!(single, vec!["Only.", "", "![c](/i.png)", ""]);
    }

    #[test]
    fn test_expand_markers() {
        let mut body = lines("a\n<!-- break -->\n<!-- vspace -->\n <!-- break -->");
        expand_markers(&mut body);
        assert_eq!(body[1], CLEAR_BREAK);
        assert_eq!(body[2], CLEAR_SPACE);
        assert_eq!(body[3], " <!-- break -->");
    }

    #[test]
    fn test_preprocess_writes_meta_and_body() {
        let meta = Metadata {
            title: Some("2. Second".to_string()),
            image: Some("/images/b.jpg".to_string()),
            ..Metadata::default()
        };
        let mut out = Vec::new();
        preprocess(&meta, lines("Para.\n\n<!-- vspace -->"), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "---\ntitle: \"2// Second\"\nimage: \"/images/b.jpg\"\n...\n\
             Para.\n\n\n![](/images/b.jpg)\n\n\
             <div style=\"clear: both; height: 3rem;\"></div>\n"
        );
    }
}
