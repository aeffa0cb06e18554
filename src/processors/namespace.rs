//! # Reference Namespacing
//!
//! Prepares the body of one entry for concatenation into a composed page.
//!
//! Markdown reference labels are page-global, so two posts that both use
//! `[docs][1]` would resolve to the same target once stitched together. Each
//! entry therefore gets its ordinal `n` as a label prefix: `[docs][1]`
//! becomes `[docs][n:1]` and its definition `[1]: ...` becomes
//! `[n:1]: ...`.
//!
//! Footnotes cannot be namespaced the same way and are dropped: inline
//! `[^x]` markers are deleted and footnote definition blocks are excluded.
//! Content after a `<!-- cut -->` line is dropped as well, except for link
//! definitions, and a "Read more" link to the full post is appended.
//!
//! Each step is a separate function over a single line so it can be tested
//! on its own; [`process`] applies them in order to every line. References
//! inside lines that end up dropped are still rewritten first. This has no
//! visible effect.

use std::sync::OnceLock;

use regex::Regex;

use crate::processors::metadata::Metadata;

/// Line that marks the end of the excerpt.
pub const CUT_MARKER: &str = "<!-- cut -->";

/// Indentation that continues a footnote body.
const FOOTNOTE_INDENT: &str = "    ";

/// State carried from one line to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineState {
    /// A cut marker has been seen.
    pub cut: bool,
    /// The current line belongs to a footnote definition.
    pub in_footnote: bool,
}

/// Rewrites the body `lines` of entry `n`.
///
/// Every line is right-trimmed, namespaced and filtered. If the body
/// contained a cut marker, a blank line and a link to the entry's
/// permalink are appended.
pub fn process(lines: &[String], meta: &Metadata, n: usize) -> Vec<String> {
    let mut state = LineState::default();
    let mut previous: Option<String> = None;
    let mut out = Vec::with_capacity(lines.len());

    for line in lines {
        let line = namespace_references(line.trim_end(), n);
        let line = namespace_definition(&line, n);
        let line = strip_footnote_references(&line);

        if is_cut_marker(&line) {
            state.cut = true;
        }
        state.in_footnote =
            footnote_span(state.in_footnote, previous.as_deref(), &line);

        if keep_line(state, &line) {
            out.push(line.clone());
        }
        previous = Some(line);
    }

    if state.cut {
        out.push(String::new());
        out.push(format!(
            "[Read more...]({})",
            meta.permalink.as_deref().unwrap_or_default()
        ));
    }
    out
}

/// Prefixes every reference `[text][ref]` on the line with `n:`.
///
/// References already carrying the prefix are left alone, so applying the
/// pass twice gives the same line.
pub fn namespace_references(line: &str, n: usize) -> String {
    let prefix = format!("{}:", n);
    let mut line = line.to_string();

    while let Some((start, split, end)) = find_reference(&line, &prefix) {
        let old = line[start..=end].to_string();
        let new = format!(
            "[{}][{}{}]",
            &line[start + 1..split],
            prefix,
            &line[split + 2..end]
        );
        line = line.replace(&old, &new);
    }
    line
}

/// Prefixes the label of a link definition `[label]: target` with `n:`.
///
/// Footnote definitions (`[^x]:`) and labels that already carry the prefix
/// are left alone.
pub fn namespace_definition(line: &str, n: usize) -> String {
    let Some(caps) = definition_regex().captures(line) else {
        return line.to_string();
    };
    let label = caps.get(1).map_or("", |m| m.as_str());
    let prefix = format!("{}:", n);
    if label.starts_with(&prefix) {
        return line.to_string();
    }
    format!("[{}{}]:{}", prefix, label, &line[caps[0].len()..])
}

/// Deletes inline footnote markers `[^x]`, except one that starts the
/// line (that is a footnote definition).
pub fn strip_footnote_references(line: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\[\^.*?\]").expect("footnote reference pattern is valid")
    });

    let mut out = String::with_capacity(line.len());
    let mut copied = 0;
    let mut pos = 0;
    while let Some(m) = re.find_at(line, pos) {
        if m.start() == 0 {
            pos = 1;
            continue;
        }
        out.push_str(&line[copied..m.start()]);
        copied = m.end();
        pos = m.end();
    }
    out.push_str(&line[copied..]);
    out
}

/// Whether the line is the cut marker.
pub fn is_cut_marker(line: &str) -> bool {
    line.trim_end() == CUT_MARKER
}

/// Whether the line is a link definition (not a footnote definition).
pub fn is_definition(line: &str) -> bool {
    definition_regex().is_match(line)
}

/// Whether the line opens a footnote definition.
pub fn is_footnote_definition(line: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[\^.*?\]:").expect("footnote definition pattern is valid")
    })
    .is_match(line)
}

/// Advances the footnote-span flag over `line`.
///
/// A span opens on a footnote definition. It closes on the first non-empty,
/// unindented line that follows an empty line; that line is checked again
/// so that a footnote directly following another is also excluded.
pub fn footnote_span(
    in_footnote: bool,
    previous: Option<&str>,
    line: &str,
) -> bool {
    if in_footnote {
        let closes = previous == Some("")
            && !line.is_empty()
            && !line.starts_with(FOOTNOTE_INDENT);
        if !closes {
            return true;
        }
    }
    is_footnote_definition(line)
}

/// Emission rule: keep the line outside footnotes and before the cut, and
/// keep link definitions everywhere.
pub fn keep_line(state: LineState, line: &str) -> bool {
    (!state.in_footnote && !state.cut) || is_definition(line)
}

fn definition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(|[^\^].*?)\]:").expect("definition pattern is valid")
    })
}

/// Finds the leftmost, shortest `[text][ref]` whose `ref` does not start
/// with `prefix`, returning the byte offsets of the opening `[`, of the
/// `][` separator and of the closing `]`.
fn find_reference(line: &str, prefix: &str) -> Option<(usize, usize, usize)> {
    let bytes = line.as_bytes();

    for start in (0..bytes.len()).filter(|&i| bytes[i] == b'[') {
        for split in start + 1..bytes.len().saturating_sub(1) {
            if bytes[split] != b']' || bytes[split + 1] != b'[' {
                continue;
            }
            let rest = &line[split + 2..];
            if rest.starts_with(prefix) {
                continue;
            }
            // No closing bracket here means none further right either.
            let end = rest.find(']')?;
            return Some((start, split, split + 2 + end));
        }
    }
    None
}
