//! # HTML Postprocessing
//!
//! Line-oriented fixups applied to the converter's HTML output before it is
//! published. The steps run in a fixed order:
//!
//! 1. converter workarounds: HTML that was escaped when it should not have
//!    been, numbered titles encoded by the front-matter writer, empty
//!    break paragraphs and paragraph tags inside `<head>`;
//! 2. root-relative `src`/`href` URLs get the site's web root;
//! 3. images under `/images/` link to their full-size originals;
//! 4. social badges open in a new tab and get a share tooltip;
//! 5. crowded `<meta>` lines and one-line `<ul>` lists are split up.
//!
//! # Examples
//!
//! ```rust
//! use bassline::generators::html::Postprocessor;
//!
//! let html = "<head>\n<title>3// Lessons</title>\n</head>\n\
//!             <img src=\"/images/a.png\" />\n";
//! let out = Postprocessor::new("blog").process(html);
//!
//! assert!(out.contains("<title>3. Lessons</title>"));
//! assert!(out.contains(
//!     "<a href=\"/blog/images/originals/a.png\"><img src=\"/blog/images/a.png\" /></a>"
//! ));
//! ```

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Badge markup the old converter escapes.
const ESCAPED_ENVELOPE: &str =
    "&lt;span class=&quot;fa fa-envelope badge&quot;&gt;&lt;/span&gt;";

/// Share tooltips keyed by a fragment of the badge URL.
const TOOLTIPS: [(&str, &str); 5] = [
    ("twitter", "Tweet this"),
    ("facebook", "Share this on Facebook"),
    ("google", "Share this on Google+"),
    ("linkedin", "Share this on LinkedIn"),
    ("mailto", "Share this by Email"),
];

/// Applies the HTML fixups for one site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Postprocessor {
    web_root: String,
}

impl Postprocessor {
    /// Creates a postprocessor for a site published below `web_root`
    /// (without surrounding slashes; empty for a site at the domain root).
    pub fn new<S: Into<String>>(web_root: S) -> Self {
        Self {
            web_root: web_root.into().trim_matches('/').to_string(),
        }
    }

    /// Runs every fixup over `html`.
    pub fn process(&self, html: &str) -> String {
        let mut lines: Vec<String> = html.lines().map(String::from).collect();

        fix_escaped_markup(&mut lines);
        restore_numbered_titles(&mut lines);
        collapse_empty_breaks(&mut lines);
        strip_head_paragraphs(&mut lines);
        prefix_web_root(&mut lines, &self.web_root);
        link_images(&mut lines);
        open_badges_in_tabs(&mut lines);
        add_share_tooltips(&mut lines);
        let lines = split_meta_lines(lines);
        let lines = split_inline_lists(lines);

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Unescapes badge and link markup the converter escaped.
pub fn fix_escaped_markup(lines: &mut [String]) {
    for line in lines.iter_mut() {
        if line.contains(ESCAPED_ENVELOPE) {
            *line = line.replace(
                ESCAPED_ENVELOPE,
                "<span class=\"fa fa-envelope badge\"></span>",
            );
        }
        if line.contains("&lt;a href=\u{201c}") || line.contains("\u{201d}&gt;") {
            *line = line
                .replace("&lt;a href=\u{201c}", "<a href=\"")
                .replace("\u{201d}&gt;", "\">");
        }
    }
}

/// Turns `N// Title` back into `N. Title` in `<title>`, `<meta>` content
/// and `<h1>` elements.
pub fn restore_numbered_titles(lines: &mut [String]) {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    static META: OnceLock<Regex> = OnceLock::new();
    static HEADING: OnceLock<Regex> = OnceLock::new();
    let title = regex(&TITLE, r"<title>(\d+)// (.*?)</title>");
    let meta = regex(&META, r#"<meta (.*?) content="(\d+)// (.*?)" />"#);
    let heading = regex(&HEADING, r"<h1([^>]*)>(\d+)// (.*?)</h1>");

    for line in lines.iter_mut() {
        if !line.contains("// ") {
            continue;
        }
        let fixed = title
            .replace_all(line, "<title>$1. $2</title>")
            .into_owned();
        let fixed = meta
            .replace_all(&fixed, r#"<meta $1 content="$2. $3" />"#)
            .into_owned();
        *line = heading
            .replace_all(&fixed, "<h1$1>$2. $3</h1>")
            .into_owned();
    }
}

/// Replaces `<p><br /></p>` with a bare line break.
pub fn collapse_empty_breaks(lines: &mut [String]) {
    for line in lines.iter_mut() {
        if line.contains("<p><br /></p>") {
            *line = line.replace("<p><br /></p>", "<br />\n");
        }
    }
}

/// Removes paragraph tags between `<head>` and `</head>`.
pub fn strip_head_paragraphs(lines: &mut [String]) {
    let mut in_head = false;
    for line in lines.iter_mut() {
        let trimmed = line.trim();
        if trimmed.starts_with("<head>") {
            in_head = true;
        }
        let closes = trimmed.starts_with("</head>");
        if in_head {
            *line = line.replace("<p>", "").replace("</p>", "");
        }
        if closes {
            break;
        }
    }
}

/// Prefixes root-relative `src` and `href` URLs with `/web_root`.
/// Protocol-relative URLs (`//host/...`) are left alone.
pub fn prefix_web_root(lines: &mut [String], web_root: &str) {
    if web_root.is_empty() {
        return;
    }
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r#"(src|href)="/(.*?)""#);

    for line in lines.iter_mut() {
        let fixed = re.replace_all(line, |caps: &Captures<'_>| {
            if caps[2].starts_with('/') {
                caps[0].to_string()
            } else {
                format!("{}=\"/{}/{}\"", &caps[1], web_root, &caps[2])
            }
        });
        *line = fixed.into_owned();
    }
}

/// Wraps images under `/images/` in a link to `/images/originals/`.
/// Images that are already linked, or are originals, are skipped.
pub fn link_images(lines: &mut [String]) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r#"<img src="(/.*?)?/images/(.*?)".*?/>"#);

    for i in 0..lines.len() {
        let Some(caps) = re.captures(&lines[i]) else {
            continue;
        };
        let linked_already = lines[i].trim().to_lowercase().ends_with("</a>")
            || lines.get(i + 1).is_some_and(|next| {
                next.trim().to_lowercase().starts_with("</a>")
            });
        let subpath = &caps[2];
        if linked_already || subpath.starts_with("originals/") {
            continue;
        }
        let img = &caps[0];
        let root = caps.get(1).map_or("", |m| m.as_str());
        let linked = format!(
            "<a href=\"{}/images/originals/{}\">{}</a>",
            root, subpath, img
        );
        let replaced = lines[i].replace(img, &linked);
        lines[i] = replaced;
    }
}

/// Makes badge links (`<a href="..."><span class="fa ...">`) open in a new
/// tab.
pub fn open_badges_in_tabs(lines: &mut [String]) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r#"<a href="([^"]*?)"><span class="fa (.*?)">"#);

    for line in lines.iter_mut() {
        let fixed = re.replace_all(
            line,
            r#"<a href="$1" target="_blank"><span class="fa $2">"#,
        );
        *line = fixed.into_owned();
    }
}

/// Adds a `title` tooltip to share badges for known services.
pub fn add_share_tooltips(lines: &mut [String]) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r#"<a href="([^"]*?)" (.*?)><span class="fa (.*?)">"#);

    for line in lines.iter_mut() {
        let fixed = re.replace_all(line, |caps: &Captures<'_>| {
            let url = &caps[1];
            match TOOLTIPS.iter().find(|(service, _)| url.contains(service)) {
                Some((_, title)) => format!(
                    "<a href=\"{}\" {} title=\"{}\"><span class=\"fa {}\">",
                    url, &caps[2], title, &caps[3]
                ),
                None => caps[0].to_string(),
            }
        });
        *line = fixed.into_owned();
    }
}

/// Puts each `<meta>` tag in `<head>` on its own line when more than two
/// share a line.
pub fn split_meta_lines(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    let mut in_head = false;

    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with("<head>") {
            in_head = true;
        }
        if in_head
            && trimmed.starts_with("<meta")
            && line.matches("<meta").count() > 2
        {
            let indent = indentation(&line);
            out.extend(
                line.split("<meta")
                    .skip(1)
                    .map(|tag| format!("{}<meta {}", indent, tag.trim())),
            );
        } else {
            if trimmed.starts_with("</head>") {
                in_head = false;
            }
            out.push(line);
        }
    }
    out
}

/// Writes one-line `<ul>...</ul>` lists with one item per line.
pub fn split_inline_lists(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());

    for line in lines {
        let trimmed = line.trim();
        if !(trimmed.starts_with("<ul>") && trimmed.ends_with("</ul>")) {
            out.push(line);
            continue;
        }
        let indent = indentation(&line);
        let items = line.replace("<ul>", "").replace("</ul>", "");
        out.push(format!("{}<ul>", indent));
        out.extend(
            items
                .trim()
                .split("<li>")
                .filter(|item| !item.is_empty())
                .map(|item| format!("{}  <li>{}", indent, item)),
        );
        out.push(format!("{}</ul>", indent));
    }
    out
}

fn indentation(line: &str) -> &str {
    &line[..line.len() - line.trim_start_matches(' ').len()]
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| {
        Regex::new(pattern).expect("postprocessing pattern is valid")
    })
}
