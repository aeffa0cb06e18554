//! # URL Rules
//!
//! Maps source documents to the URLs they are published at, and quotes
//! strings for embedding in URLs.
//!
//! A source path such as `markdown/blog/first-post.md` is published as
//! `/blog/first-post.html`: the source-root segment is dropped, the
//! extension becomes `.html` (page specifications ending in `.md.in` are
//! treated the same way) and a trailing `index.html` is removed so that
//! section pages resolve to their directory.

use std::path::{Component, Path};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::core::error::{BasslineError, Result};

/// Characters left unescaped when quoting: ASCII alphanumerics and
/// `-_.~`. Everything else, including `/`, is percent-encoded.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Returns the root-relative URL (leading `/`) that `path` is published at.
///
/// # Errors
///
/// Returns a `PathError` when the path has no segment below its source
/// root or is not valid UTF-8.
pub fn relative_url(path: &Path) -> Result<String> {
    let mut segments = Vec::new();
    let mut seen_root = false;

    for component in path.components() {
        match component {
            Component::Normal(part) => {
                if !seen_root {
                    seen_root = true;
                    continue;
                }
                let part = part.to_str().ok_or_else(|| {
                    BasslineError::path_error(
                        "path is not valid UTF-8",
                        path,
                    )
                })?;
                segments.push(part);
            }
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(BasslineError::path_error(
                    "path must be relative to the site root",
                    path,
                ));
            }
        }
    }

    let file_name = segments.pop().ok_or_else(|| {
        BasslineError::path_error(
            "path has no file below the source root",
            path,
        )
    })?;
    let file_name = html_name(file_name);

    let mut url = String::from("/");
    for segment in segments {
        url.push_str(segment);
        url.push('/');
    }
    if file_name != "index.html" {
        url.push_str(&file_name);
    }
    Ok(url)
}

/// Returns the absolute URL of `path`, resolved against `site_url`.
///
/// The resolution follows URL joining rules: with
/// `site_url = "https://example.org/blog/"` the document
/// `markdown/a/b.md` becomes `https://example.org/blog/a/b.html`.
pub fn absolute_url(path: &Path, site_url: &str) -> Result<String> {
    let relative = relative_url(path)?;
    let base = Url::parse(site_url).map_err(|e| {
        BasslineError::config_error(
            format!("Invalid site-url '{}': {}", site_url, e),
            None,
        )
    })?;
    let joined = base
        .join(relative.trim_start_matches('/'))
        .map_err(|e| {
            BasslineError::path_error(
                format!("cannot resolve against site-url: {}", e),
                path,
            )
        })?;
    Ok(joined.to_string())
}

/// Derives the feed URL for a page from its relative URL: directory URLs
/// get `index.html` appended, then `.html` becomes `.xml`.
pub fn rss_url(relative: &str) -> String {
    let page = if relative.ends_with(".html") {
        relative.to_string()
    } else if relative.ends_with('/') {
        format!("{}index.html", relative)
    } else {
        format!("{}/index.html", relative)
    };
    match page.strip_suffix(".html") {
        Some(stem) => format!("{}.xml", stem),
        None => page,
    }
}

/// Percent-encodes `value` for use as a single URL component.
pub fn quote(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Splits a `site-url` into its `(domain-name, web-root)` pair.
///
/// The web root is the URL path with its leading and trailing slashes
/// removed, so `https://example.github.io/blog/` yields
/// `("example.github.io", "blog")` and a bare host yields an empty web root.
pub fn split_site_url(site_url: &str) -> Result<(String, String)> {
    let url = Url::parse(site_url).map_err(|e| {
        BasslineError::config_error(
            format!("Invalid site-url '{}': {}", site_url, e),
            None,
        )
    })?;
    let domain = match url.port() {
        Some(port) => {
            format!("{}:{}", url.host_str().unwrap_or_default(), port)
        }
        None => url.host_str().unwrap_or_default().to_string(),
    };
    let web_root = url.path().trim_matches('/').to_string();
    Ok((domain, web_root))
}

fn html_name(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".in").unwrap_or(file_name);
    match stem.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() => format!("{}.html", base),
        _ => format!("{}.html", stem),
    }
}
