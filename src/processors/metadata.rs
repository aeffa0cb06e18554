//! # Metadata Module
//!
//! Loads document metadata: the YAML front matter of a source document
//! merged over the site defaults from `config.toml`, plus fields derived
//! from the document's path.
//!
//! Results are cached per path inside a [`MetadataLoader`]; a document's
//! metadata is computed at most once per loader and never changes after.
//!
//! The module also owns the front-matter serializer used to hand metadata
//! back to the external renderer ([`write_front_matter`]). Numbered titles
//! such as `3. Three things` are written as `3// Three things` when
//! obfuscation is requested, because the renderer would otherwise read them
//! as list items. The HTML postprocessor reverses this encoding.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use log::debug;
use parking_lot::RwLock;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::content::{Document, BLOCK_OPENER, BLOCK_TERMINATOR};
use crate::core::config::{sanity_check, SiteConfig};
use crate::core::error::{BasslineError, Result};
use crate::core::url::{absolute_url, quote, relative_url};

/// Keys whose values are written as folded block scalars.
const BLOCK_KEYS: [&str; 3] = ["schemameta", "ogmeta", "cardmeta"];

/// Config key listing the index files scanned for `posted-in`.
const POSTED_IN_SOURCES: &str = "posted-in-sources";

/// One document's merged metadata.
///
/// The named fields are the keys the pipeline reads or writes; every other
/// key (site defaults and custom front matter alike) is kept in
/// [`extra`](Metadata::extra) and passed through to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Metadata {
    /// Document title, possibly numbered (`N. Title`).
    #[serde(default, deserialize_with = "scalar_string")]
    pub title: Option<String>,
    /// Absolute URL of the document.
    #[serde(default, deserialize_with = "scalar_string")]
    pub permalink: Option<String>,
    /// Root-relative URL of the document.
    #[serde(default, deserialize_with = "scalar_string")]
    pub rellink: Option<String>,
    /// Base URL of the published site.
    #[serde(default, deserialize_with = "scalar_string")]
    pub site_url: Option<String>,
    /// Path of the site below its domain, without surrounding slashes.
    #[serde(default, deserialize_with = "scalar_string")]
    pub web_root: Option<String>,
    /// Host (and port) of the published site.
    #[serde(default, deserialize_with = "scalar_string")]
    pub domain_name: Option<String>,
    /// Lead image, rooted or absolute.
    #[serde(default, deserialize_with = "scalar_string")]
    pub image: Option<String>,
    /// Caption of the lead image.
    #[serde(default, deserialize_with = "scalar_string")]
    pub caption: Option<String>,
    /// Whether the page publishes a feed.
    #[serde(default, deserialize_with = "scalar_bool")]
    pub showrss: Option<bool>,
    /// Root-relative URL of the page's feed.
    #[serde(default, deserialize_with = "scalar_string")]
    pub rssurl: Option<String>,
    /// Set on the first entry of a composed page only.
    #[serde(default, deserialize_with = "scalar_bool")]
    pub first_entry: Option<bool>,
    /// Page template.
    #[serde(default, deserialize_with = "scalar_string")]
    pub template: Option<String>,
    /// Twitter handle without the leading `@`.
    #[serde(default, deserialize_with = "scalar_string")]
    pub twitter_name: Option<String>,
    /// Quoted, comma-separated profile URLs.
    #[serde(default, deserialize_with = "scalar_string")]
    pub social_profiles: Option<String>,
    /// Titles of the index pages listing this document.
    #[serde(default, deserialize_with = "scalar_string")]
    pub posted_in: Option<String>,
    /// `posted-in` as a list of links.
    #[serde(default, deserialize_with = "scalar_string")]
    pub posted_in_html: Option<String>,
    /// Title percent-encoded for URLs.
    #[serde(default, deserialize_with = "scalar_string")]
    pub encoded_title: Option<String>,
    /// Permalink percent-encoded for URLs.
    #[serde(default, deserialize_with = "scalar_string")]
    pub quoted_permalink: Option<String>,
    /// All remaining keys.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Metadata {
    /// Builds metadata from a merged key/value mapping.
    pub fn from_map(map: Map<String, JsonValue>, path: &Path) -> Result<Self> {
        serde_json::from_value(JsonValue::Object(map)).map_err(|e| {
            BasslineError::metadata_error(
                format!("invalid metadata: {}", e),
                path,
            )
        })
    }

    /// Returns all fields as an ordered mapping. Unset fields are omitted.
    pub fn to_map(&self) -> Map<String, JsonValue> {
        match serde_json::to_value(self) {
            Ok(JsonValue::Object(map)) => map
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .collect(),
            _ => Map::new(),
        }
    }

    /// Returns a single field by its metadata key.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.to_map().remove(key)
    }
}

/// Loads and caches document metadata.
#[derive(Debug, Default)]
pub struct MetadataLoader {
    cache: RwLock<HashMap<PathBuf, Arc<Metadata>>>,
}

impl MetadataLoader {
    /// Creates a loader with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metadata of the document at `path`, relative to the
    /// site root.
    ///
    /// # Errors
    ///
    /// - `MetadataError` for an unterminated or unparsable block, or a
    ///   missing `posted-in` source;
    /// - `ValidationError` when a field breaks an invariant;
    /// - `PathError` when no URL can be derived from `path`.
    pub fn load(
        &self,
        config: &SiteConfig,
        path: &Path,
    ) -> Result<Arc<Metadata>> {
        if let Some(meta) = self.cache.read().get(path) {
            debug!("Metadata cache hit for {:?}", path);
            return Ok(Arc::clone(meta));
        }

        debug!("Loading metadata for {:?}", path);
        let meta = Arc::new(compute(config, path)?);

        let mut cache = self.cache.write();
        let entry = cache
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&meta));
        Ok(Arc::clone(entry))
    }

    /// Returns a single metadata value of the document at `path`.
    pub fn get(
        &self,
        config: &SiteConfig,
        path: &Path,
        key: &str,
    ) -> Result<Option<JsonValue>> {
        Ok(self.load(config, path)?.get(key))
    }

    /// Number of documents currently cached.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

/// Writes `meta` as a front-matter block.
///
/// Strings are double-quoted with line breaks removed; `true` is written
/// bare while `false` and empty values are skipped. Lists and mappings are
/// written in flow style. With `obfuscate`, a numbered title is encoded
/// with [`obfuscate_title`].
pub fn write_front_matter(
    meta: &Metadata,
    out: &mut dyn Write,
    obfuscate: bool,
) -> io::Result<()> {
    writeln!(out, "{}", BLOCK_OPENER)?;

    for (key, value) in meta.to_map() {
        match value {
            JsonValue::String(text) if BLOCK_KEYS.contains(&key.as_str()) => {
                writeln!(out, "{}: >\n    {}", key, text.replace('\n', "\n    "))?;
            }
            JsonValue::String(text) => {
                let text = if obfuscate && key == "title" {
                    obfuscate_title(&text)
                } else {
                    text
                };
                if !text.trim().is_empty() {
                    writeln!(out, "{}: {}", key, quote_yaml(&text))?;
                }
            }
            JsonValue::Bool(true) => writeln!(out, "{}: true", key)?,
            JsonValue::Number(number) => {
                writeln!(out, "{}: \"{}\"", key, number)?;
            }
            value @ (JsonValue::Array(_) | JsonValue::Object(_)) => {
                writeln!(out, "{}: {}", key, value)?;
            }
            JsonValue::Bool(false) | JsonValue::Null => {}
        }
    }

    writeln!(out, "{}", BLOCK_TERMINATOR)
}

/// Encodes a numbered title `N. rest` as `N// rest`. Other titles are
/// returned unchanged.
pub fn obfuscate_title(title: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(\d+)\. (.*)").expect("numbered title pattern is valid")
    });
    re.replace(title, "$1// $2").into_owned()
}

fn compute(config: &SiteConfig, path: &Path) -> Result<Metadata> {
    let full_path = config.root.join(path);
    let document = Document::read(&full_path)?;

    let mut fields = config.defaults.clone();
    if let Some(block) = &document.front_matter {
        for (key, value) in parse_block(block, path)? {
            _ = fields.insert(key, value);
        }
    }

    let rellink = relative_url(path)?;
    let permalink = match config.site_url() {
        Some(site_url) => absolute_url(path, site_url)?,
        None => rellink.clone(),
    };
    _ = fields.insert(
        "quoted-permalink".to_string(),
        JsonValue::String(quote(&permalink)),
    );
    _ = fields.insert("permalink".to_string(), JsonValue::String(permalink));
    _ = fields.insert("rellink".to_string(), JsonValue::String(rellink));

    if let Some(title) = fields.get("title").and_then(scalar_text) {
        _ = fields.insert(
            "encoded-title".to_string(),
            JsonValue::String(quote(&title)),
        );
    }

    if let Some(sources) =
        config.get(POSTED_IN_SOURCES).and_then(JsonValue::as_str)
    {
        let backlinks = posted_in(config, path, sources)?;
        if !backlinks.is_empty() {
            let titles: Vec<&str> =
                backlinks.iter().map(|(title, _)| title.as_str()).collect();
            let links: Vec<String> = backlinks
                .iter()
                .map(|(title, url)| format!("<a href=\"{}\">{}</a>", url, title))
                .collect();
            _ = fields.insert(
                "posted-in".to_string(),
                JsonValue::String(titles.join(", ")),
            );
            _ = fields.insert(
                "posted-in-html".to_string(),
                JsonValue::String(links.join(", ")),
            );
        }
    }

    sanity_check(&mut fields, &config.root, path)?;
    Metadata::from_map(fields, path)
}

/// Parses a front-matter block into a mapping. An empty block yields an
/// empty mapping.
pub(crate) fn parse_block(
    block: &str,
    path: &Path,
) -> Result<Map<String, JsonValue>> {
    let value: JsonValue = serde_yml::from_str(block).map_err(|e| {
        BasslineError::metadata_error(
            format!("failed to parse front matter: {}", e),
            path,
        )
    })?;
    match value {
        JsonValue::Object(map) => Ok(map),
        JsonValue::Null => Ok(Map::new()),
        _ => Err(BasslineError::metadata_error(
            "front matter is not a key/value mapping",
            path,
        )),
    }
}

/// Finds the configured index files that mention `path`, returning each
/// one's title and relative URL.
fn posted_in(
    config: &SiteConfig,
    path: &Path,
    sources: &str,
) -> Result<Vec<(String, String)>> {
    let needle = path.to_string_lossy();
    let mut backlinks = Vec::new();

    for source in sources.split(',').map(str::trim).filter(|s| !s.is_empty())
    {
        let source = Path::new(source);
        if source == path {
            continue;
        }
        let raw = std::fs::read_to_string(config.root.join(source)).map_err(
            |e| {
                BasslineError::metadata_error(
                    format!(
                        "cannot read posted-in source '{}': {}",
                        source.display(),
                        e
                    ),
                    path,
                )
            },
        )?;
        if !raw.contains(needle.as_ref()) {
            continue;
        }

        let url = relative_url(source)?;
        let title = match Document::parse(&raw, source)?.front_matter {
            Some(block) => parse_block(&block, source)?
                .get("title")
                .and_then(scalar_text),
            None => None,
        };
        backlinks.push((title.unwrap_or_else(|| url.clone()), url));
    }

    Ok(backlinks)
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn quote_yaml(text: &str) -> String {
    let escaped = text
        .trim()
        .replace('\n', "")
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn scalar_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, <D as Deserializer<'de>>::Error>
where
    D: Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => scalar_text(&value).map(Some).ok_or_else(|| {
            D::Error::custom(format!("expected a scalar, found {}", value))
        }),
    }
}

fn scalar_bool<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<bool>, <D as Deserializer<'de>>::Error>
where
    D: Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Bool(b)) => Ok(Some(b)),
        Some(JsonValue::String(s)) => {
            match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Some(true)),
                "false" | "no" | "off" | "0" | "" => Ok(Some(false)),
                other => Err(D::Error::custom(format!(
                    "expected a boolean, found '{}'",
                    other
                ))),
            }
        }
        Some(value) => Err(D::Error::custom(format!(
            "expected a boolean, found {}",
            value
        ))),
    }
}
