//! # Configuration Module
//!
//! Site configuration for Bassline. A site keeps a single `config.toml` at
//! its root. Every key in it becomes a metadata default that is merged
//! under each document's front matter, with two exceptions:
//!
//! - table names are discarded, so `[site] title = "x"` and a top-level
//!   `title = "x"` are the same default;
//! - the reserved `[build]` table configures the pipeline itself and is
//!   parsed into a typed [`BuildConfig`].
//!
//! ## Example
//!
//! ```toml
//! [site]
//! site-url = "https://example.github.io/blog/"
//! title = "Field Notes"
//! twitter-name = "@fieldnotes"
//!
//! [build]
//! renderer = "pandoc"
//! entry-template = "templates/entry.html5"
//! ```
//!
//! The configuration is read once and memoized by [`ConfigStore`]; derived
//! keys `domain-name` and `web-root` are computed from `site-url` at load.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use toml::Value as TomlValue;

use crate::core::error::{BasslineError, Result};
use crate::core::url::split_site_url;

/// Name of the site configuration file, relative to the site root.
pub const CONFIG_FILE: &str = "config.toml";

/// Name of the reserved table holding [`BuildConfig`].
const BUILD_TABLE: &str = "build";

/// Pipeline settings read from the `[build]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildConfig {
    #[serde(default = "default_source_dir")]
    /// Source root that every page path must start with.
    pub source_dir: PathBuf,

    #[serde(default = "default_extension")]
    /// Extension (without the dot) of includable content files.
    pub extension: String,

    #[serde(default = "default_renderer")]
    /// Program invoked to convert markdown to HTML.
    pub renderer: String,

    #[serde(default = "default_entry_template")]
    /// Template used for entries of composed pages.
    pub entry_template: PathBuf,

    #[serde(default)]
    /// Directory for per-entry temporary documents. Defaults to the
    /// system temporary directory.
    pub temp_dir: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            extension: default_extension(),
            renderer: default_renderer(),
            entry_template: default_entry_template(),
            temp_dir: None,
        }
    }
}

/// A loaded site configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Path the configuration was read from.
    pub path: PathBuf,
    /// Directory that relative paths in the configuration resolve against.
    pub root: PathBuf,
    /// Pipeline settings.
    pub build: BuildConfig,
    /// Metadata defaults, in file order, including the derived
    /// `domain-name` and `web-root`.
    pub defaults: Map<String, JsonValue>,
}

impl SiteConfig {
    /// Parses configuration text read from `path`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for malformed TOML or an invalid `[build]`
    /// table, and a `ValidationError` when a default breaks a metadata
    /// invariant.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let table: toml::Table = toml::from_str(content).map_err(|e| {
            BasslineError::config_error(
                format!("Failed to parse config file: {}", e),
                Some(path.to_path_buf()),
            )
        })?;

        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut build = BuildConfig::default();
        let mut defaults = Map::new();

        for (key, value) in table {
            match value {
                TomlValue::Table(section) if key == BUILD_TABLE => {
                    build = TomlValue::Table(section).try_into().map_err(
                        |e| {
                            BasslineError::config_error(
                                format!("Invalid [build] table: {}", e),
                                Some(path.to_path_buf()),
                            )
                        },
                    )?;
                }
                TomlValue::Table(section) => {
                    for (key, value) in section {
                        _ = defaults.insert(key, toml_to_json(value));
                    }
                }
                value => {
                    _ = defaults.insert(key, toml_to_json(value));
                }
            }
        }

        if let Some(site_url) =
            defaults.get("site-url").and_then(JsonValue::as_str)
        {
            let (domain, web_root) = split_site_url(site_url)?;
            _ = defaults
                .insert("domain-name".to_string(), JsonValue::String(domain));
            _ = defaults
                .insert("web-root".to_string(), JsonValue::String(web_root));
        }

        sanity_check(&mut defaults, &root, path)?;

        Ok(Self {
            path: path.to_path_buf(),
            root,
            build,
            defaults,
        })
    }

    /// Returns the default for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.defaults.get(key)
    }

    /// Returns the configured `site-url`, if any.
    pub fn site_url(&self) -> Option<&str> {
        self.get("site-url").and_then(JsonValue::as_str)
    }

    /// Returns the derived `web-root` (empty when unset).
    pub fn web_root(&self) -> &str {
        self.get("web-root").and_then(JsonValue::as_str).unwrap_or("")
    }
}

/// Lazily loads and memoizes the site configuration.
///
/// The first successful [`load`](ConfigStore::load) reads the file; later
/// calls return the same [`SiteConfig`] until [`reset`](ConfigStore::reset)
/// or [`reload`](ConfigStore::reload) is called.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    cached: RwLock<Option<Arc<SiteConfig>>>,
}

impl ConfigStore {
    /// Creates a store for the configuration file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cached: RwLock::new(None),
        }
    }

    /// Creates a store that serves an already parsed configuration.
    pub fn with_config(config: SiteConfig) -> Self {
        Self {
            path: config.path.clone(),
            cached: RwLock::new(Some(Arc::new(config))),
        }
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration, reading it on first use.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the file is absent or malformed.
    pub fn load(&self) -> Result<Arc<SiteConfig>> {
        if let Some(config) = self.cached.read().as_ref() {
            return Ok(Arc::clone(config));
        }

        let mut cached = self.cached.write();
        if let Some(config) = cached.as_ref() {
            return Ok(Arc::clone(config));
        }

        let config = Arc::new(load_from_file(&self.path)?);
        *cached = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Returns a single default value.
    pub fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        Ok(self.load()?.get(key).cloned())
    }

    /// Forgets the memoized configuration.
    pub fn reset(&self) {
        debug!("Resetting configuration cache for {:?}", self.path);
        *self.cached.write() = None;
    }

    /// Discards the memoized configuration and reads it again.
    pub fn reload(&self) -> Result<Arc<SiteConfig>> {
        self.reset();
        self.load()
    }
}

/// Applies the value fixups and invariants shared by config defaults and
/// document metadata.
///
/// - `template` must name an existing file (relative to `root`);
/// - `image` must start with `/`, `http://` or `https://`;
/// - a leading `@` is removed from `twitter-name`;
/// - each element of the comma-separated `social-profiles` is quoted.
pub(crate) fn sanity_check(
    fields: &mut Map<String, JsonValue>,
    root: &Path,
    source: &Path,
) -> Result<()> {
    if let Some(template) = fields.get("template").and_then(JsonValue::as_str)
    {
        if !root.join(template).is_file() {
            return Err(BasslineError::validation_error(
                format!("template '{}' does not exist", template),
                source,
            ));
        }
    }

    if let Some(image) = fields.get("image") {
        let image = image.as_str().unwrap_or_default();
        let allowed = ["/", "http://", "https://"];
        if !allowed.iter().any(|prefix| image.starts_with(prefix)) {
            return Err(BasslineError::validation_error(
                format!(
                    "image '{}' must start with '/', 'http://' or 'https://'",
                    image
                ),
                source,
            ));
        }
    }

    if let Some(JsonValue::String(name)) = fields.get_mut("twitter-name") {
        if let Some(stripped) = name.strip_prefix('@') {
            *name = stripped.to_string();
        }
    }

    if let Some(JsonValue::String(profiles)) =
        fields.get_mut("social-profiles")
    {
        *profiles = profiles
            .split(',')
            .map(|p| format!("\"{}\"", p.trim_matches(|c| c == '"' || c == ' ')))
            .collect::<Vec<_>>()
            .join(", ");
    }

    Ok(())
}

// Internal helper functions

fn load_from_file(path: &Path) -> Result<SiteConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        BasslineError::config_error(
            format!("Failed to read config file: {}", e),
            Some(path.to_path_buf()),
        )
    })?;
    let config = SiteConfig::parse(&content, path)?;
    info!(
        "Loaded {} configuration defaults from {:?}",
        config.defaults.len(),
        path
    );
    Ok(config)
}

fn toml_to_json(value: TomlValue) -> JsonValue {
    match value {
        TomlValue::String(s) => JsonValue::String(s),
        TomlValue::Integer(i) => JsonValue::from(i),
        TomlValue::Float(f) => JsonValue::from(f),
        TomlValue::Boolean(b) => JsonValue::Bool(b),
        TomlValue::Datetime(d) => JsonValue::String(d.to_string()),
        TomlValue::Array(items) => {
            JsonValue::Array(items.into_iter().map(toml_to_json).collect())
        }
        TomlValue::Table(table) => JsonValue::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

// Default value functions
fn default_source_dir() -> PathBuf {
    PathBuf::from("markdown")
}

fn default_extension() -> String {
    "md".to_string()
}

fn default_renderer() -> String {
    "pandoc".to_string()
}

fn default_entry_template() -> PathBuf {
    PathBuf::from("templates/entry.html5")
}

/// Tests for the configuration module.
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[site]
site-url = "https://example.github.io/blog/"
title = "Field Notes"
twitter-name = "@fieldnotes"
social-profiles = "https://a.example, \"https://b.example\""

[build]
renderer = "my-pandoc"
"#;

    #[test]
    fn test_parse_flattens_sections_and_derives_fields() {
        let config =
            SiteConfig::parse(SAMPLE, Path::new("site/config.toml")).unwrap();

        assert_eq!(config.root, PathBuf::from("site"));
        assert_eq!(config.site_url(), Some("https://example.github.io/blog/"));
        assert_eq!(config.get("title").unwrap(), "Field Notes");
        assert_eq!(config.get("domain-name").unwrap(), "example.github.io");
        assert_eq!(config.web_root(), "blog");
        assert_eq!(config.get("twitter-name").unwrap(), "fieldnotes");
        assert_eq!(
            config.get("social-profiles").unwrap(),
            "\"https://a.example\", \"https://b.example\""
        );
        assert!(config.get("build").is_none());
    }

    #[test]
    fn test_build_table_defaults() {
        let config =
            SiteConfig::parse(SAMPLE, Path::new("config.toml")).unwrap();
        assert_eq!(config.build.renderer, "my-pandoc");
        assert_eq!(config.build.source_dir, PathBuf::from("markdown"));
        assert_eq!(config.build.extension, "md");
        assert_eq!(
            config.build.entry_template,
            PathBuf::from("templates/entry.html5")
        );
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let err = SiteConfig::parse("title = ", Path::new("config.toml"))
            .unwrap_err();
        assert!(matches!(err, BasslineError::ConfigError { .. }));
    }

    #[test]
    fn test_missing_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::new(temp_dir.path().join(CONFIG_FILE));
        let err = store.load().unwrap_err();
        assert!(matches!(err, BasslineError::ConfigError { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_load_is_memoized_until_reset() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "title = 'First'").unwrap();

        let store = ConfigStore::new(&path);
        assert_eq!(store.get("title").unwrap().unwrap(), "First");

        fs::write(&path, "title = 'Second'").unwrap();
        assert_eq!(store.get("title").unwrap().unwrap(), "First");

        store.reset();
        assert_eq!(store.get("title").unwrap().unwrap(), "Second");

        fs::write(&path, "title = 'Third'").unwrap();
        assert_eq!(store.reload().unwrap().get("title").unwrap(), "Third");
    }

    #[test]
    fn test_missing_template_fails_validation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        let err = SiteConfig::parse("template = 'templates/none.html5'", &path)
            .unwrap_err();
        assert!(matches!(err, BasslineError::ValidationError { .. }));
    }
}
