//! # Content Processors Module
//!
//! Text-level processing of source documents before they reach the
//! renderer.
//!
//! ## Available Processors
//!
//! - [`metadata`]: front matter merged over site defaults, cached per path,
//!   and serialized back out for the renderer
//! - [`namespace`]: per-entry rewriting of reference labels, footnote
//!   removal and excerpt truncation
//!
//! ## Usage
//!
//! ```rust
//! use bassline::processors::metadata::Metadata;
//! use bassline::processors::namespace;
//!
//! let meta = Metadata {
//!     permalink: Some("/blog/first.html".to_string()),
//!     ..Metadata::default()
//! };
//! let body = vec!["See [the docs][d].".to_string()];
//!
//! let lines = namespace::process(&body, &meta, 1);
//! assert_eq!(lines, vec!["See [the docs][1:d]."]);
//! ```

/// Document metadata loading and serialization.
pub mod metadata;

/// Reference namespacing for composed pages.
pub mod namespace;
