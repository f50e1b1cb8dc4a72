//! # Templates
//!
//! Templates are plain text files found through the cascading resolver.
//! Rendering copies the file through and replaces three kinds of marker:
//!
//! - `{{ child:NAME }}` - the rendered child slot `NAME`
//! - `{{ config:DOTTED.PATH }}` - a config scalar, HTML-escaped
//! - `{{ data:KEY }}` - a value assigned to the block or view, HTML-escaped
//!
//! Anything else between braces is emitted unchanged.

use crate::error::{Error, Result};
use crate::resolve::{FileSystem, PathResolver};
use std::fs;
use std::path::{Path, PathBuf};

/// Finds template files of one kind below a base directory
#[derive(Debug, Clone)]
pub struct TemplateLocator {
    kind: &'static str,
    base: PathBuf,
    extension: String,
}

impl TemplateLocator {
    /// Create a locator; `kind` names it in errors (`layout`, `template`, `error page`)
    pub fn new(kind: &'static str, base: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            kind,
            base: base.into(),
            extension: extension.into(),
        }
    }

    /// The directory searched
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve a logical template path, if a file exists for it
    #[must_use]
    pub fn find(&self, logical: &str) -> Option<PathBuf> {
        PathResolver::new(&FileSystem, &self.base, &self.extension)
            .resolve(logical)
            .ok()
            .map(|resolved| resolved.path)
    }

    /// Resolve a logical template path that must exist
    ///
    /// # Errors
    ///
    /// Returns `Error::TemplateNotFound` when nothing resolves.
    pub fn require(&self, logical: &str) -> Result<PathBuf> {
        self.find(logical).ok_or_else(|| Error::TemplateNotFound {
            kind: self.kind,
            path: self.base.join(logical).display().to_string(),
        })
    }
}

/// Supplies marker values while a template renders
pub trait Markers {
    /// HTML of the child slot `slot`
    fn child_html(&self, slot: &str) -> Result<String>;

    /// Config scalar at `path`
    fn config(&self, path: &str) -> Option<String>;

    /// Assigned value under `key`
    fn data(&self, key: &str) -> Option<String>;
}

/// Read `path` and expand its markers
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read, or whatever a child slot fails with.
pub fn render_file(path: &Path, markers: &dyn Markers) -> Result<String> {
    let source = fs::read_to_string(path)?;
    expand(&source, markers)
}

/// Expand the markers of `source`
///
/// # Errors
///
/// Propagates failures from rendering child slots.
pub fn expand(source: &str, markers: &dyn Markers) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };
        let raw = &rest[open..open + 2 + close + 2];
        let inner = after[..close].trim();

        match inner.split_once(':').map(|(k, v)| (k.trim(), v.trim())) {
            Some(("child", slot)) => out.push_str(&markers.child_html(slot)?),
            Some(("config", path)) => {
                out.push_str(&escape_html(&markers.config(path).unwrap_or_default()));
            }
            Some(("data", key)) => {
                out.push_str(&escape_html(&markers.data(key).unwrap_or_default()));
            }
            _ => out.push_str(raw),
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Escape the five HTML-significant characters
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
