//! # Blocks
//!
//! A block is a renderable unit bound to a template file. Named blocks can
//! be registered with a [`View`](crate::view::View) and retrieved later;
//! anonymous blocks render the same way but can only be addressed by the
//! [`BlockId`](crate::view::BlockId) they were given.
//!
//! Reusable blocks are registered with the framework as factories; a
//! factory typically names the block and points it at its template:
//!
//! ```ignore
//! builder.block("head", |templates| {
//!     Block::named("head").with_template(templates, "shared.head")
//! });
//! ```

use crate::compress::compress_html;
use crate::error::Result;
use crate::registry::Registry;
use crate::template::{render_file, Markers, TemplateLocator};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Builds a block, given the locator for block templates
pub type BlockFactory = Arc<dyn Fn(&TemplateLocator) -> Block + Send + Sync>;

/// Block factories keyed by label
pub type BlockRegistry = Registry<BlockFactory>;

/// A named or anonymous renderable unit
#[derive(Debug, Clone, Default)]
pub struct Block {
    name: Option<String>,
    template: Option<PathBuf>,
    compress: bool,
    data: Map<String, Value>,
}

impl Block {
    /// An anonymous block with no template
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A block carrying `name`
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// The block name, if it has one
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name an anonymous block; a block that already has a name keeps it
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        if self.name.is_none() {
            self.name = Some(name.into());
        }
        self
    }

    /// Point the block at a template; an unresolved path leaves it rendering nothing
    pub fn set_template(&mut self, templates: &TemplateLocator, path: &str) -> &mut Self {
        self.template = templates.find(path);
        if self.template.is_none() {
            debug!(template = %path, block = ?self.name, "Block template not found, block renders empty");
        }
        self
    }

    /// Builder form of [`Block::set_template`]
    #[must_use]
    pub fn with_template(mut self, templates: &TemplateLocator, path: &str) -> Self {
        self.set_template(templates, path);
        self
    }

    /// The resolved template file
    #[must_use]
    pub fn template(&self) -> Option<&Path> {
        self.template.as_deref()
    }

    /// Turn whitespace compression of this block's output on or off (off by default)
    pub fn compress_output(&mut self, compress: bool) -> &mut Self {
        self.compress = compress;
        self
    }

    /// Make `value` available to the template as `{{ data:KEY }}`
    pub fn assign(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// A value previously assigned to this block
    #[must_use]
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Render the template; a block without a template renders an empty string
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` when the template cannot be read, or any failure
    /// raised while rendering nested slots.
    pub fn html(&self, markers: &dyn Markers) -> Result<String> {
        let Some(template) = &self.template else {
            return Ok(String::new());
        };
        let html = render_file(template, markers)?;
        Ok(if self.compress {
            compress_html(&html)
        } else {
            html
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct NoMarkers;

    impl Markers for NoMarkers {
        fn child_html(&self, _slot: &str) -> Result<String> {
            Ok(String::new())
        }

        fn config(&self, _path: &str) -> Option<String> {
            None
        }

        fn data(&self, _key: &str) -> Option<String> {
            None
        }
    }

    fn templates(dir: &TempDir) -> TemplateLocator {
        fs::create_dir_all(dir.path().join("shared")).unwrap();
        fs::write(
            dir.path().join("shared/head.html"),
            "<head>\n  <title>x</title>\n</head>",
        )
        .unwrap();
        TemplateLocator::new("template", dir.path(), ".html")
    }

    #[test]
    fn test_name_is_set_once() {
        let mut block = Block::anonymous();
        assert_eq!(block.name(), None);
        block.set_name("head");
        block.set_name("other");
        assert_eq!(block.name(), Some("head"));
    }

    #[test]
    fn test_missing_template_renders_empty() {
        let dir = TempDir::new().unwrap();
        let templates = templates(&dir);
        let block = Block::named("x").with_template(&templates, "does.not.exist");
        assert!(block.template().is_none());
        assert_eq!(block.html(&NoMarkers).unwrap(), "");
    }

    #[test]
    fn test_renders_template() {
        let dir = TempDir::new().unwrap();
        let templates = templates(&dir);
        let block = Block::named("head").with_template(&templates, "shared.head");
        assert_eq!(
            block.html(&NoMarkers).unwrap(),
            "<head>\n  <title>x</title>\n</head>"
        );
    }

    #[test]
    fn test_compressed_output() {
        let dir = TempDir::new().unwrap();
        let templates = templates(&dir);
        let mut block = Block::named("head").with_template(&templates, "shared.head");
        block.compress_output(true);
        assert_eq!(block.html(&NoMarkers).unwrap(), "<head><title>x</title></head>");
    }

    #[test]
    fn test_assigned_data() {
        let mut block = Block::named("x");
        block.assign("title", "Home").assign("count", 3);
        assert_eq!(block.data("title"), Some(&Value::from("Home")));
        assert_eq!(block.data("count"), Some(&Value::from(3)));
        assert_eq!(block.data("missing"), None);
    }
}
