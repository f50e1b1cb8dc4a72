//! # View Composition
//!
//! The view owns every block created during a request, a registry of the
//! named ones, and a tree of child slots that templates pull from with
//! `{{ child:NAME }}`.
//!
//! ## Rendering order
//!
//! `child_html(slot)` renders the block registered under the slot's own name
//! (if any) followed by the blocks attached to the slot in attachment order.
//! Nested slots render depth-first as templates reach them.
//!
//! ## Lifecycle
//!
//! The dispatcher calls [`View::finalize`] once the controller returns. It
//! renders the layout unless the view was already rendered or auto-render
//! was switched off, so a second call is always a no-op.

use crate::block::{Block, BlockRegistry};
use crate::compress::compress_html;
use crate::config::{scalar_to_string, ConfigStore};
use crate::error::{Error, Result};
use crate::template::{render_file, Markers, TemplateLocator};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maximum nesting of block and layout templates
pub const MAX_RENDER_DEPTH: usize = 32;

/// Handle to a block owned by a [`View`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(usize);

/// What a view needs from the framework
#[derive(Debug, Clone, Copy)]
pub struct ViewEnv<'f> {
    /// Registered block factories
    pub blocks: &'f BlockRegistry,
    /// Locator for block templates
    pub templates: &'f TemplateLocator,
    /// Locator for layout templates
    pub layouts: &'f TemplateLocator,
    /// Application config, for `{{ config:... }}` markers
    pub config: &'f ConfigStore,
}

/// Request-scoped block tree and layout
#[derive(Debug)]
pub struct View<'f> {
    env: ViewEnv<'f>,
    arena: Vec<Block>,
    named: HashMap<String, BlockId>,
    child_tree: HashMap<String, Vec<BlockId>>,
    layout: Option<PathBuf>,
    data: Map<String, Value>,
    compress: bool,
    rendered: bool,
    depth: Cell<usize>,
}

impl<'f> View<'f> {
    /// An empty view with compression on and auto-render enabled
    #[must_use]
    pub fn new(env: ViewEnv<'f>) -> Self {
        Self {
            env,
            arena: Vec::new(),
            named: HashMap::new(),
            child_tree: HashMap::new(),
            layout: None,
            data: Map::new(),
            compress: true,
            rendered: false,
            depth: Cell::new(0),
        }
    }

    /// The locator block templates are resolved with
    #[must_use]
    pub const fn templates(&self) -> &'f TemplateLocator {
        self.env.templates
    }

    /// Create a block from a registered factory, or an anonymous block labelled `label`
    ///
    /// A trailing `_block` on the label is ignored. When the factory names its
    /// block and a block of that name is already registered, the existing
    /// block is returned instead of a new one.
    pub fn create_block(&mut self, label: &str) -> BlockId {
        match self.instantiate(label) {
            Some(block) => self.register_or_existing(block),
            None => {
                debug!(label = %label, "No block factory, creating anonymous block");
                self.adopt(Block::named(label))
            }
        }
    }

    /// Like [`View::create_block`] but the factory must exist
    ///
    /// # Errors
    ///
    /// Returns `Error::ClassNotFound` when no factory resolves for `label`.
    pub fn create_registered_block(&mut self, label: &str) -> Result<BlockId> {
        let block = self.instantiate(label).ok_or_else(|| Error::ClassNotFound {
            kind: "block",
            name: label.to_string(),
        })?;
        Ok(self.register_or_existing(block))
    }

    /// Register a named block and open a slot of the same name
    ///
    /// # Errors
    ///
    /// Returns `Error::ViewConflict` if the block has no name or the name is taken.
    pub fn add_block(&mut self, block: Block) -> Result<BlockId> {
        let Some(name) = block.name() else {
            return Err(Error::ViewConflict {
                reason: "Blocks must be named in order to attach it to the view.".to_string(),
            });
        };
        if self.named.contains_key(name) {
            return Err(Error::ViewConflict {
                reason: format!(
                    "Block [{name}] already exists. Rename the block or attach it as an anonymous block."
                ),
            });
        }
        Ok(self.register(block))
    }

    /// Take ownership of a block without registering it
    pub fn adopt(&mut self, block: Block) -> BlockId {
        self.arena.push(block);
        BlockId(self.arena.len() - 1)
    }

    /// The registered block called `name`
    #[must_use]
    pub fn get_block(&self, name: &str) -> Option<BlockId> {
        self.named.get(name).copied()
    }

    /// Borrow a block
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.arena.get(id.0)
    }

    /// Borrow a block mutably
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.arena.get_mut(id.0)
    }

    /// Point a block at a template below the templates directory
    pub fn set_template(&mut self, id: BlockId, path: &str) -> &mut Self {
        let templates = self.env.templates;
        if let Some(block) = self.arena.get_mut(id.0) {
            block.set_template(templates, path);
        }
        self
    }

    /// Attach a block to a child slot, creating the slot on first use
    ///
    /// Attaching the same block to the same slot twice has no effect.
    pub fn attach_child(&mut self, slot: &str, id: BlockId) -> &mut Self {
        if id.0 >= self.arena.len() {
            return self;
        }
        let children = self.child_tree.entry(slot.to_string()).or_default();
        if !children.contains(&id) {
            children.push(id);
        }
        self
    }

    /// Attach the registered block called `name` to a child slot
    ///
    /// Returns whether such a block exists.
    pub fn attach_named(&mut self, slot: &str, name: &str) -> bool {
        match self.get_block(name) {
            Some(id) => {
                self.attach_child(slot, id);
                true
            }
            None => false,
        }
    }

    /// Block-first spelling of [`View::attach_child`]
    pub fn add_to(&mut self, id: BlockId, slot: &str) -> &mut Self {
        self.attach_child(slot, id)
    }

    /// Blocks attached to `slot`, in attachment order
    #[must_use]
    pub fn children(&self, slot: &str) -> &[BlockId] {
        self.child_tree.get(slot).map_or(&[], Vec::as_slice)
    }

    /// Render a child slot
    ///
    /// An unknown slot renders as an empty string.
    ///
    /// # Errors
    ///
    /// Propagates template read failures and `Error::TemplateDepth`.
    pub fn child_html(&self, slot: &str) -> Result<String> {
        let Some(children) = self.child_tree.get(slot) else {
            return Ok(String::new());
        };

        let mut html = String::new();
        if let Some(own) = self.named.get(slot) {
            html.push_str(&self.block_html(*own)?);
        }
        for id in children {
            html.push_str(&self.block_html(*id)?);
        }
        Ok(html)
    }

    /// Render a single block
    ///
    /// # Errors
    ///
    /// Propagates template read failures and `Error::TemplateDepth`.
    pub fn block_html(&self, id: BlockId) -> Result<String> {
        let Some(block) = self.arena.get(id.0) else {
            return Ok(String::new());
        };
        let _guard = DepthGuard::enter(&self.depth)?;
        block.html(&Scope {
            view: self,
            block: Some(block),
        })
    }

    /// Use the layout `path` below the layouts directory
    ///
    /// # Errors
    ///
    /// Returns `Error::TemplateNotFound` when the layout does not resolve.
    pub fn set_layout(&mut self, path: &str) -> Result<&mut Self> {
        self.layout = Some(self.env.layouts.require(path)?);
        Ok(self)
    }

    /// The resolved layout file
    #[must_use]
    pub fn layout(&self) -> Option<&Path> {
        self.layout.as_deref()
    }

    /// Turn whitespace compression of the layout output on or off
    pub fn compress_output(&mut self, compress: bool) -> &mut Self {
        self.compress = compress;
        self
    }

    /// Turn the end-of-request render on or off
    pub fn auto_render(&mut self, enabled: bool) -> &mut Self {
        self.rendered = !enabled;
        self
    }

    /// Whether output has been produced (or suppressed)
    #[must_use]
    pub const fn is_rendered(&self) -> bool {
        self.rendered
    }

    /// Make `value` available to every template as `{{ data:KEY }}`
    ///
    /// Values assigned to a block take precedence inside that block.
    pub fn assign(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Render the layout; without a layout the view renders an empty string
    ///
    /// # Errors
    ///
    /// Propagates template read failures and `Error::TemplateDepth`.
    pub fn html(&self) -> Result<String> {
        let Some(layout) = &self.layout else {
            return Ok(String::new());
        };
        let html = {
            let _guard = DepthGuard::enter(&self.depth)?;
            render_file(
                layout,
                &Scope {
                    view: self,
                    block: None,
                },
            )?
        };
        Ok(if self.compress {
            compress_html(&html)
        } else {
            html
        })
    }

    /// Render the layout and mark the view as rendered
    ///
    /// # Errors
    ///
    /// See [`View::html`].
    pub fn render(&mut self) -> Result<String> {
        let html = self.html()?;
        self.rendered = true;
        Ok(html)
    }

    /// Render once at the end of the request
    ///
    /// Returns `None` if the view was already rendered or auto-render is off.
    ///
    /// # Errors
    ///
    /// See [`View::html`].
    pub fn finalize(&mut self) -> Result<Option<String>> {
        if self.rendered {
            return Ok(None);
        }
        self.render().map(Some)
    }

    fn instantiate(&self, label: &str) -> Option<Block> {
        let lookup = strip_block_suffix(label);
        let parts = crate::resolve::split_logical(lookup);
        let resolved = self.env.blocks.resolver().resolve_parts(&parts).ok()?;
        if resolved.consumed != parts.len() {
            return None;
        }
        let factory = self.env.blocks.get_path(&resolved.path)?;
        Some(factory(self.env.templates))
    }

    fn register_or_existing(&mut self, block: Block) -> BlockId {
        if let Some(existing) = block.name().and_then(|name| self.get_block(name)) {
            return existing;
        }
        if block.name().is_some() {
            self.register(block)
        } else {
            self.adopt(block)
        }
    }

    fn register(&mut self, block: Block) -> BlockId {
        let name = block.name().map(str::to_string);
        let id = self.adopt(block);
        if let Some(name) = name {
            debug!(block = %name, "Block registered");
            self.child_tree.entry(name.clone()).or_default();
            self.named.insert(name, id);
        }
        id
    }
}

fn strip_block_suffix(label: &str) -> &str {
    const SUFFIX: &str = "_block";
    let cut = label.len().saturating_sub(SUFFIX.len());
    match label.get(cut..) {
        Some(tail) if label.len() > SUFFIX.len() && tail.eq_ignore_ascii_case(SUFFIX) => {
            &label[..cut]
        }
        _ => label,
    }
}

/// Marker source for one template: the view plus the block being rendered
struct Scope<'v, 'f> {
    view: &'v View<'f>,
    block: Option<&'v Block>,
}

impl Markers for Scope<'_, '_> {
    fn child_html(&self, slot: &str) -> Result<String> {
        self.view.child_html(slot)
    }

    fn config(&self, path: &str) -> Option<String> {
        self.view.env.config.get_str(path)
    }

    fn data(&self, key: &str) -> Option<String> {
        self.block
            .and_then(|block| block.data(key))
            .or_else(|| self.view.data.get(key))
            .and_then(scalar_to_string)
    }
}

/// Counts template nesting; the level is released when the guard drops
struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Result<Self> {
        let next = depth.get() + 1;
        if next > MAX_RENDER_DEPTH {
            return Err(Error::TemplateDepth {
                limit: MAX_RENDER_DEPTH,
            });
        }
        depth.set(next);
        Ok(Self { depth })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        blocks: BlockRegistry,
        templates: TemplateLocator,
        layouts: TemplateLocator,
        config: ConfigStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let write = |relative: &str, body: &str| {
                let path = dir.path().join(relative);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, body).unwrap();
            };
            write("templates/shared/head.html", "<head>{{ config:app.name }}</head>");
            write("templates/home/index.html", "<p>{{ data:greeting }}</p>");
            write("templates/card.html", "<div class=\"card\">{{ child:card_body }}</div>");
            write("templates/loop.html", "{{ child:loop }}");
            write(
                "layouts/page.html",
                "<html>\n  {{ child:head }}\n  <body>{{ child:content }}</body>\n</html>",
            );

            let mut blocks = BlockRegistry::new("block");
            blocks.insert(
                "head",
                Arc::new(|t: &TemplateLocator| Block::named("head").with_template(t, "shared.head")),
            );
            blocks.insert(
                "shared/card",
                Arc::new(|t: &TemplateLocator| Block::anonymous().with_template(t, "card")),
            );

            Self {
                templates: TemplateLocator::new("template", dir.path().join("templates"), ".html"),
                layouts: TemplateLocator::new("layout", dir.path().join("layouts"), ".html"),
                config: ConfigStore::from_value(json!({ "app": { "name": "Demo" } })),
                blocks,
                _dir: dir,
            }
        }

        fn view(&self) -> View<'_> {
            View::new(ViewEnv {
                blocks: &self.blocks,
                templates: &self.templates,
                layouts: &self.layouts,
                config: &self.config,
            })
        }
    }

    fn text_block(view: &mut View<'_>, name: Option<&str>, greeting: &str) -> BlockId {
        let mut block = name.map_or_else(Block::anonymous, Block::named);
        block.set_template(view.templates(), "home.index");
        block.assign("greeting", greeting);
        view.adopt(block)
    }

    #[test]
    fn test_duplicate_name_is_a_conflict() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        view.add_block(Block::named("sidebar")).unwrap();
        let err = view.add_block(Block::named("sidebar")).unwrap_err();
        assert!(matches!(err, Error::ViewConflict { .. }));
    }

    #[test]
    fn test_unnamed_block_cannot_be_added() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let err = view.add_block(Block::anonymous()).unwrap_err();
        assert!(matches!(err, Error::ViewConflict { .. }));
    }

    #[test]
    fn test_unknown_slot_is_empty() {
        let fixture = Fixture::new();
        let view = fixture.view();
        assert_eq!(view.child_html("nothing").unwrap(), "");
    }

    #[test]
    fn test_slot_renders_attached_block() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let id = text_block(&mut view, None, "hello");
        view.add_to(id, "content");
        assert_eq!(view.child_html("content").unwrap(), "<p>hello</p>");
    }

    #[test]
    fn test_slot_preserves_attachment_order() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let first = text_block(&mut view, None, "one");
        let second = text_block(&mut view, None, "two");
        view.attach_child("content", first)
            .attach_child("content", second)
            .attach_child("content", first);
        assert_eq!(view.child_html("content").unwrap(), "<p>one</p><p>two</p>");
        assert_eq!(view.children("content"), &[first, second]);
    }

    #[test]
    fn test_attach_named_by_block_name() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let mut block = Block::named("sidebar");
        block.set_template(view.templates(), "home.index")
            .assign("greeting", "side");
        let sidebar = view.add_block(block).unwrap();

        assert!(view.attach_named("content", "sidebar"));
        assert!(!view.attach_named("content", "missing"));
        assert!(!view.attach_named("footer", "missing"));

        assert_eq!(view.children("content"), &[sidebar]);
        assert_eq!(view.child_html("content").unwrap(), "<p>side</p>");
        assert_eq!(view.child_html("footer").unwrap(), "");
    }

    #[test]
    fn test_slot_named_after_block_renders_it_first() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let mut own = Block::named("content");
        own.set_template(view.templates(), "home.index")
            .assign("greeting", "own");
        view.add_block(own).unwrap();
        let extra = text_block(&mut view, None, "extra");
        view.attach_child("content", extra);
        assert_eq!(
            view.child_html("content").unwrap(),
            "<p>own</p><p>extra</p>"
        );
    }

    #[test]
    fn test_create_block_uses_factory_and_deduplicates() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let first = view.create_block("head");
        let second = view.create_block("Head_Block");
        assert_eq!(first, second);
        assert_eq!(view.get_block("head"), Some(first));
        assert_eq!(view.child_html("head").unwrap(), "<head>Demo</head>");
    }

    #[test]
    fn test_create_block_without_factory_is_anonymous() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let id = view.create_block("homepage_content");
        assert_eq!(view.block(id).unwrap().name(), Some("homepage_content"));
        assert_eq!(view.get_block("homepage_content"), None);
        assert_eq!(view.block_html(id).unwrap(), "");
    }

    #[test]
    fn test_factory_without_name_is_not_registered() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let first = view.create_block("shared.card");
        let second = view.create_block("shared_card");
        assert_ne!(first, second);
        assert!(view.block(first).unwrap().template().is_some());
    }

    #[test]
    fn test_partial_label_match_is_not_a_factory() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let id = view.create_block("head_extra");
        assert_eq!(view.get_block("head"), None);
        assert!(view.block(id).unwrap().template().is_none());
    }

    #[test]
    fn test_create_registered_block_requires_factory() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        assert!(view.create_registered_block("head").is_ok());
        let err = view.create_registered_block("footer").unwrap_err();
        assert!(matches!(err, Error::ClassNotFound { kind: "block", .. }));
    }

    #[test]
    fn test_layout_renders_slots_and_compresses() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        view.create_block("head");
        let content = text_block(&mut view, None, "welcome");
        view.add_to(content, "content");
        view.set_layout("page").unwrap();

        assert_eq!(
            view.html().unwrap(),
            "<html><head>Demo</head><body><p>welcome</p></body></html>"
        );

        view.compress_output(false);
        assert_eq!(
            view.html().unwrap(),
            "<html>\n  <head>Demo</head>\n  <body><p>welcome</p></body>\n</html>"
        );
    }

    #[test]
    fn test_nested_slots_render_depth_first() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let card = view.create_block("shared.card");
        let inner = text_block(&mut view, None, "inside");
        view.add_to(card, "content").add_to(inner, "card_body");
        assert_eq!(
            view.child_html("content").unwrap(),
            "<div class=\"card\"><p>inside</p></div>"
        );
    }

    #[test]
    fn test_missing_layout_is_fatal() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let err = view.set_layout("missing").unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound { kind: "layout", .. }));
    }

    #[test]
    fn test_view_data_is_a_fallback() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let mut block = Block::anonymous();
        block.set_template(view.templates(), "home.index");
        let id = view.adopt(block);
        view.assign("greeting", "from view");
        assert_eq!(view.block_html(id).unwrap(), "<p>from view</p>");
    }

    #[test]
    fn test_self_referencing_slot_hits_depth_limit() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        let id = view
            .add_block(Block::named("loop").with_template(&fixture.templates, "loop"))
            .unwrap();
        let err = view.block_html(id).unwrap_err();
        assert!(matches!(err, Error::TemplateDepth { .. }));
        // the guard released every level on the way out
        assert_eq!(view.depth.get(), 0);
    }

    #[test]
    fn test_finalize_renders_once() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        view.create_block("head");
        view.set_layout("page").unwrap();
        assert!(view.finalize().unwrap().is_some());
        assert!(view.finalize().unwrap().is_none());
    }

    #[test]
    fn test_finalize_respects_auto_render_off() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        view.auto_render(false);
        assert!(view.finalize().unwrap().is_none());

        let mut view = fixture.view();
        view.render().unwrap();
        assert!(view.finalize().unwrap().is_none());
    }

    #[test]
    fn test_strip_block_suffix() {
        assert_eq!(strip_block_suffix("Head_Block"), "Head");
        assert_eq!(strip_block_suffix("head"), "head");
        assert_eq!(strip_block_suffix("_block"), "_block");
    }
}
