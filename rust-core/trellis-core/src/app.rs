//! # Dispatcher
//!
//! [`Framework`] is built once at startup and shared by every request. For
//! each request it creates an [`App`], which owns the request, the view and
//! the resolved route, and is handed to the controller action.
//!
//! ## Request lifecycle
//!
//! ```text
//! RequestContext -> Router -> controller factory -> autoload
//!                -> action -> View::finalize -> Response
//! ```
//!
//! Any error ends the request and is served as an error page rendered from
//! `errors/{status}`.

use crate::block::{Block, BlockRegistry};
use crate::compress::compress_html;
use crate::config::ConfigStore;
use crate::controller::{Controller, ControllerRegistry};
use crate::error::{Error, Result};
use crate::request::RequestContext;
use crate::response::{normalize_status, status_line, Response};
use crate::route::{RouteResult, Rewrites};
use crate::router::Router;
use crate::template::{render_file, Markers, TemplateLocator};
use crate::view::{View, ViewEnv};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Directory layout of an application root
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Application root
    pub root: PathBuf,
    /// Config directory, relative to the root
    pub config: String,
    /// Layout templates
    pub layouts: String,
    /// Block templates
    pub templates: String,
    /// Error page templates
    pub errors: String,
    /// Template file extension
    pub extension: String,
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new(".")
    }
}

impl AppPaths {
    /// Default layout below `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: "config".to_string(),
            layouts: "layouts".to_string(),
            templates: "templates".to_string(),
            errors: "errors".to_string(),
            extension: ".html".to_string(),
        }
    }

    /// Absolute path of a sub-directory
    #[must_use]
    pub fn dir(&self, sub: &str) -> PathBuf {
        self.root.join(sub)
    }

    /// The config directory
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.dir(&self.config)
    }
}

/// Shared, immutable application state
#[derive(Debug)]
pub struct Framework {
    paths: AppPaths,
    config: ConfigStore,
    rewrites: Rewrites,
    controllers: ControllerRegistry,
    blocks: BlockRegistry,
    templates: TemplateLocator,
    layouts: TemplateLocator,
    errors: TemplateLocator,
    autoload: bool,
}

impl Framework {
    /// Start building a framework
    #[must_use]
    pub fn builder() -> FrameworkBuilder {
        FrameworkBuilder::default()
    }

    /// Directory layout
    #[must_use]
    pub const fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Loaded config
    #[must_use]
    pub const fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Registered controllers
    #[must_use]
    pub const fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Registered blocks
    #[must_use]
    pub const fn blocks(&self) -> &BlockRegistry {
        &self.blocks
    }

    /// Locator for block templates
    #[must_use]
    pub const fn templates(&self) -> &TemplateLocator {
        &self.templates
    }

    /// Route a request without running it
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` when no controller matches.
    pub fn route(&self, uri: &str) -> Result<RouteResult> {
        Router::new(&self.config, &self.rewrites, &self.controllers).resolve(uri)
    }

    /// Run one request to completion
    pub fn handle(&self, request: RequestContext) -> Response {
        let mut app = App::new(self, request);
        match app.run() {
            Ok(body) => Response::html(body),
            Err(err) => self.error_response(&err),
        }
    }

    /// Serve the error page for `err`
    pub fn error_response(&self, err: &Error) -> Response {
        let status = normalize_status(err.status_code());
        if err.is_client_error() {
            warn!(status, error = %err, "Request failed");
        } else {
            error!(status, error = %err, "Request failed");
        }
        Response::html(self.error_page(status)).with_status(status)
    }

    /// Render `errors/{status}`, falling back to the 500 page and then to the status line
    pub fn error_page(&self, status: u16) -> String {
        let status = normalize_status(status);
        let page = self
            .errors
            .find(&status.to_string())
            .or_else(|| {
                debug!(status, "No error page, falling back to 500");
                self.errors.find("500")
            });
        let Some(page) = page else {
            return status_line(status).to_string();
        };

        match self.render_error_page(&page, status) {
            Ok(html) => html,
            Err(err) => {
                error!(page = %page.display(), error = %err, "Error page failed to render");
                status_line(status).to_string()
            }
        }
    }

    fn render_error_page(&self, page: &Path, status: u16) -> Result<String> {
        let html = render_file(
            page,
            &ErrorMarkers {
                config: &self.config,
                status,
            },
        )?;
        Ok(if self.compress_default() {
            compress_html(&html)
        } else {
            html
        })
    }

    fn compress_default(&self) -> bool {
        self.config.get_bool("view.compress").unwrap_or(true)
    }

    fn view_env(&self) -> ViewEnv<'_> {
        ViewEnv {
            blocks: &self.blocks,
            templates: &self.templates,
            layouts: &self.layouts,
            config: &self.config,
        }
    }
}

/// Configures and builds a [`Framework`]
pub struct FrameworkBuilder {
    paths: AppPaths,
    config: Option<ConfigStore>,
    controllers: ControllerRegistry,
    blocks: BlockRegistry,
    autoload: bool,
}

impl Default for FrameworkBuilder {
    fn default() -> Self {
        Self {
            paths: AppPaths::default(),
            config: None,
            controllers: ControllerRegistry::new("controller"),
            blocks: BlockRegistry::new("block"),
            autoload: true,
        }
    }
}

impl FrameworkBuilder {
    /// Application root, keeping the default sub-directory names
    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths.root = root.into();
        self
    }

    /// Replace the whole directory layout
    #[must_use]
    pub fn paths(mut self, paths: AppPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Use `config` instead of loading the config directory
    #[must_use]
    pub fn config(mut self, config: ConfigStore) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a controller type under a route key (`home`, `auth/login`)
    #[must_use]
    pub fn controller<C>(mut self, key: &str) -> Self
    where
        C: Controller + Default + 'static,
    {
        self.controllers.insert(key, crate::controller::factory::<C>());
        self
    }

    /// Register a controller factory under a route key
    #[must_use]
    pub fn controller_factory<F>(mut self, key: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Controller> + Send + Sync + 'static,
    {
        self.controllers.insert(key, Arc::new(factory));
        self
    }

    /// Register a block factory under a label (`head`, `shared/card`)
    #[must_use]
    pub fn block<F>(mut self, label: &str, factory: F) -> Self
    where
        F: Fn(&TemplateLocator) -> Block + Send + Sync + 'static,
    {
        self.blocks.insert(label, Arc::new(factory));
        self
    }

    /// Turn loading of `autoload.layout` and `autoload.blocks` on or off
    #[must_use]
    pub fn autoload(mut self, enabled: bool) -> Self {
        self.autoload = enabled;
        self
    }

    /// Load config and assemble the framework
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::Config` when the config directory
    /// cannot be loaded.
    pub fn build(self) -> Result<Framework> {
        let config = match self.config {
            Some(config) => config,
            None => ConfigStore::load(&self.paths.config_dir())?,
        };
        let rewrites = Rewrites::from_config(config.get("routes.rewrites").as_ref());
        let extension = self.paths.extension.clone();
        let locator = |kind, sub: &str| {
            TemplateLocator::new(kind, self.paths.dir(sub), extension.clone())
        };

        let framework = Framework {
            templates: locator("template", &self.paths.templates),
            layouts: locator("layout", &self.paths.layouts),
            errors: locator("error page", &self.paths.errors),
            rewrites,
            config,
            controllers: self.controllers,
            blocks: self.blocks,
            autoload: self.autoload,
            paths: self.paths,
        };
        debug!(
            root = %framework.paths.root.display(),
            controllers = framework.controllers.len(),
            blocks = framework.blocks.len(),
            rewrites = framework.rewrites.len(),
            "Framework built"
        );
        Ok(framework)
    }
}

/// Per-request dispatcher handed to controller actions
#[derive(Debug)]
pub struct App<'f> {
    framework: &'f Framework,
    request: RequestContext,
    route: Option<RouteResult>,
    view: View<'f>,
    output: String,
}

impl<'f> App<'f> {
    /// A fresh request scope
    #[must_use]
    pub fn new(framework: &'f Framework, request: RequestContext) -> Self {
        let mut view = View::new(framework.view_env());
        view.compress_output(framework.compress_default());
        Self {
            framework,
            request,
            route: None,
            view,
            output: String::new(),
        }
    }

    /// The shared framework
    #[must_use]
    pub const fn framework(&self) -> &'f Framework {
        self.framework
    }

    /// The inbound request
    #[must_use]
    pub const fn request(&self) -> &RequestContext {
        &self.request
    }

    /// Application config
    #[must_use]
    pub const fn config(&self) -> &'f ConfigStore {
        &self.framework.config
    }

    /// The request's view
    #[must_use]
    pub const fn view(&self) -> &View<'f> {
        &self.view
    }

    /// The request's view, mutably
    pub fn view_mut(&mut self) -> &mut View<'f> {
        &mut self.view
    }

    /// The resolved route, once routing has happened
    #[must_use]
    pub const fn route(&self) -> Option<&RouteResult> {
        self.route.as_ref()
    }

    /// Write raw output; it precedes the rendered view in the response
    pub fn echo(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.output.push_str(text.as_ref());
        self
    }

    /// Raw output written so far
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// End the request with the error page for `status`
    ///
    /// # Errors
    ///
    /// Always returns `Error::Aborted`; return it from the action.
    pub fn abort(&self, status: u16) -> Result<()> {
        Err(Error::Aborted {
            status: normalize_status(status),
        })
    }

    /// Route, invoke the action and render, returning the response body
    ///
    /// # Errors
    ///
    /// Returns the first error raised by routing, autoload, the action or rendering.
    pub fn run(&mut self) -> Result<String> {
        let framework = self.framework;
        let route = framework.route(self.request.uri())?;
        let factory = framework.controllers.get(&route.controller.key).ok_or_else(|| {
            Error::ClassNotFound {
                kind: "controller",
                name: route.controller.name.clone(),
            }
        })?;

        let mut controller = factory();
        if !controller.has_action(&route.method.name) {
            return Err(Error::MethodNotFound {
                controller: route.controller.name.clone(),
                method: route.method.name.clone(),
            });
        }
        self.route = Some(route.clone());

        if framework.autoload {
            self.autoload()?;
        }

        debug!(
            controller = %route.controller.name,
            method = %route.method.name,
            "Invoking action"
        );
        controller.invoke(&route.method.name, self, &route.method.args)?;

        let html = self.view.finalize()?.unwrap_or_default();
        let mut body = std::mem::take(&mut self.output);
        body.push_str(&html);
        Ok(body)
    }

    fn autoload(&mut self) -> Result<()> {
        let config = self.framework.config();
        if let Some(layout) = config.get_str("autoload.layout") {
            self.view.set_layout(&layout)?;
        }
        let blocks = config.get("autoload.blocks");
        for label in blocks
            .as_ref()
            .and_then(|value| value.as_array())
            .into_iter()
            .flatten()
            .filter_map(|value| value.as_str())
        {
            self.view.create_registered_block(label)?;
        }
        Ok(())
    }
}

/// Markers available to error pages: config values and the status
struct ErrorMarkers<'a> {
    config: &'a ConfigStore,
    status: u16,
}

impl Markers for ErrorMarkers<'_> {
    fn child_html(&self, _slot: &str) -> Result<String> {
        Ok(String::new())
    }

    fn config(&self, path: &str) -> Option<String> {
        self.config.get_str(path)
    }

    fn data(&self, key: &str) -> Option<String> {
        match key {
            "status" => Some(self.status.to_string()),
            "status_line" => Some(status_line(self.status).to_string()),
            _ => None,
        }
    }
}
