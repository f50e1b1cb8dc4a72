//! # Cascading Router
//!
//! Maps a request URI onto a registered controller, an action and its
//! positional arguments.
//!
//! ## Resolution
//!
//! 1. The URI is split into non-empty `/` segments.
//! 2. An empty URI routes to `routes.default_controller`.
//! 3. Otherwise the longest matching rewrite prefix is replaced.
//! 4. The segments are flattened on the logical separators and cascaded
//!    over the controller registry; the shallowest registered key wins.
//! 5. The first unconsumed segment is the action (`routes.default_method`,
//!    then `index`, when none is left) and the rest are arguments.
//!
//! A key matching only part of a segment (`blog` for `blog_post`)
//! consumes that whole segment.

use crate::config::ConfigStore;
use crate::controller::ControllerRegistry;
use crate::error::{Error, Result};
use crate::resolve::split_logical;
use crate::route::{strip_controller_suffix, ControllerRoute, MethodCall, RouteResult, Rewrites};
use tracing::debug;

/// Action used when neither the URI nor the config names one
pub const DEFAULT_METHOD: &str = "index";

/// Resolves request URIs against the controller registry
#[derive(Debug, Clone, Copy)]
pub struct Router<'a> {
    config: &'a ConfigStore,
    rewrites: &'a Rewrites,
    controllers: &'a ControllerRegistry,
}

impl<'a> Router<'a> {
    /// Create a router over the given config, rewrite table and registry
    #[must_use]
    pub const fn new(
        config: &'a ConfigStore,
        rewrites: &'a Rewrites,
        controllers: &'a ControllerRegistry,
    ) -> Self {
        Self {
            config,
            rewrites,
            controllers,
        }
    }

    /// Route `uri` (path only, no query)
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` when no registered controller matches,
    /// including an empty URI with no default controller configured.
    pub fn resolve(&self, uri: &str) -> Result<RouteResult> {
        let mut segments: Vec<String> = uri
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() {
            segments = self.default_segments();
        } else if let Some(rewritten) = self.rewrites.apply(&segments) {
            segments = rewritten;
        }

        let not_found = || Error::RouteNotFound {
            path: format!("/{}", uri.trim_matches('/')),
        };

        let mut parts = Vec::new();
        let mut owners = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            for part in split_logical(segment) {
                parts.push(part);
                owners.push(index);
            }
        }

        let resolved = self
            .controllers
            .resolver()
            .resolve_parts(&parts)
            .map_err(|_| not_found())?;
        let consumed = &parts[..resolved.consumed];
        let consumed_segments = owners[resolved.consumed - 1] + 1;

        let controller = ControllerRoute {
            name: controller_name(consumed),
            key: consumed
                .iter()
                .map(|p| p.to_lowercase())
                .collect::<Vec<_>>()
                .join("/"),
        };

        let mut rest = segments.into_iter().skip(consumed_segments);
        let name = rest.next().unwrap_or_else(|| self.default_method());
        let route = RouteResult {
            controller,
            method: MethodCall {
                name,
                args: rest.collect(),
            },
        };

        debug!(
            controller = %route.controller.name,
            method = %route.method.name,
            args = route.method.args.len(),
            "Route resolved"
        );
        Ok(route)
    }

    fn default_segments(&self) -> Vec<String> {
        self.config
            .get_str("routes.default_controller")
            .map(|name| {
                strip_controller_suffix(&name)
                    .split('_')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn default_method(&self) -> String {
        self.config
            .get_str("routes.default_method")
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_METHOD.to_string())
    }
}

/// `["auth", "login"]` -> `Auth_Login_Controller`
fn controller_name(parts: &[&str]) -> String {
    let mut name = parts
        .iter()
        .map(|part| title_case(part))
        .collect::<Vec<_>>()
        .join("_");
    name.push_str("_Controller");
    name
}

fn title_case(part: &str) -> String {
    let lower = part.to_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
