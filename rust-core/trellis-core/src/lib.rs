//! # Trellis Core
//!
//! Core runtime library for the Trellis web framework.
//! Provides the cascading router, block/slot view composition and the
//! request dispatcher, fronted by a Hyper HTTP server.
//!
//! ## Architecture
//!
//! A [`Framework`] is built once from an application root and the
//! controllers and blocks registered with its builder. Each request gets an
//! [`App`] that routes it, runs the controller action and renders the view.
//!
//! ## Modules
//!
//! - `resolve` - Cascading path resolution over files or registries
//! - `registry` - Name-keyed factory tables
//! - `config` - Config directory loading and dotted lookups
//! - `request` - HTTP request wrapper with query and body parsing
//! - `route` - Route metadata and rewrite rules
//! - `router` - URI to controller, action and arguments
//! - `controller` - Controller trait and factories
//! - `template` - Template files and marker expansion
//! - `block` - Renderable template-backed units
//! - `view` - Block arena, child slots and layout rendering
//! - `compress` - HTML whitespace compression
//! - `app` - Framework and per-request dispatcher
//! - `response` - Response type and status table
//! - `server` - HTTP server built on Hyper
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

extern crate self as trellis_core;

pub mod app;
pub mod block;
pub mod compress;
pub mod config;
pub mod controller;
pub mod error;
pub mod registry;
pub mod request;
pub mod resolve;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod template;
pub mod view;

pub use app::{App, AppPaths, Framework, FrameworkBuilder};
pub use block::{Block, BlockFactory, BlockRegistry};
pub use config::ConfigStore;
pub use controller::{Controller, ControllerFactory, ControllerRegistry};
pub use error::{Error, Result};
pub use request::{Method, RequestContext};
pub use resolve::{FileSystem, PathResolver, Resolved, Tree};
pub use response::Response;
pub use route::{ControllerRoute, MethodCall, RouteResult, Rewrites};
pub use router::Router;
pub use server::{Server, ServerConfig};
pub use template::TemplateLocator;
pub use trellis_macros::controller;
pub use view::{BlockId, View, ViewEnv};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
