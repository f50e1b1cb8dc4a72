//! # Trellis Demo Site
//!
//! Controllers, blocks and templates of the bundled demo application.
//! The `trellis` binary serves it; tests drive it through
//! [`Framework::handle`].

pub mod blocks;
pub mod controllers;

use std::path::{Path, PathBuf};
use trellis_core::{Framework, Result};

/// The `site/` directory shipped with this crate
#[must_use]
pub fn default_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("site")
}

/// Build the demo framework over the site at `root`
///
/// # Errors
///
/// Returns an error when the config directory cannot be loaded.
pub fn framework(root: impl Into<PathBuf>) -> Result<Framework> {
    let builder = Framework::builder().root(root);
    let builder = controllers::register(builder);
    blocks::register(builder).build()
}
